// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::pin::pin;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{Stream, StreamExt, stream};

use callwire::args::{ClientArgs, Command};
use callwire::messages::{
    Blog, ComputeAverageRequest, CreateBlogRequest, DeleteBlogRequest, FindMaximumRequest,
    GreetRequest, Greeting, ListBlogRequest, PrimeNumberDecompositionRequest, ReadBlogRequest,
    SquareRootRequest, SumRequest, UpdateBlogRequest,
};
use callwire::services::{BlogClient, CalculatorClient, GreetClient};
use callwire_rpc::{CallOptions, Channel, ClientConfig, Status, TlsClientConfig, tls};
use callwire_tracing::TracingConfiguration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientArgs::parse();

    TracingConfiguration::default()
        .with_log_level("warn".to_string())
        .with_filter("warn".to_string())
        .setup_tracing_subscriber();

    let mut config = ClientConfig::with_endpoint(args.endpoint.clone());
    if args.use_tls() {
        tls::initialize_crypto_provider();

        let mut tls_config = TlsClientConfig::default();
        if let Some(ca_file) = &args.ca_file {
            tls_config = tls_config.with_ca_file(ca_file);
        }
        if let Some(server_name) = &args.server_name {
            tls_config = tls_config.with_server_name(server_name);
        }
        config = config.with_tls(tls_config);
    }
    let channel = Channel::with_config(config).context("failed to create channel")?;

    let mut options = CallOptions::new();
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(timeout);
    }

    call(channel, args.command, options)
        .await
        .context("call failed")
}

async fn call(channel: Channel, command: Command, options: CallOptions) -> Result<(), Status> {
    let greet = GreetClient::new(channel.clone());
    let calculator = CalculatorClient::new(channel.clone());
    let blog = BlogClient::new(channel);

    match command {
        Command::Greet {
            first_name,
            last_name,
        } => {
            let request = Greeting::new(first_name, last_name).into();
            let response = greet.greet(request, options).await?;
            println!("{}", response.result);
        }
        Command::GreetManyTimes { first_name } => {
            let responses = greet.greet_many_times(greeting(first_name), options);
            for_each_response(responses, |response| println!("{}", response.result)).await?;
        }
        Command::LongGreet { names } => {
            let requests = stream::iter(names.into_iter().map(greeting));
            let response = greet.long_greet(requests, options).await?;
            println!("{}", response.result);
        }
        Command::GreetEveryone { names } => {
            let requests = stream::iter(names.into_iter().map(greeting));
            let responses = greet.greet_everyone(requests, options);
            for_each_response(responses, |response| println!("{}", response.result)).await?;
        }
        Command::GreetWithDeadline { first_name } => {
            let response = greet
                .greet_with_deadline(greeting(first_name), options)
                .await?;
            println!("{}", response.result);
        }
        Command::Sum { x, y } => {
            let response = calculator.sum(SumRequest { x, y }, options).await?;
            println!("{}", response.result);
        }
        Command::PrimeNumberDecomposition { number } => {
            let responses = calculator
                .prime_number_decomposition(PrimeNumberDecompositionRequest { number }, options);
            for_each_response(responses, |response| println!("{}", response.prime_factor))
                .await?;
        }
        Command::ComputeAverage { numbers } => {
            let requests = stream::iter(
                numbers
                    .into_iter()
                    .map(|number| ComputeAverageRequest { number }),
            );
            let response = calculator.compute_average(requests, options).await?;
            println!("{}", response.average);
        }
        Command::FindMaximum { numbers } => {
            let requests = stream::iter(
                numbers
                    .into_iter()
                    .map(|number| FindMaximumRequest { number }),
            );
            let responses = calculator.find_maximum(requests, options);
            for_each_response(responses, |response| println!("{}", response.maximum)).await?;
        }
        Command::SquareRoot { number } => {
            let response = calculator
                .square_root(SquareRootRequest { number }, options)
                .await?;
            println!("{}", response.number_root);
        }
        Command::CreateBlog {
            author_id,
            title,
            content,
        } => {
            let request = CreateBlogRequest {
                blog: Blog::new(author_id, title, content),
            };
            print_blog(&blog.create_blog(request, options).await?.blog);
        }
        Command::ReadBlog { id } => {
            let request = ReadBlogRequest { blog_id: id };
            print_blog(&blog.read_blog(request, options).await?.blog);
        }
        Command::UpdateBlog {
            id,
            author_id,
            title,
            content,
        } => {
            let request = UpdateBlogRequest {
                blog: Blog::new(author_id, title, content).with_id(id),
            };
            print_blog(&blog.update_blog(request, options).await?.blog);
        }
        Command::DeleteBlog { id } => {
            let response = blog
                .delete_blog(DeleteBlogRequest { blog_id: id }, options)
                .await?;
            println!("deleted {}", response.blog_id);
        }
        Command::ListBlog => {
            let responses = blog.list_blog(ListBlogRequest {}, options);
            for_each_response(responses, |response| print_blog(&response.blog)).await?;
        }
    }

    Ok(())
}

fn greeting(first_name: String) -> GreetRequest {
    Greeting::new(first_name, "").into()
}

fn print_blog(blog: &Blog) {
    println!(
        "{} author_id={:?} title={:?} content={:?}",
        blog.id, blog.author_id, blog.title, blog.content
    );
}

async fn for_each_response<T>(
    responses: impl Stream<Item = Result<T, Status>>,
    mut handle: impl FnMut(T),
) -> Result<(), Status> {
    let mut responses = pin!(responses);
    while let Some(response) = responses.next().await {
        handle(response?);
    }
    Ok(())
}
