// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use clap::{Parser, Subcommand};

fn parse_duration(value: &str) -> Result<Duration, String> {
    duration_str::parse(value).map_err(|e| e.to_string())
}

/// Arguments of `callwire-server`
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", env = "CONFIG")]
    config: String,
}

impl Args {
    pub fn config(&self) -> &str {
        &self.config
    }
}

/// Arguments of `callwire-client`
#[derive(Parser, Debug)]
#[command(version, about = "Call the callwire demo services", long_about = None)]
pub struct ClientArgs {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:50051", env = "CALLWIRE_ENDPOINT")]
    pub endpoint: String,

    /// Connect over TLS, trusting the system roots unless --ca-file is given
    #[arg(long)]
    pub tls: bool,

    /// CA certificate used to verify the server, implies --tls
    #[arg(long, value_name = "FILE")]
    pub ca_file: Option<String>,

    /// Name expected in the server certificate, defaults to the endpoint host
    #[arg(long)]
    pub server_name: Option<String>,

    /// Deadline of the call, e.g. 500ms or 5s
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

impl ClientArgs {
    pub fn use_tls(&self) -> bool {
        self.tls || self.ca_file.is_some()
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Greet once
    Greet {
        first_name: String,
        #[arg(default_value = "")]
        last_name: String,
    },
    /// Receive a stream of greetings
    GreetManyTimes { first_name: String },
    /// Send many names, receive one greeting
    LongGreet {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Greet every name as it is sent
    GreetEveryone {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Slow greeting that honours the call deadline
    GreetWithDeadline { first_name: String },
    /// Add two numbers
    Sum {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    /// Stream the prime factors of a number
    PrimeNumberDecomposition { number: i64 },
    /// Average of the given numbers
    ComputeAverage {
        #[arg(allow_negative_numbers = true)]
        numbers: Vec<i32>,
    },
    /// Running maximum of the given numbers
    FindMaximum {
        #[arg(allow_negative_numbers = true, required = true)]
        numbers: Vec<i32>,
    },
    /// Square root of a number
    SquareRoot {
        #[arg(allow_negative_numbers = true)]
        number: i32,
    },
    /// Store a new blog post
    CreateBlog {
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Read a blog post
    ReadBlog { id: String },
    /// Replace every field of a blog post
    UpdateBlog {
        id: String,
        #[arg(long, default_value = "")]
        author_id: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Delete a blog post
    DeleteBlog { id: String },
    /// List every blog post
    ListBlog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args() {
        let args = Args::try_parse_from(["callwire-server", "--config", "config.yaml"]).unwrap();
        assert_eq!(args.config(), "config.yaml");
    }

    #[test]
    fn test_client_args() {
        let args = ClientArgs::try_parse_from([
            "callwire-client",
            "--endpoint",
            "localhost:6000",
            "--ca-file",
            "ssl/ca.crt",
            "--timeout",
            "1500ms",
            "sum",
            "3",
            "-7",
        ])
        .unwrap();

        assert_eq!(args.endpoint, "localhost:6000");
        assert!(args.use_tls());
        assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(args.command, Command::Sum { x: 3, y: -7 });
    }

    #[test]
    fn test_client_blog_commands() {
        let args = ClientArgs::try_parse_from([
            "callwire-client",
            "update-blog",
            "0123456789abcdef01234567",
            "--title",
            "T2",
        ])
        .unwrap();
        assert!(!args.use_tls());
        assert_eq!(args.timeout, None);
        assert_eq!(
            args.command,
            Command::UpdateBlog {
                id: "0123456789abcdef01234567".to_string(),
                author_id: String::new(),
                title: "T2".to_string(),
                content: String::new(),
            }
        );

        assert!(ClientArgs::try_parse_from(["callwire-client", "create-blog"]).is_err());
        assert!(
            ClientArgs::try_parse_from(["callwire-client", "--timeout", "soon", "list-blog"])
                .is_err()
        );
    }
}
