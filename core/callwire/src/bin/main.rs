// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

use callwire::args::Args;
use callwire::runner;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    runner::run(args.config())
}
