use clap::Parser;

use spotheal::cli::{self, CliArgs};

fn main() -> std::process::ExitCode {
    let args = CliArgs::parse();
    cli::run(args)
}
