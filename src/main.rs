use clap::Parser;
use trendcross::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
