#![forbid(unsafe_code)]

//! twatch — treewatch CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let cli = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(cli) {
        eprintln!("twatch: {e}");
        std::process::exit(1);
    }
}
