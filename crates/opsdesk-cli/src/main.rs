// opsdesk CLI entry point

use clap::Parser;
use opsdesk_cli::{
    output,
    router::{Cli, CommandRouter},
};
use tracing::Level;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose;
    if let Err(e) = CommandRouter::execute(cli).await {
        output::print_error(&e.user_message());
        if verbose {
            eprintln!("\n{}", e.technical_details());
        }
        std::process::exit(1);
    }
}
