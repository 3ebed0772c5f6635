use clap::Parser;
use claude_scout::cli::{Cli, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = cli.run().await?;
    std::process::exit(code);
}
