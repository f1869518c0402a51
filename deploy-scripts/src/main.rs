use clap::Parser;
use deploy_scripts::cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // A missing `.env` file is fine, credentials may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .pretty()
        .with_writer(std::io::stderr)
        .init();

    let Cli { global, command } = Cli::parse();
    command.run(&global).await?;

    Ok(())
}
