use clap::Parser;
use snippetbox::{logging, server, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::parse();
    server::serve(config).await
}
