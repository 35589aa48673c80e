mod client;
mod commands;
mod config;
mod error;
mod file_store;
mod session;

use engine::{EngineSettings, RecordStore, TransactionList};

use crate::{
    client::HttpStore, config::Backend, error::Result, file_store::FileStore, session::Session,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},engine={level}",
            level = config.log_level
        ))
        .with_writer(std::io::stderr)
        .init();

    let settings = config.engine_settings()?;
    tracing::info!(backend = ?config.backend, timezone = %settings.timezone, "starting session");

    match config.backend {
        Backend::Http => run(HttpStore::new(&config.base_url)?, settings).await,
        Backend::File => run(FileStore::new(&config.data_path), settings).await,
    }
}

async fn run<S: RecordStore>(store: S, settings: EngineSettings) -> Result<()> {
    let list = TransactionList::builder()
        .store(store)
        .settings(settings)
        .build()?;
    Session::new(list).run().await
}
