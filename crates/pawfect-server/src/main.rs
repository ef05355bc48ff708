//! Entry point for `pawfect-admin`.

use std::sync::Arc;

use clap::Parser;
use pawfect_common::Encryptor;
use pawfect_common::crypto::EnvKeyProvider;
use pawfect_server::{
    cli::{self, Cli},
    model::Configuration,
    startup,
};
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let configuration = Configuration::new(&args.overrides())?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let mut out = std::io::stdout().lock();

    if !args.command.requires_storage() {
        let encryptor = Encryptor::new(Arc::new(EnvKeyProvider::from_env()));
        return cli::execute_crypto(args.command, &encryptor, &mut out).await;
    }

    let storage_mode = configuration.storage_mode()?;
    let data_dir = configuration.data_dir();
    debug!(%storage_mode, data_dir = %data_dir.display(), "Initializing storage");

    let services = startup::init_services(storage_mode, &data_dir).await?;
    cli::execute_store(args.command, &services, configuration.history_limit(), &mut out).await
}
