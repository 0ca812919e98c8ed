mod api;
mod config;
mod error;
mod executor;
mod filter;
mod graph;
mod index;
mod logging;
mod manifest;
mod orchestrator;
mod package;
mod pagination;
#[cfg(test)]
mod test;
mod validator;

use std::process::exit;
use std::sync::Arc;

use log::error;

use crate::config::Config;
use crate::orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!("Invalid configuration: {err}");
            exit(1)
        }
    };

    let orchestrator = Orchestrator::new(config);
    match orchestrator.run().await {
        Ok(stats) => {
            if stats.versions_deleted == 0 {
                log::info!("cleanup finished, nothing to delete");
            }
        }
        Err(err) => {
            error!("Cleanup run failed: {err}");
            exit(1)
        }
    }
}
