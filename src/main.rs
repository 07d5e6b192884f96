#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod booking;
mod cli;
mod config;
mod db;
mod notify;
mod utils;
mod web;

use config::Config;
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let config = Arc::new(Config::load_from_file(&args.config)?);
    utils::logging::init_tracing(&config.logging);
    info!("deskbook starting up");

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    let policy = booking::AccessPolicy::from_config(&config.policy)?;
    let notifier = notify::WebhookNotifier::from_config(&config.notify)?.map(Arc::new);
    let engine = Arc::new(booking::BookingEngine::new(&db_manager, policy, notifier));

    let web_server = WebServer::new(config.clone(), db_manager.clone(), engine.clone()).await?;

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::select! {
        _ = web_handle => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    info!("deskbook shutting down");
    Ok(())
}
