mod database;
mod llm;
mod pipeline;
mod settings;
mod web;

use std::{process::exit, sync::Arc};

use clap::Parser;
use database::Database;
use llm::OllamaModel;
use pipeline::Pipeline;
use settings::{Args, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while loading settings. {error}");
            exit(1);
        }
    };

    let database = match Database::connect(&settings.database.path) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while opening the event store. {error:#}");
            exit(1);
        }
    };

    if let Some(path) = &args.import {
        let imported = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| database.import_events(&raw));
        match imported {
            Ok(count) => info!("Imported {count} events from {}", path.display()),
            Err(error) => {
                eprintln!("Problem while importing events. {error:#}");
                exit(1);
            }
        }
    }

    let model = match OllamaModel::new(&settings.llm.ollama_url, &settings.llm.model) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while configuring the language model. {error:#}");
            exit(1);
        }
    };

    let pipeline = Arc::new(Pipeline::new(Arc::new(model), database));
    info!(
        "TruFeed server listening on {} (model {})",
        settings.web.address, settings.llm.model
    );
    web::serve(pipeline, settings.web.address).await;
}
