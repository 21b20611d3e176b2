//! Tabula binary: creates every configured model's tables.
//!
//! Loads the TOML configuration, initializes structured logging, opens the
//! database and creates (or, with `--rebuild`, drops and recreates) the
//! tables of each model, then reports row counts and closes the database.

mod config;

use std::sync::Arc;

use tabula_db::Database;
use tabula_model::{Model, ModelError};
use tracing_subscriber::EnvFilter;

const REBUILD_FLAG: &str = "--rebuild";

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .skip(1)
        .find(|value| value != REBUILD_FLAG && !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("TABULA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

async fn run(config: config::Config, rebuild: bool) -> Result<(), ModelError> {
    let db = Arc::new(Database::new(
        config.database.path.clone(),
        config.database.runtime_settings(),
    ));

    for definition in &config.models {
        let model = Model::open(Arc::clone(&db), definition).await?;
        if rebuild {
            model.create(true).await?;
            tracing::warn!(table = model.table(), "table rebuilt");
        }
        let rows = model.count(None, None).await?;
        tracing::info!(
            table = model.table(),
            title = model.title(),
            url = model.url(),
            rows,
            "model ready"
        );
    }

    db.close();
    Ok(())
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("tabula.toml"));
    let rebuild = std::env::args().skip(1).any(|arg| arg == REBUILD_FLAG);

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; tabula cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        models = config.models.len(),
        rebuild,
        "resolved startup configuration path"
    );

    if let Err(err) = run(config, rebuild).await {
        tracing::error!(error = %err, kind = %err.kind(), "startup failed");
        std::process::exit(1);
    }
}
