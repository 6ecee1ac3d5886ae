//! Folio MCP server binary.
//!
//! Opens the SQLite database, runs migrations and serves the MCP tools over
//! Streamable HTTP. The API layer stays agnostic of the storage backend.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use folio::api::{self, ApiError, Config};
use folio::db::{Database, DbError, SqliteDatabase};
use folio::mcp::ServerProfile;
use miette::Diagnostic;
use thiserror::Error;
use tracing::info;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("Database error: {0}")]
    #[diagnostic(code(folio::binary::database))]
    Database(#[from] DbError),

    #[error("Failed to create data directory: {0}")]
    #[diagnostic(code(folio::binary::io))]
    Io(#[from] std::io::Error),

    #[error("API server error: {0}")]
    #[diagnostic(code(folio::binary::api))]
    Api(#[from] ApiError),
}

#[derive(Parser)]
#[command(name = "folio-mcp")]
#[command(author, version, about = "MCP tool server for fiction projects", long_about = None)]
struct Cli {
    /// Host address to bind to [env: FOLIO_HOST, default: 127.0.0.1]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on [env: FOLIO_PORT, default: 3000]
    #[arg(short, long)]
    port: Option<u16>,

    /// Database file path [env: FOLIO_DB, default: $XDG_DATA_HOME/folio/folio.db]
    #[arg(long)]
    db: Option<PathBuf>,

    /// Tool groups to expose: series, books, world, tropes, timeline, all [env: FOLIO_PROFILE]
    #[arg(long)]
    profile: Option<ServerProfile>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new();
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(db) = self.db {
            config = config.with_db_path(db);
        }
        if let Some(profile) = self.profile {
            config = config.with_profile(profile);
        }
        config
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    api::init_tracing();
    let config = Cli::parse().into_config();
    serve(config).await?;
    Ok(())
}

async fn serve(config: Config) -> Result<(), BinaryError> {
    info!(path = %config.db_path.display(), "Opening database");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = SqliteDatabase::open_with(&config.db_path, config.max_connections).await?;

    // Run migrations before starting the server
    db.migrate().await?;
    info!("Database migrations complete");

    api::run(config, db).await?;
    Ok(())
}
