//! HTTP shell around the MCP service.
//!
//! Mounts the rmcp Streamable HTTP service under `/mcp` next to a `/health`
//! check, and owns runtime configuration and tracing setup.

mod handlers;
mod routes;
mod state;


use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::db::{Database, sqlite::DEFAULT_MAX_CONNECTIONS};
use crate::mcp::ServerProfile;

pub use routes::create_router;
pub use state::AppState;

pub const DEFAULT_PORT: u16 = 3000;

/// Errors raised while serving HTTP.
#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("Failed to bind {addr}: {source}")]
    #[diagnostic(
        code(folio::api::bind),
        help("Is another process already listening on this port?")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    #[diagnostic(code(folio::api::serve))]
    Serve(#[source] std::io::Error),
}

/// Server configuration
///
/// Precedence is CLI flag > environment variable > default: build with
/// [`Config::new`] and apply CLI values through the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Host address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Tool groups to expose
    pub profile: ServerProfile,
    /// Size of the connection pool
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            db_path: default_db_path(),
            profile: ServerProfile::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    /// Defaults overridden by `FOLIO_DB`, `FOLIO_HOST`, `FOLIO_PORT` and
    /// `FOLIO_PROFILE`. Unparseable values are ignored with a warning.
    pub fn new() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("FOLIO_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(host) = parse_env("FOLIO_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_env("FOLIO_PORT") {
            config.port = port;
        }
        if let Some(profile) = parse_env("FOLIO_PROFILE") {
            config.profile = profile;
        }

        config
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_profile(mut self, profile: ServerProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key = %key, value = %value, error = %e, "Ignoring invalid environment variable");
            None
        }
    }
}

/// `$XDG_DATA_HOME/folio/folio.db`, falling back to `~/.local/share`.
pub fn default_db_path() -> PathBuf {
    let data_home = env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|_| PathBuf::from("."));

    data_home.join("folio").join("folio.db")
}

/// Initialize tracing subscriber with env filter
///
/// Logs go to stderr; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Serve the MCP endpoint until Ctrl-C.
pub async fn run<D: Database + 'static>(config: Config, db: D) -> Result<(), ApiError> {
    let cancellation_token = CancellationToken::new();
    let app = create_router(Arc::new(db), config.profile, cancellation_token.clone());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })?;
    info!(profile = %config.profile, "MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
            cancellation_token.cancel();
        })
        .await
        .map_err(ApiError::Serve)
}
