use std::{env, sync::Arc};

use colored::{Color, Colorize};
use log::{error, info, warn};
use shala_core::{Config, ConfigError};
use shala_server::DEFAULT_PORT;
use shala_studio::{DatabaseError, MemoryDatabase, PgDatabase, SharedDatabase, Studio};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

const PORT_VAR: &str = "SHALA_SERVER_PORT";
const DATABASE_URL_VAR: &str = "DATABASE_URL";

struct Shala {
    studio: Arc<Studio>,
    port: u16,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum ShalaError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("SHALA_SERVER_PORT must be a port number, got {0:?}")]
    Port(String),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Shala {
    fn new() -> Result<Self, ShalaError> {
        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("shala-async")
            .build()
            .map_err(|e| ShalaError::Fatal(e.to_string()))?;

        let config = Config::from_env()?;
        let port = read_port()?;

        info!(
            "Check-ins open {} minutes ahead, can be cancelled up to {} minutes ahead, entry closes {} minutes after start",
            config.minutes_to_check_in,
            config.minutes_to_cancel_check_in,
            config.tolerance_minutes_to_enter_event
        );

        let database: SharedDatabase = match env::var(DATABASE_URL_VAR) {
            Ok(url) => {
                info!("Connecting to database...");
                Arc::new(runtime.block_on(PgDatabase::new(&url))?)
            }
            Err(_) => {
                warn!(
                    "{} is not set, data is kept in memory and lost on exit",
                    DATABASE_URL_VAR
                );
                Arc::new(MemoryDatabase::new())
            }
        };

        let studio = Studio::new(config, database);

        Ok(Self {
            studio: Arc::new(studio),
            port,
            runtime,
        })
    }

    fn run(&self) -> Result<(), ShalaError> {
        logging::spawn_activity_logger(self.studio.activity());

        self.runtime
            .block_on(shala_server::run_server(self.studio.clone(), self.port))
            .map_err(ShalaError::Server)
    }
}

impl ShalaError {
    fn hint(&self) -> String {
        match self {
            ShalaError::Config(e) => format!("Unset {} to use the default, or set it to a number.", e.variable),
            ShalaError::Port(_) => format!("Unset {} to use the default port {}.", PORT_VAR, DEFAULT_PORT),
            ShalaError::Database(_) => "This is a database error. Make sure the PostgreSQL instance is running and DATABASE_URL is correct, then try again.".to_string(),
            ShalaError::Server(_) => "Make sure no other process is using the port.".to_string(),
            ShalaError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn read_port() -> Result<u16, ShalaError> {
    match env::var(PORT_VAR) {
        Ok(value) => value.trim().parse().map_err(|_| ShalaError::Port(value)),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", e);
    }

    let result = Shala::new().and_then(|shala| {
        info!("Initialized successfully.");
        shala.run()
    });

    if let Err(error) = result {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Shala failed to start!".bold().color(Color::Red));
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint())
                .color(Color::BrightBlack)
                .italic()
        );
    }
}
