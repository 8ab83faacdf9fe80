// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use clap::Parser;
use log::info;

use canvass::db::{connection_pool, create_database, run_pending_migrations, SqlStore};
use canvass::http::http_service;
use canvass::{Configuration, Context};

#[derive(Parser, Debug)]
#[command(name = "canvass", version)]
/// Backend service for building and serving multi-screen interviews.
struct Cli {
    /// Port for the http server, 8000 by default.
    #[arg(short = 'P', long)]
    http_port: Option<u16>,

    /// URL / connection string to PostgreSQL or SQLite database.
    #[arg(short, long)]
    database_url: Option<String>,
}

impl Cli {
    /// Load configuration from the environment and apply CLI overrides.
    fn configuration(self) -> Result<Configuration> {
        let mut config = Configuration::from_env()?;

        if let Some(http_port) = self.http_port {
            config.http_port = http_port;
        }
        if let Some(database_url) = self.database_url {
            config.database_url = database_url;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Parse command line arguments and load configuration
    let cli = Cli::parse();
    let config = cli.configuration()?;

    // Prepare the database and run any pending migrations
    create_database(&config.database_url).await?;
    let pool = connection_pool(&config.database_url, config.database_max_connections).await?;
    run_pending_migrations(&pool).await?;

    let context = Context::new(SqlStore::new(pool), config);

    info!("Serving interviews on port {}", context.config.http_port);

    // Run this until [CTRL] + [C] got pressed or something went wrong
    http_service(context).await?;

    Ok(())
}
