// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use serde::Deserialize;

/// Configuration object holding all important variables throughout the application.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// URL / connection string to PostgreSQL or SQLite database.
    pub database_url: String,

    /// Maximum number of connections that the database pool should maintain.
    ///
    /// Be mindful of the connection limits for the database as well as other applications which
    /// may want to connect to the same database.
    pub database_max_connections: u32,

    /// HTTP port serving the REST API, 8000 by default.
    pub http_port: u16,

    /// Public base URL of this server, used to build OAuth redirect URIs.
    pub server_uri: String,

    /// Base URL of the builder frontend, used as redirect target after an
    /// OAuth flow completes.
    pub client_uri: String,

    /// OAuth client id registered with Airtable.
    pub airtable_client_id: Option<String>,

    /// OAuth scopes requested from Airtable.
    pub airtable_scope: String,

    /// How long an OAuth `state` entry may sit in the in-process cache before
    /// it is evicted, in seconds.
    pub oauth_state_ttl_secs: u64,
}

impl Configuration {
    /// Read configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let config = envy::from_env::<Configuration>()?;
        Ok(config)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            database_max_connections: 32,
            http_port: 8000,
            server_uri: "http://localhost:8000".into(),
            client_uri: "http://localhost:3000".into(),
            airtable_client_id: None,
            airtable_scope: concat!(
                "data.records:read data.records:write ",
                "schema.bases:read user.email:read"
            )
            .into(),
            oauth_state_ttl_secs: 600,
        }
    }
}
