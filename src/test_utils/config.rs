// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::Debug;

use once_cell::sync::Lazy;
use serde::Deserialize;

/// Configuration used in test helper methods.
pub static TEST_CONFIG: Lazy<TestConfiguration> = Lazy::new(TestConfiguration::new);

/// Configuration used in test helper methods.
#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct TestConfiguration {
    /// Database url (SQLite or PostgreSQL).
    pub database_url: String,
}

impl TestConfiguration {
    pub fn new() -> Self {
        envy::from_env::<TestConfiguration>()
            .expect("Could not read environment variables for test configuration")
    }
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            // SQLite database stored in memory. sqlx rewrites `:memory:`
            // into a unique shared URI per pool, so every connection of the
            // pool sees the same database and each test gets its own.
            database_url: "sqlite::memory:".into(),
        }
    }
}
