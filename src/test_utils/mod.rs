// SPDX-License-Identifier: AGPL-3.0-or-later

mod app;
mod client;
mod config;
mod db;
mod helpers;
mod runner;

pub use app::TestApp;
pub use client::{http_test_client, TestClient};
pub use config::{TestConfiguration, TEST_CONFIG};
pub use db::{drop_database, initialize_db};
pub use helpers::{localized, test_entry, test_interview, test_screen_payload, test_user};
pub use runner::test_runner;

/// Identity used as the requesting user throughout the tests.
pub const TEST_USER_ID: &str = "auth0|test-user";
