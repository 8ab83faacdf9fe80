// SPDX-License-Identifier: AGPL-3.0-or-later

//! # canvass
//!
//! Backend service for building and serving multi-screen "interviews":
//! structured forms whose screens, entries and conditional branching logic
//! live in a relational database and are exposed over a CRUD REST API.
//! Interview authors can bind form fields to live records in external
//! spreadsheet-like data stores (Airtable, Google Sheets).
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

mod config;
mod context;
pub mod data_store;
pub mod db;
mod errors;
pub mod http;
pub mod reconcile;

#[cfg(test)]
mod test_utils;

pub use crate::config::Configuration;
pub use crate::context::Context;
pub use crate::errors::AppError;
