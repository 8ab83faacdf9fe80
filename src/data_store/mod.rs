// SPDX-License-Identifier: AGPL-3.0-or-later

//! Clients for the external data stores an interview can be bound to.
//!
//! Interviews read and write their respondent data through a provider API
//! (Airtable or Google Sheets). The providers' schemas are mirrored into the
//! interview's data store settings so the builder frontend can offer field
//! pickers without hitting the provider on every keystroke.
use http::StatusCode;

pub mod airtable;
pub mod google_sheets;
pub mod oauth;

pub use airtable::AirtableApi;
pub use google_sheets::GoogleSheetsApi;
pub use oauth::OauthStateCache;

use crate::db::models::{DataStoreConfig, DataStoreSetting};

/// Errors for calls against an external data store provider.
#[derive(thiserror::Error, Debug)]
pub enum DataStoreError {
    /// The interview holds no settings for the addressed provider.
    #[error("interview has no {0} settings")]
    NotConfigured(&'static str),

    /// The settings exist but carry no usable credentials.
    #[error("missing {0} credentials")]
    MissingCredentials(&'static str),

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// Transport-level failure talking to the provider.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl DataStoreError {
    /// The HTTP status this error maps onto when surfaced to API clients.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DataStoreError::NotConfigured(_) => StatusCode::NOT_FOUND,
            DataStoreError::MissingCredentials(_) => StatusCode::BAD_REQUEST,
            DataStoreError::Provider { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            DataStoreError::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Re-fetch the provider's schema into the given setting's config.
///
/// For Google Sheets the schema covers the given spreadsheet ids, falling
/// back to the ones already mirrored. The caller persists the updated
/// setting afterwards.
pub async fn refresh_schema(
    setting: &mut DataStoreSetting,
    spreadsheet_ids: Option<&[String]>,
) -> Result<(), DataStoreError> {
    match &mut setting.config {
        DataStoreConfig::Airtable(config) => {
            let api = AirtableApi::new(config)?;
            config.bases = Some(api.fetch_schema().await?);
        }
        DataStoreConfig::GoogleSheets(config) => {
            let api = GoogleSheetsApi::new(config)?;
            let ids: Vec<String> = match spreadsheet_ids {
                Some(ids) => ids.to_vec(),
                None => config
                    .spreadsheets
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|spreadsheet| spreadsheet.id.clone())
                    .collect(),
            };

            let mut spreadsheets = Vec::with_capacity(ids.len());
            for id in &ids {
                spreadsheets.push(api.fetch_spreadsheet(id).await?);
            }
            config.spreadsheets = Some(spreadsheets);
        }
    }

    Ok(())
}
