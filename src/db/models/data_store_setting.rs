// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields};

/// The external data store providers an interview can be bound to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataStoreType {
    Airtable,
    GoogleSheets,
}

impl DataStoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStoreType::Airtable => "airtable",
            DataStoreType::GoogleSheets => "google_sheets",
        }
    }
}

/// One field of an Airtable table, as mirrored from the provider's metadata
/// API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AirtableField {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// Provider-specific field options, kept verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AirtableTable {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<AirtableField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AirtableBase {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tables: Vec<AirtableTable>,
}

/// OAuth tokens for the Airtable API. Expiry timestamps are unix epoch
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AirtableAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Authentication plus the mirrored schema for one Airtable account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AirtableConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub auth_settings: AirtableAuthConfig,
    /// An Airtable schema is represented by a list of bases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bases: Option<Vec<AirtableBase>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsWorksheet {
    pub title: String,
    /// Column names taken from the worksheet's header row.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsSpreadsheet {
    pub id: String,
    pub title: String,
    pub worksheets: Vec<GoogleSheetsWorksheet>,
}

/// Authentication plus the mirrored schema for one Google Sheets account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsConfig {
    pub auth_settings: GoogleSheetsAuthConfig,
    /// A Google Sheets schema is represented by a list of spreadsheets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheets: Option<Vec<GoogleSheetsSpreadsheet>>,
}

/// Discriminated union over the per-provider configuration blobs, stored as
/// one JSON column and dispatched on its `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataStoreConfig {
    Airtable(AirtableConfig),
    GoogleSheets(GoogleSheetsConfig),
}

impl DataStoreConfig {
    /// The provider this configuration belongs to.
    pub fn data_store_type(&self) -> DataStoreType {
        match self {
            DataStoreConfig::Airtable(_) => DataStoreType::Airtable,
            DataStoreConfig::GoogleSheets(_) => DataStoreType::GoogleSheets,
        }
    }
}

/// Struct representing the actual SQL row of `DataStoreSetting`.
#[derive(FromRow, Debug, Clone)]
pub struct DataStoreSettingRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub setting_type: String,
    pub config: String,
    pub interview_id: String,
}

/// One external integration's configuration for an interview; at most one
/// per (interview, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataStoreSetting {
    /// Unset until the setting is first persisted.
    pub id: Option<Uuid>,

    #[serde(rename = "type")]
    pub setting_type: DataStoreType,

    pub config: DataStoreConfig,

    /// Owning interview.
    pub interview_id: Uuid,
}

impl Identifiable for DataStoreSetting {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl MergeFields for DataStoreSetting {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.setting_type, &incoming.setting_type);
        merge_field(&mut self.config, &incoming.config);
        merge_field(&mut self.interview_id, &incoming.interview_id);
    }
}

/// Convert SQL row representation `DataStoreSettingRow` to the typed setting.
impl TryFrom<DataStoreSettingRow> for DataStoreSetting {
    type Error = anyhow::Error;

    fn try_from(row: DataStoreSettingRow) -> Result<Self, Self::Error> {
        let setting_type: DataStoreType =
            serde_json::from_value(Value::String(row.setting_type.clone()))?;

        Ok(Self {
            id: Some(row.id.parse()?),
            setting_type,
            config: serde_json::from_str(&row.config)?,
            interview_id: row.interview_id.parse()?,
        })
    }
}
