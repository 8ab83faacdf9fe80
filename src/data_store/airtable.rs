// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;

use chrono::Utc;
use log::debug;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::data_store::DataStoreError;
use crate::db::models::{AirtableAuthConfig, AirtableBase, AirtableConfig, AirtableTable};

const API_URL: &str = "https://api.airtable.com/v0";
const TOKEN_URL: &str = "https://airtable.com/oauth2/v1/token";

/// Tokens are considered expired slightly early so an in-flight request does
/// not race the actual expiry.
const EXPIRY_MARGIN_MS: i64 = 60_000;

/// One record of an Airtable table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,

    #[serde(default)]
    pub fields: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

/// Thin client over the Airtable REST and metadata APIs.
#[derive(Debug, Clone)]
pub struct AirtableApi {
    client: Client,
    access_token: String,
}

impl AirtableApi {
    /// Build a client from an interview's Airtable settings.
    ///
    /// An OAuth access token takes precedence; a static personal access
    /// token configured as `api_key` works as well.
    pub fn new(config: &AirtableConfig) -> Result<Self, DataStoreError> {
        let access_token = config
            .auth_settings
            .access_token
            .clone()
            .or_else(|| config.api_key.clone())
            .ok_or(DataStoreError::MissingCredentials("airtable"))?;

        Ok(Self {
            client: Client::new(),
            access_token,
        })
    }

    /// Fetch a single record by id.
    pub async fn fetch_record(
        &self,
        base_id: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<Record, DataStoreError> {
        let url = format!("{}/{}/{}/{}", API_URL, base_id, table_id, record_id);
        let response = self.client.get(&url).bearer_auth(&self.access_token);

        let record = parse_json::<Record>(response.send().await?).await?;
        Ok(record)
    }

    /// Search a table for records matching all given (field, value) pairs.
    pub async fn search_records(
        &self,
        base_id: &str,
        table_name: &str,
        query: &BTreeMap<String, String>,
    ) -> Result<Vec<Record>, DataStoreError> {
        let url = format!("{}/{}/{}", API_URL, base_id, table_name);
        let mut request = self.client.get(&url).bearer_auth(&self.access_token);

        if !query.is_empty() {
            request = request.query(&[("filterByFormula", filter_formula(query))]);
        }

        #[derive(Deserialize)]
        struct RecordPage {
            records: Vec<Record>,
        }

        let page = parse_json::<RecordPage>(request.send().await?).await?;
        Ok(page.records)
    }

    /// Create a record. Values are sent with `typecast` enabled so the
    /// provider coerces strings into selects, numbers and collaborators.
    pub async fn create_record(
        &self,
        base_id: &str,
        table_id: &str,
        fields: Value,
    ) -> Result<Record, DataStoreError> {
        let url = format!("{}/{}/{}", API_URL, base_id, table_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields, "typecast": true }));

        let record = parse_json::<Record>(response.send().await?).await?;
        Ok(record)
    }

    /// Update the given fields of a record, leaving the others untouched.
    pub async fn update_record(
        &self,
        base_id: &str,
        table_id: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<Record, DataStoreError> {
        let url = format!("{}/{}/{}/{}", API_URL, base_id, table_id, record_id);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields, "typecast": true }));

        let record = parse_json::<Record>(response.send().await?).await?;
        Ok(record)
    }

    /// Fetch all bases with their tables and fields from the metadata API.
    pub async fn fetch_schema(&self) -> Result<Vec<AirtableBase>, DataStoreError> {
        #[derive(Deserialize)]
        struct BaseStub {
            id: String,
            name: Option<String>,
        }

        #[derive(Deserialize)]
        struct BasePage {
            bases: Vec<BaseStub>,
        }

        #[derive(Deserialize)]
        struct TablePage {
            tables: Vec<AirtableTable>,
        }

        let url = format!("{}/meta/bases", API_URL);
        let response = self.client.get(&url).bearer_auth(&self.access_token);
        let page = parse_json::<BasePage>(response.send().await?).await?;

        let mut bases = Vec::with_capacity(page.bases.len());
        for stub in page.bases {
            debug!("Fetching Airtable table schema for base {}", stub.id);
            let url = format!("{}/meta/bases/{}/tables", API_URL, stub.id);
            let response = self.client.get(&url).bearer_auth(&self.access_token);
            let tables = parse_json::<TablePage>(response.send().await?).await?;

            bases.push(AirtableBase {
                id: stub.id,
                name: stub.name,
                tables: tables.tables,
            });
        }

        Ok(bases)
    }
}

/// Whether the access token of the given auth settings needs a refresh
/// before its next use.
pub fn access_token_expired(auth: &AirtableAuthConfig) -> bool {
    match auth.access_token_expires {
        Some(expires) => expires - EXPIRY_MARGIN_MS <= Utc::now().timestamp_millis(),
        // Tokens without an expiry (static api keys) never refresh.
        None => false,
    }
}

/// Trade an authorization code from the OAuth callback for tokens.
pub async fn exchange_authorization_code(
    client_id: &str,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<AirtableAuthConfig, DataStoreError> {
    let response = Client::new()
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await?;

    let token = parse_json::<TokenResponse>(response).await?;
    Ok(token.into_auth_config())
}

/// Trade a refresh token for a fresh token pair.
pub async fn refresh_access_token(
    client_id: &str,
    auth: &AirtableAuthConfig,
) -> Result<AirtableAuthConfig, DataStoreError> {
    let refresh_token = auth
        .refresh_token
        .as_deref()
        .ok_or(DataStoreError::MissingCredentials("airtable"))?;

    let response = Client::new()
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    let token = parse_json::<TokenResponse>(response).await?;
    Ok(token.into_auth_config())
}

/// Token payload of the Airtable OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    refresh_expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_auth_config(self) -> AirtableAuthConfig {
        let now = Utc::now().timestamp_millis();

        AirtableAuthConfig {
            access_token: Some(self.access_token),
            access_token_expires: Some(now + self.expires_in * 1000),
            refresh_token: self.refresh_token,
            refresh_token_expires: self.refresh_expires_in.map(|secs| now + secs * 1000),
            token_type: self.token_type,
            scope: self.scope,
        }
    }
}

/// Build a `filterByFormula` expression matching all (field, value) pairs.
fn filter_formula(query: &BTreeMap<String, String>) -> String {
    let conditions: Vec<String> = query
        .iter()
        .map(|(field, value)| format!("{{{}}} = '{}'", field, value.replace('\'', "\\'")))
        .collect();

    if conditions.len() == 1 {
        conditions.into_iter().next().unwrap_or_default()
    } else {
        format!("AND({})", conditions.join(", "))
    }
}

async fn parse_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, DataStoreError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(DataStoreError::Provider {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json::<T>().await?)
}
