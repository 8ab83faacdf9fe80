// SPDX-License-Identifier: AGPL-3.0-or-later

use log::debug;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::data_store::DataStoreError;
use crate::db::models::{GoogleSheetsConfig, GoogleSheetsSpreadsheet, GoogleSheetsWorksheet};

const API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Thin client over the Google Sheets API.
#[derive(Debug, Clone)]
pub struct GoogleSheetsApi {
    client: Client,
    access_token: String,
}

impl GoogleSheetsApi {
    /// Build a client from an interview's Google Sheets settings.
    pub fn new(config: &GoogleSheetsConfig) -> Result<Self, DataStoreError> {
        let access_token = config
            .auth_settings
            .access_token
            .clone()
            .ok_or(DataStoreError::MissingCredentials("google sheets"))?;

        Ok(Self {
            client: Client::new(),
            access_token,
        })
    }

    /// Fetch a spreadsheet's title and worksheets; each worksheet's columns
    /// are read from its first row.
    pub async fn fetch_spreadsheet(
        &self,
        spreadsheet_id: &str,
    ) -> Result<GoogleSheetsSpreadsheet, DataStoreError> {
        #[derive(Deserialize)]
        struct Properties {
            title: String,
        }

        #[derive(Deserialize)]
        struct Sheet {
            properties: Properties,
        }

        #[derive(Deserialize)]
        struct Spreadsheet {
            properties: Properties,
            #[serde(default)]
            sheets: Vec<Sheet>,
        }

        let url = format!(
            "{}/{}?fields=properties.title,sheets.properties.title",
            API_URL, spreadsheet_id
        );
        let response = self.client.get(&url).bearer_auth(&self.access_token);
        let spreadsheet = parse_json::<Spreadsheet>(response.send().await?).await?;

        let mut worksheets = Vec::with_capacity(spreadsheet.sheets.len());
        for sheet in spreadsheet.sheets {
            let title = sheet.properties.title;
            debug!("Reading header row of worksheet '{}'", title);
            let columns = self.fetch_header_row(spreadsheet_id, &title).await?;
            worksheets.push(GoogleSheetsWorksheet { title, columns });
        }

        Ok(GoogleSheetsSpreadsheet {
            id: spreadsheet_id.to_string(),
            title: spreadsheet.properties.title,
            worksheets,
        })
    }

    async fn fetch_header_row(
        &self,
        spreadsheet_id: &str,
        worksheet_title: &str,
    ) -> Result<Vec<String>, DataStoreError> {
        #[derive(Deserialize)]
        struct ValueRange {
            #[serde(default)]
            values: Vec<Vec<String>>,
        }

        let url = format!(
            "{}/{}/values/{}!1:1",
            API_URL, spreadsheet_id, worksheet_title
        );
        let response = self.client.get(&url).bearer_auth(&self.access_token);
        let range = parse_json::<ValueRange>(response.send().await?).await?;

        Ok(range.values.into_iter().next().unwrap_or_default())
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
