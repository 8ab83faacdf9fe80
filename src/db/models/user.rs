// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Struct representing the actual SQL row of `User`.
#[derive(FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub identity_provider: String,
    pub family_name: String,
    pub given_name: String,
    pub created_date: String,
}

/// An identity record; the id comes from the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub identity_provider: String,
    pub family_name: String,
    pub given_name: String,
    pub created_date: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            identity_provider: row.identity_provider,
            family_name: row.family_name,
            given_name: row.given_name,
            created_date: Some(row.created_date.parse::<DateTime<Utc>>()?),
        })
    }
}
