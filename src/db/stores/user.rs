// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use chrono::Utc;
use sqlx::{query, query_as};

use crate::db::errors::StoreError;
use crate::db::models::{User, UserRow};
use crate::db::SqlStore;

impl SqlStore {
    /// Get a user by the id assigned by the identity provider.
    pub async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        let row: Option<UserRow> = query_as(
            "
            SELECT
                id,
                email,
                identity_provider,
                family_name,
                given_name,
                created_date
            FROM
                users
            WHERE
                id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let user = User::try_from(row.ok_or(StoreError::NotFound("user"))?)?;

        Ok(user)
    }

    /// Write a user record, creating it on first sight of the identity and
    /// refreshing the profile fields afterwards.
    pub async fn upsert_user(&self, mut user: User) -> Result<User, StoreError> {
        if user.created_date.is_none() {
            user.created_date = Some(Utc::now());
        }
        let created_date = user
            .created_date
            .ok_or_else(|| StoreError::Validation("user is missing a creation date".to_string()))?;

        query(
            "
            INSERT INTO
                users (id, email, identity_provider, family_name, given_name, created_date)
            VALUES
                ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                email = $2,
                identity_provider = $3,
                family_name = $4,
                given_name = $5
            ",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.identity_provider)
        .bind(&user.family_name)
        .bind(&user.given_name)
        .bind(created_date.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(user)
    }
}
