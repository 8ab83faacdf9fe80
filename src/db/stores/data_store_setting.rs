// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use sqlx::query_as;
use uuid::Uuid;

use crate::db::errors::StoreError;
use crate::db::models::{DataStoreSetting, DataStoreSettingRow, DataStoreType};
use crate::db::stores::writes;
use crate::db::SqlStore;

/// Storage of per-interview data store settings outside the aggregate
/// update, used by the OAuth callback and the schema refresh operations.
impl SqlStore {
    /// Get the setting an interview holds for one provider.
    pub async fn get_data_store_setting(
        &self,
        interview_id: &Uuid,
        setting_type: DataStoreType,
    ) -> Result<DataStoreSetting, StoreError> {
        let row: Option<DataStoreSettingRow> = query_as(
            "
            SELECT
                id,
                type,
                config,
                interview_id
            FROM
                data_store_setting
            WHERE
                interview_id = $1
                AND type = $2
            ",
        )
        .bind(interview_id.to_string())
        .bind(setting_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let setting =
            DataStoreSetting::try_from(row.ok_or(StoreError::NotFound("data store setting"))?)?;

        Ok(setting)
    }

    /// Write a setting back, creating it when it does not exist yet. The
    /// unique constraint on (interview, provider) stays enforced by the
    /// database.
    pub async fn save_data_store_setting(
        &self,
        mut setting: DataStoreSetting,
    ) -> Result<DataStoreSetting, StoreError> {
        if setting.id.is_none() {
            setting.id = Some(Uuid::new_v4());
        }

        let mut tx = self.pool.begin().await?;
        writes::upsert_data_store_setting(&mut tx, &setting).await?;
        tx.commit().await?;

        Ok(setting)
    }
}
