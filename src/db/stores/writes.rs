// SPDX-License-Identifier: AGPL-3.0-or-later

//! Row-level writers shared by the stores.
//!
//! All writers are upserts keyed on the primary id so a reconciled aggregate
//! can be persisted in one pass. Callers run them inside a transaction and
//! commit once the whole aggregate is written.
use serde::Serialize;
use sqlx::{query, Any, Transaction};
use uuid::Uuid;

use crate::db::errors::StoreError;
use crate::db::models::{
    ConditionalAction, DataStoreSetting, Interview, InterviewScreen, ScreenEntry, SubmissionAction,
};

/// Unwrap an id which must be assigned before its row can be written.
pub(crate) fn require_id(id: Option<Uuid>, entity: &'static str) -> Result<Uuid, StoreError> {
    id.ok_or_else(|| StoreError::Validation(format!("{} is missing an id", entity)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::InvalidRow(err.into()))
}

pub(crate) async fn upsert_interview(
    tx: &mut Transaction<'_, Any>,
    interview: &Interview,
) -> Result<(), StoreError> {
    let id = require_id(interview.id, "interview")?;
    let created_date = interview
        .created_date
        .ok_or_else(|| StoreError::Validation("interview is missing a creation date".to_string()))?;

    query(
        "
        INSERT INTO
            interview (
                id,
                name,
                description,
                notes,
                vanity_url,
                published,
                owner_id,
                default_language,
                allowed_languages,
                created_date
            )
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            name = $2,
            description = $3,
            notes = $4,
            vanity_url = $5,
            published = $6,
            owner_id = $7,
            default_language = $8,
            allowed_languages = $9,
            created_date = $10
        ",
    )
    .bind(id.to_string())
    .bind(&interview.name)
    .bind(&interview.description)
    .bind(&interview.notes)
    .bind(&interview.vanity_url)
    .bind(interview.published)
    .bind(&interview.owner_id)
    .bind(&interview.default_language)
    .bind(to_json(&interview.allowed_languages)?)
    .bind(created_date.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_screen(
    tx: &mut Transaction<'_, Any>,
    screen: &InterviewScreen,
) -> Result<(), StoreError> {
    let id = require_id(screen.id, "interview screen")?;

    query(
        r#"
        INSERT INTO
            interview_screen (
                id,
                header_text,
                title,
                "order",
                is_in_starting_state,
                starting_state_order,
                interview_id
            )
        VALUES
            ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            header_text = $2,
            title = $3,
            "order" = $4,
            is_in_starting_state = $5,
            starting_state_order = $6,
            interview_id = $7
        "#,
    )
    .bind(id.to_string())
    .bind(to_json(&screen.header_text)?)
    .bind(to_json(&screen.title)?)
    .bind(screen.order)
    .bind(screen.is_in_starting_state)
    .bind(screen.starting_state_order)
    .bind(screen.interview_id.to_string())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_entry(
    tx: &mut Transaction<'_, Any>,
    entry: &ScreenEntry,
) -> Result<(), StoreError> {
    let id = require_id(entry.id, "screen entry")?;
    let response_type_options = entry
        .response_type_options
        .as_ref()
        .map(to_json)
        .transpose()?;

    query(
        r#"
        INSERT INTO
            interview_screen_entry (
                id,
                name,
                prompt,
                text,
                required,
                response_key,
                response_type,
                response_type_options,
                "order",
                screen_id
            )
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            name = $2,
            prompt = $3,
            text = $4,
            required = $5,
            response_key = $6,
            response_type = $7,
            response_type_options = $8,
            "order" = $9,
            screen_id = $10
        "#,
    )
    .bind(id.to_string())
    .bind(&entry.name)
    .bind(to_json(&entry.prompt)?)
    .bind(to_json(&entry.text)?)
    .bind(entry.required)
    .bind(&entry.response_key)
    .bind(entry.response_type.as_str())
    .bind(response_type_options)
    .bind(entry.order)
    .bind(entry.screen_id.to_string())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_conditional_action(
    tx: &mut Transaction<'_, Any>,
    action: &ConditionalAction,
) -> Result<(), StoreError> {
    let id = require_id(action.id, "conditional action")?;

    query(
        r#"
        INSERT INTO
            conditional_action (id, if_clause, "order", screen_id)
        VALUES
            ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            if_clause = $2,
            "order" = $3,
            screen_id = $4
        "#,
    )
    .bind(id.to_string())
    .bind(to_json(&action.if_clause)?)
    .bind(action.order)
    .bind(action.screen_id.to_string())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_submission_action(
    tx: &mut Transaction<'_, Any>,
    action: &SubmissionAction,
) -> Result<(), StoreError> {
    let id = require_id(action.id, "submission action")?;

    query(
        r#"
        INSERT INTO
            submission_action (id, type, target, field_mappings, "order", interview_id)
        VALUES
            ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            type = $2,
            target = $3,
            field_mappings = $4,
            "order" = $5,
            interview_id = $6
        "#,
    )
    .bind(id.to_string())
    .bind(action.action_type.as_str())
    .bind(&action.target)
    .bind(to_json(&action.field_mappings)?)
    .bind(action.order)
    .bind(action.interview_id.to_string())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_data_store_setting(
    tx: &mut Transaction<'_, Any>,
    setting: &DataStoreSetting,
) -> Result<(), StoreError> {
    let id = require_id(setting.id, "data store setting")?;

    query(
        "
        INSERT INTO
            data_store_setting (id, type, config, interview_id)
        VALUES
            ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            type = $2,
            config = $3,
            interview_id = $4
        ",
    )
    .bind(id.to_string())
    .bind(setting.setting_type.as_str())
    .bind(to_json(&setting.config)?)
    .bind(setting.interview_id.to_string())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

/// Delete one row by primary id. The table name is always a static string
/// from the callers, never user input.
pub(crate) async fn delete_by_id(
    tx: &mut Transaction<'_, Any>,
    table: &'static str,
    id: Uuid,
) -> Result<(), StoreError> {
    query(&format!("DELETE FROM {} WHERE id = $1", table))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(())
}

/// Delete all entries and conditional actions belonging to a screen.
pub(crate) async fn delete_screen_children(
    tx: &mut Transaction<'_, Any>,
    screen_id: &Uuid,
) -> Result<(), StoreError> {
    query("DELETE FROM interview_screen_entry WHERE screen_id = $1")
        .bind(screen_id.to_string())
        .execute(&mut *tx)
        .await?;

    query("DELETE FROM conditional_action WHERE screen_id = $1")
        .bind(screen_id.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(())
}
