// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::models::interview_screen::LocalizedText;
use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields, OrderedEntity};

/// The kinds of responses a screen entry can collect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Airtable,
    Boolean,
    Email,
    Number,
    PhoneNumber,
    SingleSelect,
    Text,
}

/// Struct representing the actual SQL row of `InterviewScreenEntry`.
#[derive(FromRow, Debug, Clone)]
pub struct ScreenEntryRow {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub text: String,
    pub required: bool,
    pub response_key: String,
    pub response_type: String,
    pub response_type_options: Option<String>,
    pub order: i32,
    pub screen_id: String,
}

/// One form field on a screen.
///
/// `response_key` identifies the field within submission payloads;
/// `response_type_options` holds type-specific configuration, e.g. the
/// Airtable base/table/field a lookup entry is bound to, or the choices of a
/// single-select.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenEntry {
    /// Unset until the entry is first persisted.
    pub id: Option<Uuid>,

    pub name: String,

    /// Localized question prompt.
    pub prompt: LocalizedText,

    /// Localized helper text shown with the prompt.
    pub text: LocalizedText,

    /// Whether a respondent must answer before submitting the screen.
    pub required: bool,

    pub response_key: String,

    pub response_type: ResponseType,

    pub response_type_options: Option<Value>,

    /// 1-based position among the screen's entries.
    pub order: i32,

    /// Owning screen.
    pub screen_id: Uuid,
}

impl Identifiable for ScreenEntry {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl OrderedEntity for ScreenEntry {
    fn order(&self) -> i32 {
        self.order
    }
}

impl MergeFields for ScreenEntry {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.name, &incoming.name);
        merge_field(&mut self.prompt, &incoming.prompt);
        merge_field(&mut self.text, &incoming.text);
        merge_field(&mut self.required, &incoming.required);
        merge_field(&mut self.response_key, &incoming.response_key);
        merge_field(&mut self.response_type, &incoming.response_type);
        merge_field(&mut self.response_type_options, &incoming.response_type_options);
        merge_field(&mut self.order, &incoming.order);
        merge_field(&mut self.screen_id, &incoming.screen_id);
    }
}

/// Convert SQL row representation `ScreenEntryRow` to the typed entry.
impl TryFrom<ScreenEntryRow> for ScreenEntry {
    type Error = anyhow::Error;

    fn try_from(row: ScreenEntryRow) -> Result<Self, Self::Error> {
        let response_type: ResponseType =
            serde_json::from_value(Value::String(row.response_type.clone()))?;
        let response_type_options = row
            .response_type_options
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            id: Some(row.id.parse()?),
            name: row.name,
            prompt: serde_json::from_str(&row.prompt)?,
            text: serde_json::from_str(&row.text)?,
            required: row.required,
            response_key: row.response_key,
            response_type,
            response_type_options,
            order: row.order,
            screen_id: row.screen_id.parse()?,
        })
    }
}

impl ResponseType {
    /// The string stored in the `response_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Airtable => "airtable",
            ResponseType::Boolean => "boolean",
            ResponseType::Email => "email",
            ResponseType::Number => "number",
            ResponseType::PhoneNumber => "phone_number",
            ResponseType::SingleSelect => "single_select",
            ResponseType::Text => "text",
        }
    }
}
