// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::models::{DataStoreSetting, InterviewScreen, SubmissionAction};
use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields};

/// Struct representing the actual SQL row of `Interview`.
///
/// `allowed_languages` is stored as a JSON text column and timestamps as
/// RFC 3339 strings since not all database backends share richer column
/// types.
#[derive(FromRow, Debug, Clone)]
pub struct InterviewRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub vanity_url: Option<String>,
    pub published: bool,
    pub owner_id: String,
    pub default_language: String,
    pub allowed_languages: String,
    pub created_date: String,
}

/// The aggregate root: an interview together with its screens, submission
/// actions and data store settings, persisted and updated as one
/// transactional unit.
///
/// A published interview must carry a vanity url; the unique constraint on
/// that column lives in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    /// Unset until the interview is first persisted.
    pub id: Option<Uuid>,

    pub name: String,

    pub description: String,

    pub notes: String,

    /// Public URL slug; unique across all interviews, required once
    /// published.
    pub vanity_url: Option<String>,

    pub published: bool,

    /// The user owning this interview.
    pub owner_id: String,

    pub default_language: String,

    pub allowed_languages: Vec<String>,

    /// Set by the database on creation.
    pub created_date: Option<DateTime<Utc>>,

    /// The interview's pages, ordered by their `order` field.
    #[serde(default)]
    pub screens: Vec<InterviewScreen>,

    /// Side effects run when the interview is submitted.
    #[serde(default)]
    pub submission_actions: Vec<SubmissionAction>,

    /// External data store integrations, at most one per provider.
    #[serde(default)]
    pub data_store_settings: Vec<DataStoreSetting>,
}

/// Payload for creating a new interview.
///
/// Everything beyond the basics starts empty: the interview is created
/// unpublished, owned by the requesting user and seeded with one default
/// screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewCreate {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub notes: String,

    pub vanity_url: Option<String>,

    pub default_language: Option<String>,

    #[serde(default)]
    pub allowed_languages: Vec<String>,
}

impl InterviewCreate {
    /// Turn the payload into an unsaved interview owned by the given user.
    pub fn into_interview(self, owner_id: String) -> Interview {
        let default_language = self.default_language.unwrap_or_else(|| "en".to_string());
        let mut allowed_languages = self.allowed_languages;
        if allowed_languages.is_empty() {
            allowed_languages = vec![default_language.clone()];
        }

        Interview {
            id: None,
            name: self.name,
            description: self.description,
            notes: self.notes,
            vanity_url: self.vanity_url,
            published: false,
            owner_id,
            default_language,
            allowed_languages,
            created_date: None,
            screens: Vec::new(),
            submission_actions: Vec::new(),
            data_store_settings: Vec::new(),
        }
    }
}

impl Identifiable for Interview {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl MergeFields for Interview {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.name, &incoming.name);
        merge_field(&mut self.description, &incoming.description);
        merge_field(&mut self.notes, &incoming.notes);
        merge_field(&mut self.vanity_url, &incoming.vanity_url);
        merge_field(&mut self.published, &incoming.published);
        merge_field(&mut self.owner_id, &incoming.owner_id);
        merge_field(&mut self.default_language, &incoming.default_language);
        merge_field(&mut self.allowed_languages, &incoming.allowed_languages);
        // `screens`, `submission_actions` and `data_store_settings` are
        // reconciled as collections of their own; `created_date` never
        // changes after creation.
    }
}

/// Convert SQL row representation `InterviewRow` to the typed interview.
impl TryFrom<InterviewRow> for Interview {
    type Error = anyhow::Error;

    fn try_from(row: InterviewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id.parse()?),
            name: row.name,
            description: row.description,
            notes: row.notes,
            vanity_url: row.vanity_url,
            published: row.published,
            owner_id: row.owner_id,
            default_language: row.default_language,
            allowed_languages: serde_json::from_str(&row.allowed_languages)?,
            created_date: Some(row.created_date.parse::<DateTime<Utc>>()?),
            screens: Vec::new(),
            submission_actions: Vec::new(),
            data_store_settings: Vec::new(),
        })
    }
}
