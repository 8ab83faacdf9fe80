// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields, OrderedEntity};

/// How a submission action writes to the external data store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionActionType {
    /// Update an existing row; `target` is the entry whose response holds
    /// the row to edit.
    EditRow,

    /// Insert a new row; `target` is the external table id.
    InsertRow,
}

impl SubmissionActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionActionType::EditRow => "edit_row",
            SubmissionActionType::InsertRow => "insert_row",
        }
    }
}

/// Struct representing the actual SQL row of `SubmissionAction`.
#[derive(FromRow, Debug, Clone)]
pub struct SubmissionActionRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub action_type: String,
    pub target: String,
    pub field_mappings: String,
    pub order: i32,
    pub interview_id: String,
}

/// A side effect performed against the external data store when an interview
/// is submitted, mapping entry response keys to target fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAction {
    /// Unset until the action is first persisted.
    pub id: Option<Uuid>,

    #[serde(rename = "type")]
    pub action_type: SubmissionActionType,

    /// The external table (insert) or entry (edit) this action writes to.
    pub target: String,

    /// Maps external field ids to the response key supplying the value;
    /// unmapped fields stay `None`.
    pub field_mappings: BTreeMap<String, Option<String>>,

    /// 1-based position among the interview's submission actions.
    pub order: i32,

    /// Owning interview.
    pub interview_id: Uuid,
}

impl Identifiable for SubmissionAction {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl OrderedEntity for SubmissionAction {
    fn order(&self) -> i32 {
        self.order
    }
}

impl MergeFields for SubmissionAction {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.action_type, &incoming.action_type);
        merge_field(&mut self.target, &incoming.target);
        merge_field(&mut self.field_mappings, &incoming.field_mappings);
        merge_field(&mut self.order, &incoming.order);
        merge_field(&mut self.interview_id, &incoming.interview_id);
    }
}

/// Convert SQL row representation `SubmissionActionRow` to the typed action.
impl TryFrom<SubmissionActionRow> for SubmissionAction {
    type Error = anyhow::Error;

    fn try_from(row: SubmissionActionRow) -> Result<Self, Self::Error> {
        let action_type: SubmissionActionType =
            serde_json::from_value(serde_json::Value::String(row.action_type.clone()))?;

        Ok(Self {
            id: Some(row.id.parse()?),
            action_type,
            target: row.target,
            field_mappings: serde_json::from_str(&row.field_mappings)?,
            order: row.order,
            interview_id: row.interview_id.parse()?,
        })
    }
}
