// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields, OrderedEntity};

/// Comparison operators available to a [`SingleCondition`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionalOperator {
    // Date operators.
    #[serde(rename = "after")]
    After,
    #[serde(rename = "after_or_equal")]
    AfterOrEqual,
    #[serde(rename = "before")]
    Before,
    #[serde(rename = "before_or_equal")]
    BeforeOrEqual,
    #[serde(rename = "equals_date")]
    EqualsDate,

    // Numeric operators.
    #[serde(rename = "always_execute")]
    AlwaysExecute,
    #[serde(rename = "eq")]
    Equals,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanOrEqual,

    // Generic operators.
    #[serde(rename = "is_empty")]
    IsEmpty,
    #[serde(rename = "is_not_empty")]
    IsNotEmpty,
}

/// A single comparison of one response datum against a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SingleCondition {
    pub id: String,

    pub conditional_operator: ConditionalOperator,

    /// The key within the response data which maps to the datum being
    /// compared. Not needed for `always_execute`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,

    /// When the response behind `response_key` holds an object, the field to
    /// take from that object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_key_lookup_field: Option<String>,

    /// The value to compare against. Not needed for `always_execute`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A boolean combination of conditions; groups may nest arbitrarily.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionGroup {
    And {
        id: String,
        conditions: Vec<Condition>,
    },
    Or {
        id: String,
        conditions: Vec<Condition>,
    },
}

/// A leaf comparison or a nested group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Condition {
    Group(ConditionGroup),
    Single(SingleCondition),
}

/// What to do when a clause's condition group evaluates to true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Push screens onto the respondent's stack.
    Push { id: String, payload: Vec<Uuid> },

    /// Skip the next screen, answering in place of the respondent.
    Skip { id: String, payload: Value },

    /// Store a named checkpoint of the response data.
    Checkpoint { id: String, payload: String },

    /// Restore a previously stored checkpoint.
    Restore { id: String, payload: String },

    /// Mark a milestone as reached.
    Milestone { id: String, payload: String },

    /// End the interview.
    EndInterview { id: String },
}

/// An if/else tree deciding how the interview branches after a screen.
///
/// The else branch is either a terminal action or a nested clause, so a
/// chain of `else if`s is represented by recursion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IfClause {
    pub id: String,
    pub condition_group: ConditionGroup,
    pub action: ActionConfig,
    pub else_clause: Box<ElseClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ElseClause {
    If(IfClause),
    Action(ActionConfig),
}

/// Struct representing the actual SQL row of `ConditionalAction`.
#[derive(FromRow, Debug, Clone)]
pub struct ConditionalActionRow {
    pub id: String,
    pub if_clause: String,
    pub order: i32,
    pub screen_id: String,
}

/// A branching rule attached to a screen, evaluated in `order` when the
/// screen is submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAction {
    /// Unset until the action is first persisted.
    pub id: Option<Uuid>,

    pub if_clause: IfClause,

    /// 1-based position among the screen's actions.
    pub order: i32,

    /// Owning screen.
    pub screen_id: Uuid,
}

impl Identifiable for ConditionalAction {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl OrderedEntity for ConditionalAction {
    fn order(&self) -> i32 {
        self.order
    }
}

impl MergeFields for ConditionalAction {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.if_clause, &incoming.if_clause);
        merge_field(&mut self.order, &incoming.order);
        merge_field(&mut self.screen_id, &incoming.screen_id);
    }
}

/// Convert SQL row representation `ConditionalActionRow` to the typed action.
impl TryFrom<ConditionalActionRow> for ConditionalAction {
    type Error = anyhow::Error;

    fn try_from(row: ConditionalActionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id.parse()?),
            if_clause: serde_json::from_str(&row.if_clause)?,
            order: row.order,
            screen_id: row.screen_id.parse()?,
        })
    }
}
