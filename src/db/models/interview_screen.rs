// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::models::{ConditionalAction, ScreenEntry};
use crate::reconcile::diff::merge_field;
use crate::reconcile::{Identifiable, MergeFields, OrderedEntity};

/// Translations of one piece of display text, keyed by language code.
pub type LocalizedText = BTreeMap<String, String>;

/// Struct representing the actual SQL row of `InterviewScreen`.
///
/// Localized text maps are stored as JSON text columns.
#[derive(FromRow, Debug, Clone)]
pub struct InterviewScreenRow {
    pub id: String,
    pub header_text: String,
    pub title: String,
    pub order: i32,
    pub is_in_starting_state: bool,
    pub starting_state_order: Option<i32>,
    pub interview_id: String,
}

/// One page of an interview.
///
/// Screens form an ordered sibling collection within their interview: the
/// `order` values of all screens of one interview are contiguous and start
/// at 1. A screen flagged `is_in_starting_state` is eligible to be shown
/// first, ranked among the other starting screens by `starting_state_order`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterviewScreen {
    /// Unset until the screen is first persisted.
    pub id: Option<Uuid>,

    /// Localized text shown above the screen's entries.
    pub header_text: LocalizedText,

    /// Localized screen title.
    pub title: LocalizedText,

    /// 1-based position among the interview's screens.
    pub order: i32,

    /// Whether this screen is part of the starting state.
    pub is_in_starting_state: bool,

    /// Rank among the starting screens, or `None` when not a starting
    /// screen.
    pub starting_state_order: Option<i32>,

    /// Owning interview.
    pub interview_id: Uuid,

    /// Conditional branching rules evaluated when the screen is submitted.
    #[serde(default)]
    pub actions: Vec<ConditionalAction>,

    /// The screen's form fields.
    #[serde(default)]
    pub entries: Vec<ScreenEntry>,
}

impl InterviewScreen {
    /// The default screen every new interview is seeded with.
    pub fn default_screen(interview_id: Uuid) -> Self {
        let mut header_text = LocalizedText::new();
        header_text.insert("en".to_string(), String::new());
        let mut title = LocalizedText::new();
        title.insert("en".to_string(), "Stage 1".to_string());

        Self {
            id: Some(Uuid::new_v4()),
            header_text,
            title,
            order: 1,
            is_in_starting_state: true,
            starting_state_order: Some(1),
            interview_id,
            actions: Vec::new(),
            entries: Vec::new(),
        }
    }
}

/// Payload for creating a new screen.
///
/// `order` is optional: without one the screen is appended after its
/// siblings, with one the siblings get shifted to make room (see
/// [`crate::reconcile::adjust_screen_order`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewScreenCreate {
    pub header_text: LocalizedText,
    pub title: LocalizedText,
    pub order: Option<i32>,
    #[serde(default)]
    pub is_in_starting_state: bool,
    pub starting_state_order: Option<i32>,
    pub interview_id: Uuid,
}

impl InterviewScreenCreate {
    /// Turn the payload into a screen placed at the given position.
    pub fn into_screen(self, order: i32) -> InterviewScreen {
        InterviewScreen {
            id: None,
            header_text: self.header_text,
            title: self.title,
            order,
            is_in_starting_state: self.is_in_starting_state,
            starting_state_order: self.starting_state_order,
            interview_id: self.interview_id,
            actions: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl Identifiable for InterviewScreen {
    fn identity(&self) -> Option<Uuid> {
        self.id
    }
}

impl OrderedEntity for InterviewScreen {
    fn order(&self) -> i32 {
        self.order
    }
}

impl MergeFields for InterviewScreen {
    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.header_text, &incoming.header_text);
        merge_field(&mut self.title, &incoming.title);
        merge_field(&mut self.order, &incoming.order);
        merge_field(&mut self.is_in_starting_state, &incoming.is_in_starting_state);
        merge_field(&mut self.starting_state_order, &incoming.starting_state_order);
        merge_field(&mut self.interview_id, &incoming.interview_id);
        // `actions` and `entries` are reconciled as collections of their own.
    }
}

/// Convert SQL row representation `InterviewScreenRow` to the typed screen.
impl TryFrom<InterviewScreenRow> for InterviewScreen {
    type Error = anyhow::Error;

    fn try_from(row: InterviewScreenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id.parse()?),
            header_text: serde_json::from_str(&row.header_text)?,
            title: serde_json::from_str(&row.title)?,
            order: row.order,
            is_in_starting_state: row.is_in_starting_state,
            starting_state_order: row.starting_state_order,
            interview_id: row.interview_id.parse()?,
            actions: Vec::new(),
            entries: Vec::new(),
        })
    }
}
