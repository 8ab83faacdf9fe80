// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed representations of everything stored in the database.
//!
//! Each entity comes in two shapes: a `...Row` struct mirroring the actual
//! SQL row (uuids and JSON blobs as text, since not all database backends
//! share richer column types) and the typed domain struct used everywhere
//! else. Conversions between the two live next to the types.
//!
//! The interview aggregate's types are mutually recursive (an interview owns
//! screens, screens own entries and actions which point back via foreign
//! keys); keeping them in one module tree avoids any deferred-binding tricks.
pub mod conditional_action;
pub mod data_store_setting;
pub mod interview;
pub mod interview_screen;
pub mod screen_entry;
pub mod submission_action;
pub mod user;

pub use conditional_action::{
    ActionConfig, Condition, ConditionGroup, ConditionalAction, ConditionalActionRow,
    ConditionalOperator, ElseClause, IfClause, SingleCondition,
};
pub use data_store_setting::{
    AirtableAuthConfig, AirtableBase, AirtableConfig, AirtableField, AirtableTable,
    DataStoreConfig, DataStoreSetting, DataStoreSettingRow, DataStoreType,
    GoogleSheetsAuthConfig, GoogleSheetsConfig, GoogleSheetsSpreadsheet, GoogleSheetsWorksheet,
};
pub use interview::{Interview, InterviewCreate, InterviewRow};
pub use interview_screen::{
    InterviewScreen, InterviewScreenCreate, InterviewScreenRow, LocalizedText,
};
pub use screen_entry::{ResponseType, ScreenEntry, ScreenEntryRow};
pub use submission_action::{SubmissionAction, SubmissionActionRow, SubmissionActionType};
pub use user::{User, UserRow};
