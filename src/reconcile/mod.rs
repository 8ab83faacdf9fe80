// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reconciliation of client-submitted sibling collections against persisted
//! state.
//!
//! Whenever a client submits a full nested representation of an interview (or
//! a single screen) the service has to work out which child rows to insert,
//! which to update in place and which to delete, while keeping the 1-based
//! contiguous `order` sequence of every sibling collection intact. The three
//! pieces live here:
//!
//! - [`diff::reconcile`]: the create / update / delete diff over any
//!   [`diff::Identifiable`] entity type,
//! - [`ordering::validate_sequential_order`]: the contiguity check applied to
//!   incoming collections before any row is written,
//! - [`position::adjust_screen_order`]: out-of-band insertion of a new screen
//!   at an explicit position, shifting its siblings to make room.
pub mod diff;
pub mod ordering;
pub mod position;

pub use diff::{reconcile, Identifiable, MergeFields};
pub use ordering::{validate_sequential_order, OrderError, OrderedEntity};
pub use position::{
    adjust_screen_order, promote_starting_screen, reorder_screens, replace_starting_state,
};
