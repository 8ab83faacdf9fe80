// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed access to interview data on top of [`crate::db::SqlStore`].
//!
//! Each store module adds methods to `SqlStore` for one aggregate or entity.
//! Aggregate updates run the list reconciliation from [`crate::reconcile`]
//! and persist the outcome inside a single transaction.
pub mod data_store_setting;
pub mod interview;
pub mod interview_screen;
pub mod user;

pub(crate) mod writes;
