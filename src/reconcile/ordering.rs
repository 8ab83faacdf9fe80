// SPDX-License-Identifier: AGPL-3.0-or-later

/// Entities which carry an `order` field within a sibling collection.
///
/// Within a single parent the set of `order` values across all siblings must
/// be exactly `{1, 2, ..., n}` after any reconciliation completes.
pub trait OrderedEntity {
    fn order(&self) -> i32;
}

/// Errors for sibling orderings which violate the contiguity invariant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The given `order` values do not form a contiguous sequence starting
    /// at 1. Carries the offending values in sorted order.
    #[error("order values {0:?} are not a contiguous sequence starting at 1")]
    NonSequential(Vec<i32>),

    /// A proposed insertion position is neither among the existing orders nor
    /// directly adjacent to them.
    #[error("proposed order {proposed} is not in or adjacent to the current orders {existing:?}")]
    OutOfRange { proposed: i32, existing: Vec<i32> },
}

/// Validates that the `order` fields of the given siblings form a contiguous
/// sequence starting at 1.
///
/// The input is the candidate list about to be written, i.e. the union of
/// created and updated siblings but not the ones being deleted. An empty
/// input is vacuously ordered.
pub fn validate_sequential_order<T: OrderedEntity>(models: &[T]) -> Result<(), OrderError> {
    let mut orders: Vec<i32> = models.iter().map(|model| model.order()).collect();
    orders.sort_unstable();

    let sequential = orders
        .iter()
        .enumerate()
        .all(|(index, order)| *order == index as i32 + 1);

    if sequential {
        Ok(())
    } else {
        Err(OrderError::NonSequential(orders))
    }
}
