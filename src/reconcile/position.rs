// SPDX-License-Identifier: AGPL-3.0-or-later

use uuid::Uuid;

use crate::db::models::{InterviewScreen, InterviewScreenCreate};
use crate::reconcile::ordering::OrderError;

/// Place a new screen among its existing siblings, renumbering them where
/// needed.
///
/// Without a requested order the screen is appended after the last sibling.
/// A requested order must be a value already present among the siblings or
/// directly adjacent to either end of the sequence; anything else fails with
/// [`OrderError::OutOfRange`]. On acceptance every sibling at or after the
/// requested position shifts right by one and the new screen takes the
/// requested slot.
///
/// Returns the placed screen and the full sibling list (existing screens
/// with adjusted orders plus the new one); the caller persists all of them.
/// `starting_state_order` is not touched here.
pub fn adjust_screen_order(
    existing: Vec<InterviewScreen>,
    new_screen: InterviewScreenCreate,
) -> Result<(InterviewScreen, Vec<InterviewScreen>), OrderError> {
    let mut sorted = existing;
    sorted.sort_by_key(|screen| screen.order);

    let order = match new_screen.order {
        // No order requested: append after the last sibling.
        None => sorted.last().map(|screen| screen.order).unwrap_or(0) + 1,
        Some(proposed) => {
            let existing_orders: Vec<i32> = sorted.iter().map(|screen| screen.order).collect();
            let first = existing_orders.first().copied().unwrap_or(0);
            let last = existing_orders.last().copied().unwrap_or(0);

            if !existing_orders.contains(&proposed)
                && proposed != first + 1
                && proposed != last + 1
            {
                return Err(OrderError::OutOfRange {
                    proposed,
                    existing: existing_orders,
                });
            }

            // Shift the matching screen and everything after it right by
            // one to make room.
            for screen in sorted.iter_mut() {
                if screen.order >= proposed {
                    screen.order += 1;
                }
            }

            proposed
        }
    };

    let placed = new_screen.into_screen(order);
    sorted.push(placed.clone());

    Ok((placed, sorted))
}

/// Apply a client-submitted screen id ordering, reassigning `order` 1..n.
///
/// Returns whether the screen in first position changed; ids unknown to the
/// sibling set are ignored.
pub fn reorder_screens(screens: &mut [InterviewScreen], new_order: &[Uuid]) -> bool {
    let mut by_order: Vec<&InterviewScreen> = screens.iter().collect();
    by_order.sort_by_key(|screen| screen.order);
    let first_changed = match (by_order.first(), new_order.first()) {
        (Some(current_first), Some(new_first)) => current_first.id != Some(*new_first),
        _ => false,
    };

    for screen in screens.iter_mut() {
        if let Some(id) = screen.id {
            if let Some(index) = new_order.iter().position(|other| *other == id) {
                screen.order = index as i32 + 1;
            }
        }
    }

    first_changed
}

/// Make the screen now in first position part of the starting state.
///
/// When only one starting screen exists it is swapped out entirely;
/// otherwise the new first screen moves to the front of the starting set.
/// The remaining starting screens are renumbered contiguously from 1.
pub fn promote_starting_screen(screens: &mut [InterviewScreen], new_first: Uuid) {
    let mut starting_ids: Vec<Uuid> = {
        let mut starting: Vec<&InterviewScreen> = screens
            .iter()
            .filter(|screen| screen.is_in_starting_state)
            .collect();
        starting.sort_by_key(|screen| screen.starting_state_order.unwrap_or(i32::MAX));
        starting.iter().filter_map(|screen| screen.id).collect()
    };

    if starting_ids.len() <= 1 {
        // A single starting screen gets swapped out for the new first one.
        starting_ids = vec![new_first];
    } else {
        starting_ids.retain(|id| *id != new_first);
        starting_ids.insert(0, new_first);
    }

    replace_starting_state(screens, &starting_ids);
}

/// Replace the ordered set of starting screens.
///
/// Screens listed in `starting_ids` are flagged and ranked 1..n in list
/// order; all others leave the starting state.
pub fn replace_starting_state(screens: &mut [InterviewScreen], starting_ids: &[Uuid]) {
    for screen in screens.iter_mut() {
        let rank = screen
            .id
            .and_then(|id| starting_ids.iter().position(|other| *other == id));

        match rank {
            Some(index) => {
                screen.is_in_starting_state = true;
                screen.starting_state_order = Some(index as i32 + 1);
            }
            None => {
                screen.is_in_starting_state = false;
                screen.starting_state_order = None;
            }
        }
    }
}
