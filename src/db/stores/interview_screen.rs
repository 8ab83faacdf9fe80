// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;
use std::mem;

use sqlx::query_as;
use uuid::Uuid;

use crate::db::errors::StoreError;
use crate::db::models::{
    ConditionalAction, ConditionalActionRow, InterviewScreen, InterviewScreenCreate,
    InterviewScreenRow, ScreenEntry, ScreenEntryRow,
};
use crate::db::stores::writes;
use crate::db::SqlStore;
use crate::reconcile::{adjust_screen_order, reconcile, validate_sequential_order, MergeFields};

/// Storage of single screens.
///
/// Screens are also reachable through the interview aggregate; the methods
/// here exist for the screen-level API operations.
impl SqlStore {
    /// Insert a new screen among the siblings of its interview.
    ///
    /// The payload's optional `order` goes through
    /// [`adjust_screen_order`]: siblings are shifted to make room, an
    /// unreachable position is rejected.
    pub async fn insert_screen(
        &self,
        payload: InterviewScreenCreate,
    ) -> Result<InterviewScreen, StoreError> {
        // Also confirms the interview exists.
        let interview = self.get_interview(&payload.interview_id).await?;

        let (mut placed, siblings) = adjust_screen_order(interview.screens, payload)?;
        placed.id = Some(Uuid::new_v4());

        let mut tx = self.pool.begin().await?;
        for screen in &siblings {
            // The placed screen is part of the sibling list but only got its
            // id afterwards; it is written separately below.
            if screen.id.is_some() {
                writes::upsert_screen(&mut tx, screen).await?;
            }
        }
        writes::upsert_screen(&mut tx, &placed).await?;
        tx.commit().await?;

        Ok(placed)
    }

    /// Get a screen with its entries and conditional actions.
    pub async fn get_screen(&self, id: &Uuid) -> Result<InterviewScreen, StoreError> {
        let row: Option<InterviewScreenRow> = query_as(
            r#"
            SELECT
                id,
                header_text,
                title,
                "order",
                is_in_starting_state,
                starting_state_order,
                interview_id
            FROM
                interview_screen
            WHERE
                id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let mut screen =
            InterviewScreen::try_from(row.ok_or(StoreError::NotFound("interview screen"))?)?;
        self.load_screen_children(&mut screen).await?;

        Ok(screen)
    }

    /// Reconcile an incoming screen against the persisted one and write the
    /// outcome in one transaction.
    ///
    /// Scalars update field-wise; entries and conditional actions go through
    /// [`reconcile`] so children missing from the request are deleted.
    pub async fn update_screen(
        &self,
        id: &Uuid,
        mut incoming: InterviewScreen,
    ) -> Result<InterviewScreen, StoreError> {
        let mut persisted = self.get_screen(id).await?;

        incoming.id = Some(*id);
        // A screen cannot move to another interview through an update.
        incoming.interview_id = persisted.interview_id;
        for entry in incoming.entries.iter_mut() {
            entry.screen_id = *id;
        }
        for action in incoming.actions.iter_mut() {
            action.screen_id = *id;
        }

        let persisted_entries = mem::take(&mut persisted.entries);
        let persisted_actions = mem::take(&mut persisted.actions);
        persisted.merge_from(&incoming);

        let (mut entries_set, entries_delete) =
            reconcile(persisted_entries, mem::take(&mut incoming.entries));
        let (mut actions_set, actions_delete) =
            reconcile(persisted_actions, mem::take(&mut incoming.actions));

        // Contiguity is checked on the reconciled outcome so duplicated
        // identities cannot slip a gap past the validation.
        validate_sequential_order(&entries_set)?;
        validate_sequential_order(&actions_set)?;

        // The merged order must still fit the interview's sibling sequence.
        let mut siblings = self.get_interview(&persisted.interview_id).await?.screens;
        for sibling in siblings.iter_mut() {
            if sibling.id == Some(*id) {
                sibling.order = persisted.order;
            }
        }
        validate_sequential_order(&siblings)?;

        let mut tx = self.pool.begin().await?;
        writes::upsert_screen(&mut tx, &persisted).await?;

        for entry in entries_set.iter_mut() {
            if entry.id.is_none() {
                entry.id = Some(Uuid::new_v4());
            }
            writes::upsert_entry(&mut tx, entry).await?;
        }
        for action in actions_set.iter_mut() {
            if action.id.is_none() {
                action.id = Some(Uuid::new_v4());
            }
            writes::upsert_conditional_action(&mut tx, action).await?;
        }
        for entry in &entries_delete {
            let entry_id = writes::require_id(entry.id, "screen entry")?;
            writes::delete_by_id(&mut tx, "interview_screen_entry", entry_id).await?;
        }
        for action in &actions_delete {
            let action_id = writes::require_id(action.id, "conditional action")?;
            writes::delete_by_id(&mut tx, "conditional_action", action_id).await?;
        }
        tx.commit().await?;

        entries_set.sort_by_key(|entry| entry.order);
        actions_set.sort_by_key(|action| action.order);
        persisted.entries = entries_set;
        persisted.actions = actions_set;

        Ok(persisted)
    }

    /// Delete a screen with its children. The remaining siblings close the
    /// gap so their orders stay contiguous.
    pub async fn delete_screen(&self, id: &Uuid) -> Result<(), StoreError> {
        let screen = self.get_screen(id).await?;
        let interview = self.get_interview(&screen.interview_id).await?;

        let mut remaining: Vec<InterviewScreen> = interview
            .screens
            .into_iter()
            .filter(|sibling| sibling.id != Some(*id))
            .collect();
        remaining.sort_by_key(|sibling| sibling.order);
        for (index, sibling) in remaining.iter_mut().enumerate() {
            sibling.order = index as i32 + 1;
        }

        let mut tx = self.pool.begin().await?;
        writes::delete_screen_children(&mut tx, id).await?;
        writes::delete_by_id(&mut tx, "interview_screen", *id).await?;
        for sibling in &remaining {
            writes::upsert_screen(&mut tx, sibling).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Load the entries and conditional actions of a screen, both sorted by
    /// `order`.
    pub(crate) async fn load_screen_children(
        &self,
        screen: &mut InterviewScreen,
    ) -> Result<(), StoreError> {
        let screen_id = writes::require_id(screen.id, "interview screen")?.to_string();

        let entry_rows: Vec<ScreenEntryRow> = query_as(
            r#"
            SELECT
                id,
                name,
                prompt,
                text,
                required,
                response_key,
                response_type,
                response_type_options,
                "order",
                screen_id
            FROM
                interview_screen_entry
            WHERE
                screen_id = $1
            ORDER BY
                "order" ASC
            "#,
        )
        .bind(&screen_id)
        .fetch_all(&self.pool)
        .await?;

        screen.entries = entry_rows
            .into_iter()
            .map(ScreenEntry::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        let action_rows: Vec<ConditionalActionRow> = query_as(
            r#"
            SELECT
                id,
                if_clause,
                "order",
                screen_id
            FROM
                conditional_action
            WHERE
                screen_id = $1
            ORDER BY
                "order" ASC
            "#,
        )
        .bind(&screen_id)
        .fetch_all(&self.pool)
        .await?;

        screen.actions = action_rows
            .into_iter()
            .map(ConditionalAction::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::errors::StoreError;
    use crate::reconcile::OrderError;
    use crate::test_utils::{
        test_entry, test_interview, test_runner, test_screen_payload, test_user, TestApp,
    };

    #[test]
    fn screens_insert_at_their_requested_position() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            // Seeded screen sits at order 1; append one, then squeeze a
            // third one in between.
            let appended = store
                .insert_screen(test_screen_payload(id, None))
                .await
                .unwrap();
            assert_eq!(appended.order, 2);

            let inserted = store
                .insert_screen(test_screen_payload(id, Some(2)))
                .await
                .unwrap();
            assert_eq!(inserted.order, 2);

            let screens = store.get_interview(&id).await.unwrap().screens;
            let orders: Vec<i32> = screens.iter().map(|screen| screen.order).collect();
            assert_eq!(orders, vec![1, 2, 3]);
            assert_eq!(screens[1].id, inserted.id);
            assert_eq!(screens[2].id, appended.id);
        })
    }

    #[test]
    fn unreachable_positions_are_rejected() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let result = store.insert_screen(test_screen_payload(id, Some(10))).await;

            match result {
                Err(StoreError::InvalidOrder(OrderError::OutOfRange { proposed, existing })) => {
                    assert_eq!(proposed, 10);
                    assert_eq!(existing, vec![1]);
                }
                other => panic!("expected out of range error, got {:?}", other),
            }
        })
    }

    #[test]
    fn updating_a_screen_reconciles_its_entries() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let screen_id = interview.screens[0].id.unwrap();

            let mut incoming = store.get_screen(&screen_id).await.unwrap();
            incoming.entries = vec![test_entry(screen_id, 1), test_entry(screen_id, 2)];
            let updated = store.update_screen(&screen_id, incoming).await.unwrap();
            assert_eq!(updated.entries.len(), 2);

            // Drop the first entry; the second one survives under its id.
            let kept_id = updated.entries[1].id;
            let mut incoming = updated.clone();
            let mut kept = updated.entries[1].clone();
            kept.order = 1;
            incoming.entries = vec![kept];

            let updated = store.update_screen(&screen_id, incoming).await.unwrap();
            assert_eq!(updated.entries.len(), 1);
            assert_eq!(updated.entries[0].id, kept_id);
        })
    }

    #[test]
    fn duplicated_entry_identities_cannot_hide_an_order_gap() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let screen_id = interview.screens[0].id.unwrap();

            let mut incoming = store.get_screen(&screen_id).await.unwrap();
            incoming.entries = vec![test_entry(screen_id, 1)];
            let updated = store.update_screen(&screen_id, incoming).await.unwrap();

            // The only entry submitted twice, under orders 1 and 2. The
            // last occurrence wins, leaving a single entry at order 2.
            let mut incoming = updated.clone();
            let mut repeated = updated.entries[0].clone();
            repeated.order = 2;
            incoming.entries.push(repeated);

            let result = store.update_screen(&screen_id, incoming).await;
            match result {
                Err(StoreError::InvalidOrder(OrderError::NonSequential(orders))) => {
                    assert_eq!(orders, vec![2]);
                }
                other => panic!("expected invalid order error, got {:?}", other),
            }
        })
    }

    #[test]
    fn screen_updates_cannot_leave_an_order_gap() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let second = store
                .insert_screen(test_screen_payload(id, None))
                .await
                .unwrap();
            let second_id = second.id.unwrap();

            let mut incoming = store.get_screen(&second_id).await.unwrap();
            incoming.order = 5;

            let result = store.update_screen(&second_id, incoming).await;
            match result {
                Err(StoreError::InvalidOrder(OrderError::NonSequential(orders))) => {
                    assert_eq!(orders, vec![1, 5]);
                }
                other => panic!("expected invalid order error, got {:?}", other),
            }

            let screens = store.get_interview(&id).await.unwrap().screens;
            let orders: Vec<i32> = screens.iter().map(|screen| screen.order).collect();
            assert_eq!(orders, vec![1, 2]);
        })
    }

    #[test]
    fn deleting_a_screen_closes_the_order_gap() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let second = store
                .insert_screen(test_screen_payload(id, None))
                .await
                .unwrap();
            let third = store
                .insert_screen(test_screen_payload(id, None))
                .await
                .unwrap();

            store.delete_screen(&second.id.unwrap()).await.unwrap();

            let screens = store.get_interview(&id).await.unwrap().screens;
            let orders: Vec<i32> = screens.iter().map(|screen| screen.order).collect();
            assert_eq!(orders, vec![1, 2]);
            assert_eq!(screens[1].id, third.id);
        })
    }
}
