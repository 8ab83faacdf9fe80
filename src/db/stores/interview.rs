// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::mem;

use chrono::Utc;
use sqlx::query_as;
use uuid::Uuid;

use crate::db::errors::StoreError;
use crate::db::models::{
    ConditionalAction, DataStoreSettingRow, Interview, InterviewRow, InterviewScreen,
    InterviewScreenRow, ScreenEntry, SubmissionActionRow,
};
use crate::db::stores::writes;
use crate::db::SqlStore;
use crate::reconcile::{
    promote_starting_screen, reconcile, reorder_screens, replace_starting_state,
    validate_sequential_order, MergeFields,
};

/// Storage of the interview aggregate.
///
/// An interview owns its screens (each with entries and conditional
/// actions), its submission actions and its data store settings. Reads
/// return the whole aggregate with every sibling collection sorted by
/// `order`; `update_interview` reconciles an incoming aggregate against the
/// persisted one and writes the outcome in a single transaction.
impl SqlStore {
    /// Create a new interview, seeded with its first screen.
    ///
    /// Nested collections in the payload are ignored; screens, actions and
    /// settings are added through their own operations or through
    /// `update_interview`.
    pub async fn insert_interview(&self, mut interview: Interview) -> Result<Interview, StoreError> {
        let id = interview.id.unwrap_or_else(Uuid::new_v4);
        interview.id = Some(id);
        interview.created_date = Some(Utc::now());
        interview.screens.clear();
        interview.submission_actions.clear();
        interview.data_store_settings.clear();

        let screen = InterviewScreen::default_screen(id);

        let mut tx = self.pool.begin().await?;
        writes::upsert_interview(&mut tx, &interview).await?;
        writes::upsert_screen(&mut tx, &screen).await?;
        tx.commit().await?;

        interview.screens = vec![screen];
        Ok(interview)
    }

    /// Get an interview with all of its screens, actions and settings.
    pub async fn get_interview(&self, id: &Uuid) -> Result<Interview, StoreError> {
        let row: Option<InterviewRow> = query_as(
            "
            SELECT
                id,
                name,
                description,
                notes,
                vanity_url,
                published,
                owner_id,
                default_language,
                allowed_languages,
                created_date
            FROM
                interview
            WHERE
                id = $1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let mut interview = Interview::try_from(row.ok_or(StoreError::NotFound("interview"))?)?;
        self.load_interview_relations(&mut interview).await?;

        Ok(interview)
    }

    /// Get a published interview by its vanity url.
    ///
    /// Unpublished interviews are not reachable through their url.
    pub async fn get_interview_by_vanity_url(
        &self,
        vanity_url: &str,
    ) -> Result<Interview, StoreError> {
        let row: Option<InterviewRow> = query_as(
            "
            SELECT
                id,
                name,
                description,
                notes,
                vanity_url,
                published,
                owner_id,
                default_language,
                allowed_languages,
                created_date
            FROM
                interview
            WHERE
                vanity_url = $1
                AND published = $2
            ",
        )
        .bind(vanity_url)
        .bind(true)
        .fetch_optional(&self.pool)
        .await?;

        let mut interview = Interview::try_from(row.ok_or(StoreError::NotFound("interview"))?)?;
        self.load_interview_relations(&mut interview).await?;

        Ok(interview)
    }

    /// List the interviews owned by a user, most recent first, without their
    /// nested collections.
    pub async fn list_interviews_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Interview>, StoreError> {
        let rows: Vec<InterviewRow> = query_as(
            "
            SELECT
                id,
                name,
                description,
                notes,
                vanity_url,
                published,
                owner_id,
                default_language,
                allowed_languages,
                created_date
            FROM
                interview
            WHERE
                owner_id = $1
            ORDER BY
                created_date DESC
            LIMIT 100
            ",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let interviews = rows
            .into_iter()
            .map(Interview::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        Ok(interviews)
    }

    /// Reconcile an incoming interview aggregate against the persisted one
    /// and write the outcome in one transaction.
    ///
    /// Scalars update field-wise; every sibling collection goes through
    /// [`reconcile`]: members matched by id merge in place, unmatched
    /// incoming members are created and persisted members missing from the
    /// request are deleted. Client-supplied `order` sequences are rejected
    /// unless contiguous from 1.
    pub async fn update_interview(
        &self,
        id: &Uuid,
        mut incoming: Interview,
    ) -> Result<Interview, StoreError> {
        let mut persisted = self.get_interview(id).await?;

        // Pin the incoming aggregate to the addressed interview and hand out
        // ids to new screens up front so their children can be attached.
        incoming.id = Some(*id);
        for screen in incoming.screens.iter_mut() {
            screen.interview_id = *id;
            if screen.id.is_none() {
                screen.id = Some(Uuid::new_v4());
            }
        }
        for action in incoming.submission_actions.iter_mut() {
            action.interview_id = *id;
        }
        for setting in incoming.data_store_settings.iter_mut() {
            setting.interview_id = *id;
        }

        if incoming.published && incoming.vanity_url.as_deref().map_or(true, str::is_empty) {
            return Err(StoreError::Validation(
                "a published interview requires a vanity url".to_string(),
            ));
        }

        // Strip the children off the incoming screens; they are reconciled
        // per screen once the screens themselves have been.
        let mut incoming_children: HashMap<Uuid, (Vec<ConditionalAction>, Vec<ScreenEntry>)> =
            HashMap::new();
        for screen in incoming.screens.iter_mut() {
            let screen_id = writes::require_id(screen.id, "interview screen")?;
            let actions = mem::take(&mut screen.actions);
            let entries = mem::take(&mut screen.entries);
            incoming_children.insert(screen_id, (actions, entries));
        }

        let persisted_screens = mem::take(&mut persisted.screens);
        let persisted_actions = mem::take(&mut persisted.submission_actions);
        let persisted_settings = mem::take(&mut persisted.data_store_settings);

        let (mut screens_to_set, screens_to_delete) =
            reconcile(persisted_screens, mem::take(&mut incoming.screens));
        let (mut actions_to_set, actions_to_delete) =
            reconcile(persisted_actions, mem::take(&mut incoming.submission_actions));
        let (mut settings_to_set, settings_to_delete) =
            reconcile(persisted_settings, mem::take(&mut incoming.data_store_settings));

        persisted.merge_from(&incoming);

        // Contiguity is checked on the reconciled outcome, not on the raw
        // request: duplicated identities collapse into one sibling first and
        // must not slip a gap past the validation.
        validate_sequential_order(&screens_to_set)?;
        validate_sequential_order(&actions_to_set)?;

        let mut tx = self.pool.begin().await?;

        writes::upsert_interview(&mut tx, &persisted).await?;

        for action in actions_to_set.iter_mut() {
            if action.id.is_none() {
                action.id = Some(Uuid::new_v4());
            }
            writes::upsert_submission_action(&mut tx, action).await?;
        }
        for setting in settings_to_set.iter_mut() {
            if setting.id.is_none() {
                setting.id = Some(Uuid::new_v4());
            }
            writes::upsert_data_store_setting(&mut tx, setting).await?;
        }

        for screen in screens_to_set.iter_mut() {
            let screen_id = writes::require_id(screen.id, "interview screen")?;
            writes::upsert_screen(&mut tx, screen).await?;

            // Updated screens still carry their persisted children here;
            // created screens carry none. Either way the incoming children
            // decide what survives.
            if let Some((mut actions, mut entries)) = incoming_children.remove(&screen_id) {
                for action in actions.iter_mut() {
                    action.screen_id = screen_id;
                }
                for entry in entries.iter_mut() {
                    entry.screen_id = screen_id;
                }

                let (mut actions_set, actions_delete) =
                    reconcile(mem::take(&mut screen.actions), actions);
                let (mut entries_set, entries_delete) =
                    reconcile(mem::take(&mut screen.entries), entries);

                // A failed check aborts the whole transaction; nothing
                // written so far survives the rollback.
                validate_sequential_order(&actions_set)?;
                validate_sequential_order(&entries_set)?;

                for action in actions_set.iter_mut() {
                    if action.id.is_none() {
                        action.id = Some(Uuid::new_v4());
                    }
                    writes::upsert_conditional_action(&mut tx, action).await?;
                }
                for entry in entries_set.iter_mut() {
                    if entry.id.is_none() {
                        entry.id = Some(Uuid::new_v4());
                    }
                    writes::upsert_entry(&mut tx, entry).await?;
                }
                for action in &actions_delete {
                    let action_id = writes::require_id(action.id, "conditional action")?;
                    writes::delete_by_id(&mut tx, "conditional_action", action_id).await?;
                }
                for entry in &entries_delete {
                    let entry_id = writes::require_id(entry.id, "screen entry")?;
                    writes::delete_by_id(&mut tx, "interview_screen_entry", entry_id).await?;
                }
            }
        }

        // Deleted screens take their children with them.
        for screen in &screens_to_delete {
            let screen_id = writes::require_id(screen.id, "interview screen")?;
            writes::delete_screen_children(&mut tx, &screen_id).await?;
            writes::delete_by_id(&mut tx, "interview_screen", screen_id).await?;
        }
        for action in &actions_to_delete {
            let action_id = writes::require_id(action.id, "submission action")?;
            writes::delete_by_id(&mut tx, "submission_action", action_id).await?;
        }
        for setting in &settings_to_delete {
            let setting_id = writes::require_id(setting.id, "data store setting")?;
            writes::delete_by_id(&mut tx, "data_store_setting", setting_id).await?;
        }

        tx.commit().await?;

        self.get_interview(id).await
    }

    /// Delete an interview together with everything it owns.
    pub async fn delete_interview(&self, id: &Uuid) -> Result<(), StoreError> {
        // Confirms existence before deleting.
        self.get_interview(id).await?;

        let id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "
            DELETE FROM interview_screen_entry
            WHERE screen_id IN (SELECT id FROM interview_screen WHERE interview_id = $1)
            ",
        )
        .bind(&id)
        .execute(&mut tx)
        .await?;

        sqlx::query(
            "
            DELETE FROM conditional_action
            WHERE screen_id IN (SELECT id FROM interview_screen WHERE interview_id = $1)
            ",
        )
        .bind(&id)
        .execute(&mut tx)
        .await?;

        sqlx::query("DELETE FROM interview_screen WHERE interview_id = $1")
            .bind(&id)
            .execute(&mut tx)
            .await?;

        sqlx::query("DELETE FROM submission_action WHERE interview_id = $1")
            .bind(&id)
            .execute(&mut tx)
            .await?;

        sqlx::query("DELETE FROM data_store_setting WHERE interview_id = $1")
            .bind(&id)
            .execute(&mut tx)
            .await?;

        sqlx::query("DELETE FROM interview WHERE id = $1")
            .bind(&id)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Rearrange an interview's screens into the given id sequence.
    ///
    /// The sequence must list every screen of the interview exactly once.
    /// When a different screen moves into first position it gets promoted
    /// into the starting state so respondents still land on the first
    /// screen.
    pub async fn update_screen_order(
        &self,
        interview_id: &Uuid,
        new_order: &[Uuid],
    ) -> Result<Vec<InterviewScreen>, StoreError> {
        let interview = self.get_interview(interview_id).await?;
        let mut screens = interview.screens;

        let known: HashSet<Uuid> = screens.iter().filter_map(|screen| screen.id).collect();
        let requested: HashSet<Uuid> = new_order.iter().copied().collect();
        if requested.len() != new_order.len() || requested != known {
            return Err(StoreError::Validation(
                "new screen order must list every screen of the interview exactly once".to_string(),
            ));
        }

        let first_changed = reorder_screens(&mut screens, new_order);
        validate_sequential_order(&screens)?;

        if first_changed {
            if let Some(new_first) = new_order.first() {
                promote_starting_screen(&mut screens, *new_first);
            }
        }

        let mut tx = self.pool.begin().await?;
        for screen in &screens {
            writes::upsert_screen(&mut tx, screen).await?;
        }
        tx.commit().await?;

        screens.sort_by_key(|screen| screen.order);
        Ok(screens)
    }

    /// Replace the ordered set of starting screens of an interview.
    pub async fn update_starting_state(
        &self,
        interview_id: &Uuid,
        starting_ids: &[Uuid],
    ) -> Result<Vec<InterviewScreen>, StoreError> {
        let interview = self.get_interview(interview_id).await?;
        let mut screens = interview.screens;

        let known: HashSet<Uuid> = screens.iter().filter_map(|screen| screen.id).collect();
        if !starting_ids.iter().all(|id| known.contains(id)) {
            return Err(StoreError::Validation(
                "starting state can only contain screens of the interview".to_string(),
            ));
        }

        replace_starting_state(&mut screens, starting_ids);

        let mut tx = self.pool.begin().await?;
        for screen in &screens {
            writes::upsert_screen(&mut tx, screen).await?;
        }
        tx.commit().await?;

        screens.sort_by_key(|screen| screen.order);
        Ok(screens)
    }

    /// Load the screens (with their children), submission actions and data
    /// store settings of an interview.
    async fn load_interview_relations(&self, interview: &mut Interview) -> Result<(), StoreError> {
        let interview_id = writes::require_id(interview.id, "interview")?.to_string();

        let screen_rows: Vec<InterviewScreenRow> = query_as(
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
                interview_id = $1
            ORDER BY
                "order" ASC
            "#,
        )
        .bind(&interview_id)
        .fetch_all(&self.pool)
        .await?;

        let mut screens = screen_rows
            .into_iter()
            .map(InterviewScreen::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        for screen in screens.iter_mut() {
            self.load_screen_children(screen).await?;
        }
        interview.screens = screens;

        let action_rows: Vec<SubmissionActionRow> = query_as(
            r#"
            SELECT
                id,
                type,
                target,
                field_mappings,
                "order",
                interview_id
            FROM
                submission_action
            WHERE
                interview_id = $1
            ORDER BY
                "order" ASC
            "#,
        )
        .bind(&interview_id)
        .fetch_all(&self.pool)
        .await?;

        interview.submission_actions = action_rows
            .into_iter()
            .map(TryFrom::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        let setting_rows: Vec<DataStoreSettingRow> = query_as(
            "
            SELECT
                id,
                type,
                config,
                interview_id
            FROM
                data_store_setting
            WHERE
                interview_id = $1
            ORDER BY
                type ASC
            ",
        )
        .bind(&interview_id)
        .fetch_all(&self.pool)
        .await?;

        interview.data_store_settings = setting_rows
            .into_iter()
            .map(TryFrom::try_from)
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::errors::StoreError;
    use crate::reconcile::OrderError;
    use crate::test_utils::{test_entry, test_interview, test_runner, test_user, TestApp};

    #[test]
    fn new_interviews_are_seeded_with_a_starting_screen() {
        test_runner(|app: TestApp| async move {
            let user = test_user(&app.context.store).await;
            let interview = test_interview(&app.context.store, &user.id).await;

            let fetched = app
                .context
                .store
                .get_interview(&interview.id.unwrap())
                .await
                .unwrap();

            assert!(!fetched.published);
            assert_eq!(fetched.owner_id, user.id);
            assert_eq!(fetched.screens.len(), 1);

            let screen = &fetched.screens[0];
            assert_eq!(screen.order, 1);
            assert!(screen.is_in_starting_state);
            assert_eq!(screen.starting_state_order, Some(1));
        })
    }

    #[test]
    fn update_merges_scalars_and_keeps_child_identity() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            // First update: rename and add two entries to the seeded screen.
            let mut incoming = store.get_interview(&id).await.unwrap();
            incoming.name = "Renamed intake".to_string();
            let screen_id = incoming.screens[0].id.unwrap();
            incoming.screens[0].entries =
                vec![test_entry(screen_id, 1), test_entry(screen_id, 2)];

            let updated = store.update_interview(&id, incoming).await.unwrap();
            assert_eq!(updated.name, "Renamed intake");
            assert_eq!(updated.screens[0].entries.len(), 2);
            assert!(updated.screens[0]
                .entries
                .iter()
                .all(|entry| entry.id.is_some()));

            // Second update: drop the first entry, keep the second. The
            // surviving entry must keep its database identity.
            let kept_id = updated.screens[0].entries[1].id;
            let mut incoming = updated.clone();
            let mut kept = updated.screens[0].entries[1].clone();
            kept.order = 1;
            incoming.screens[0].entries = vec![kept];

            let updated = store.update_interview(&id, incoming).await.unwrap();
            assert_eq!(updated.screens[0].entries.len(), 1);
            assert_eq!(updated.screens[0].entries[0].id, kept_id);
            assert_eq!(updated.screens[0].entries[0].order, 1);
        })
    }

    #[test]
    fn duplicate_entry_orders_are_rejected() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let mut incoming = store.get_interview(&id).await.unwrap();
            let screen_id = incoming.screens[0].id.unwrap();
            incoming.screens[0].entries =
                vec![test_entry(screen_id, 1), test_entry(screen_id, 1)];

            let result = store.update_interview(&id, incoming).await;
            match result {
                Err(StoreError::InvalidOrder(OrderError::NonSequential(orders))) => {
                    assert_eq!(orders, vec![1, 1]);
                }
                other => panic!("expected invalid order error, got {:?}", other),
            }
        })
    }

    #[test]
    fn duplicated_screen_identities_cannot_hide_an_order_gap() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            // The only screen submitted twice, under orders 1 and 2. The
            // last occurrence wins, leaving a single screen at order 2.
            let mut incoming = store.get_interview(&id).await.unwrap();
            let mut repeated = incoming.screens[0].clone();
            repeated.order = 2;
            incoming.screens.push(repeated);

            let result = store.update_interview(&id, incoming).await;
            match result {
                Err(StoreError::InvalidOrder(OrderError::NonSequential(orders))) => {
                    assert_eq!(orders, vec![2]);
                }
                other => panic!("expected invalid order error, got {:?}", other),
            }

            // Nothing was written.
            let screens = store.get_interview(&id).await.unwrap().screens;
            assert_eq!(screens.len(), 1);
            assert_eq!(screens[0].order, 1);
        })
    }

    #[test]
    fn publishing_requires_a_vanity_url() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let mut incoming = store.get_interview(&id).await.unwrap();
            incoming.published = true;
            incoming.vanity_url = None;

            let result = store.update_interview(&id, incoming).await;
            assert!(matches!(result, Err(StoreError::Validation(_))));
        })
    }

    #[test]
    fn vanity_urls_are_unique_across_interviews() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let first = test_interview(store, &user.id).await;
            let second = test_interview(store, &user.id).await;

            let mut incoming = store.get_interview(&first.id.unwrap()).await.unwrap();
            incoming.vanity_url = Some("benefits".to_string());
            store
                .update_interview(&first.id.unwrap(), incoming)
                .await
                .unwrap();

            let mut incoming = store.get_interview(&second.id.unwrap()).await.unwrap();
            incoming.vanity_url = Some("benefits".to_string());
            let result = store.update_interview(&second.id.unwrap(), incoming).await;

            assert!(matches!(result, Err(StoreError::IntegrityViolation(_))));
        })
    }

    #[test]
    fn vanity_url_lookup_only_serves_published_interviews() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let mut incoming = store.get_interview(&id).await.unwrap();
            incoming.vanity_url = Some("benefits".to_string());
            store.update_interview(&id, incoming).await.unwrap();

            let result = store.get_interview_by_vanity_url("benefits").await;
            assert!(matches!(result, Err(StoreError::NotFound(_))));

            let mut incoming = store.get_interview(&id).await.unwrap();
            incoming.published = true;
            store.update_interview(&id, incoming).await.unwrap();

            let found = store.get_interview_by_vanity_url("benefits").await.unwrap();
            assert_eq!(found.id, Some(id));
        })
    }

    #[test]
    fn reordering_promotes_the_new_first_screen() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let first = interview.screens[0].id.unwrap();
            let second = store
                .insert_screen(crate::test_utils::test_screen_payload(id, None))
                .await
                .unwrap()
                .id
                .unwrap();

            let screens = store.update_screen_order(&id, &[second, first]).await.unwrap();

            assert_eq!(screens[0].id, Some(second));
            assert!(screens[0].is_in_starting_state);
            assert_eq!(screens[0].starting_state_order, Some(1));

            assert_eq!(screens[1].id, Some(first));
            assert!(!screens[1].is_in_starting_state);
            assert_eq!(screens[1].starting_state_order, None);
        })
    }

    #[test]
    fn screen_order_rejects_duplicated_ids() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();

            let second = store
                .insert_screen(crate::test_utils::test_screen_payload(id, None))
                .await
                .unwrap()
                .id
                .unwrap();

            let result = store.update_screen_order(&id, &[second, second]).await;
            assert!(matches!(result, Err(StoreError::Validation(_))));
        })
    }

    #[test]
    fn deleting_an_interview_removes_the_aggregate() {
        test_runner(|app: TestApp| async move {
            let store = &app.context.store;
            let user = test_user(store).await;
            let interview = test_interview(store, &user.id).await;
            let id = interview.id.unwrap();
            let screen_id = interview.screens[0].id.unwrap();

            store.delete_interview(&id).await.unwrap();

            assert!(matches!(
                store.get_interview(&id).await,
                Err(StoreError::NotFound(_))
            ));
            assert!(matches!(
                store.get_screen(&screen_id).await,
                Err(StoreError::NotFound(_))
            ));
        })
    }
}
