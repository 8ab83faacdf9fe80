// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Entities with a stable identity used to match request models against
/// persisted rows.
///
/// A `None` identity marks an entity which has not been persisted yet; the
/// reconciler always treats it as a create.
pub trait Identifiable {
    fn identity(&self) -> Option<Uuid>;
}

/// Field-wise merge of an incoming model into its persisted counterpart.
///
/// Implementations must only overwrite fields whose value actually differs,
/// so unchanged fields keep their original value across an update. Nested
/// child collections are never merged here; those go through
/// [`reconcile`] on their own.
pub trait MergeFields {
    fn merge_from(&mut self, incoming: &Self);
}

/// Overwrite `current` with `incoming` only when the two differ.
pub(crate) fn merge_field<T: PartialEq + Clone>(current: &mut T, incoming: &T) {
    if current != incoming {
        *current = incoming.clone();
    }
}

/// Diff a persisted sibling collection against the collection submitted by a
/// client and split the result into the models to write and the models to
/// delete.
///
/// Every persisted model whose identity appears in the request is merged
/// field-by-field with the request model and kept; persisted models missing
/// from the request are deleted. Request models with an unknown or unset
/// identity are passed through as creates. When several request models share
/// one identity the last occurrence wins.
///
/// `to_set` lists updated models first, then creates; this ordering carries
/// no semantic weight beyond insertion order within one transaction.
pub fn reconcile<T>(db_models: Vec<T>, request_models: Vec<T>) -> (Vec<T>, Vec<T>)
where
    T: Identifiable + MergeFields + Clone,
{
    // Bulk-insert fast path: nothing to diff against, pass everything
    // through untouched.
    if db_models.is_empty() && !request_models.is_empty() {
        return (request_models, Vec::new());
    }

    let mut request_by_id: HashMap<Uuid, T> = HashMap::new();
    for request_model in &request_models {
        if let Some(id) = request_model.identity() {
            request_by_id.insert(id, request_model.clone());
        }
    }

    let db_ids: HashSet<Uuid> = db_models
        .iter()
        .filter_map(|db_model| db_model.identity())
        .collect();

    let mut to_set = Vec::new();
    let mut to_delete = Vec::new();

    // Merge request data into every persisted model that is still present;
    // everything else gets deleted.
    for mut db_model in db_models {
        let request_model = db_model
            .identity()
            .and_then(|id| request_by_id.get(&id));

        match request_model {
            Some(request_model) => {
                db_model.merge_from(request_model);
                to_set.push(db_model);
            }
            None => to_delete.push(db_model),
        }
    }

    // Request models without a persisted counterpart are creates. Models
    // with a duplicated identity are only created once, with the data of the
    // last occurrence.
    let mut created: HashSet<Uuid> = HashSet::new();
    for request_model in request_models {
        match request_model.identity() {
            None => to_set.push(request_model),
            Some(id) if !db_ids.contains(&id) && created.insert(id) => {
                to_set.push(request_by_id[&id].clone());
            }
            Some(_) => (),
        }
    }

    (to_set, to_delete)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{merge_field, reconcile, Identifiable, MergeFields};

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: Option<Uuid>,
        label: String,
        order: i32,
    }

    impl Widget {
        fn new(id: Option<Uuid>, label: &str, order: i32) -> Self {
            Self {
                id,
                label: label.to_string(),
                order,
            }
        }
    }

    impl Identifiable for Widget {
        fn identity(&self) -> Option<Uuid> {
            self.id
        }
    }

    impl MergeFields for Widget {
        fn merge_from(&mut self, incoming: &Self) {
            merge_field(&mut self.label, &incoming.label);
            merge_field(&mut self.order, &incoming.order);
        }
    }

    #[test]
    fn empty_db_passes_request_models_through() {
        let e1 = Widget::new(Some(Uuid::new_v4()), "one", 1);
        let e2 = Widget::new(None, "two", 2);

        let (to_set, to_delete) = reconcile(vec![], vec![e1.clone(), e2.clone()]);

        // No field mutation happened on the bulk-insert path.
        assert_eq!(to_set, vec![e1, e2]);
        assert!(to_delete.is_empty());
    }

    #[test]
    fn both_empty_yields_nothing() {
        let (to_set, to_delete) = reconcile::<Widget>(vec![], vec![]);
        assert!(to_set.is_empty());
        assert!(to_delete.is_empty());
    }

    #[test]
    fn missing_request_models_are_deleted() {
        let keep_id = Uuid::new_v4();
        let drop_id = Uuid::new_v4();
        let kept = Widget::new(Some(keep_id), "kept", 1);
        let dropped = Widget::new(Some(drop_id), "dropped", 2);

        let (to_set, to_delete) = reconcile(
            vec![kept.clone(), dropped.clone()],
            vec![Widget::new(Some(keep_id), "kept", 1)],
        );

        assert_eq!(to_set, vec![kept]);
        assert_eq!(to_delete, vec![dropped]);
    }

    #[test]
    fn updates_merge_in_place_and_keep_identity() {
        let id = Uuid::new_v4();
        let db = Widget::new(Some(id), "before", 1);
        let request = Widget::new(Some(id), "after", 2);

        let (to_set, to_delete) = reconcile(vec![db], vec![request]);

        assert!(to_delete.is_empty());
        assert_eq!(to_set.len(), 1);
        assert_eq!(to_set[0].id, Some(id));
        assert_eq!(to_set[0].label, "after");
        assert_eq!(to_set[0].order, 2);
    }

    #[test]
    fn null_identity_is_always_a_create() {
        let id = Uuid::new_v4();
        let db = Widget::new(Some(id), "db", 1);
        let request_update = Widget::new(Some(id), "db", 1);
        let request_create = Widget::new(None, "fresh", 2);

        let (to_set, to_delete) = reconcile(vec![db], vec![request_update, request_create]);

        assert!(to_delete.is_empty());
        // Updated models come first, creates after.
        assert_eq!(to_set.len(), 2);
        assert_eq!(to_set[0].id, Some(id));
        assert_eq!(to_set[1].id, None);
        assert_eq!(to_set[1].label, "fresh");
    }

    #[test]
    fn duplicate_request_identities_last_one_wins() {
        let id = Uuid::new_v4();
        let db = Widget::new(Some(id), "before", 1);
        let first = Widget::new(Some(id), "first", 1);
        let last = Widget::new(Some(id), "last", 1);

        let (to_set, to_delete) = reconcile(vec![db], vec![first, last]);

        assert!(to_delete.is_empty());
        assert_eq!(to_set.len(), 1);
        assert_eq!(to_set[0].label, "last");
    }

    #[test]
    fn unknown_identity_is_created_as_is() {
        let db_id = Uuid::new_v4();
        let new_id = Uuid::new_v4();
        let db = Widget::new(Some(db_id), "db", 1);
        let request_new = Widget::new(Some(new_id), "imported", 2);

        let (to_set, _) = reconcile(
            vec![db],
            vec![Widget::new(Some(db_id), "db", 1), request_new.clone()],
        );

        assert_eq!(to_set.len(), 2);
        assert_eq!(to_set[1], request_new);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let db = vec![
            Widget::new(Some(id_a), "a", 1),
            Widget::new(Some(id_b), "b", 2),
        ];
        let request = vec![
            Widget::new(Some(id_a), "a2", 1),
            Widget::new(Some(Uuid::new_v4()), "c", 2),
        ];

        let (to_set, _) = reconcile(db, request.clone());
        let identity_set: Vec<_> = to_set.iter().map(|w| w.id).collect();

        // Re-running against the previous result deletes nothing and keeps
        // the identity set stable.
        let (to_set_again, to_delete_again) = reconcile(to_set.clone(), request);
        assert!(to_delete_again.is_empty());
        let identity_set_again: Vec<_> = to_set_again.iter().map(|w| w.id).collect();
        assert_eq!(identity_set, identity_set_again);
    }
}
