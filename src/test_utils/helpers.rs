// SPDX-License-Identifier: AGPL-3.0-or-later

use uuid::Uuid;

use crate::db::models::{
    Interview, InterviewCreate, InterviewScreenCreate, LocalizedText, ResponseType, ScreenEntry,
    User,
};
use crate::db::SqlStore;
use crate::test_utils::TEST_USER_ID;

/// A localized text map holding one english translation.
pub fn localized(text: &str) -> LocalizedText {
    let mut map = LocalizedText::new();
    map.insert("en".to_string(), text.to_string());
    map
}

/// Persist the fixture user all tests act as.
pub async fn test_user(store: &SqlStore) -> User {
    let user = User {
        id: TEST_USER_ID.to_string(),
        email: "ada@example.org".to_string(),
        identity_provider: "auth0".to_string(),
        family_name: "Lovelace".to_string(),
        given_name: "Ada".to_string(),
        created_date: None,
    };

    store.upsert_user(user).await.unwrap()
}

/// Persist a fresh interview owned by the given user.
pub async fn test_interview(store: &SqlStore, owner_id: &str) -> Interview {
    let payload = InterviewCreate {
        name: "Benefits intake".to_string(),
        description: "Apply for benefits".to_string(),
        notes: String::new(),
        vanity_url: None,
        default_language: None,
        allowed_languages: Vec::new(),
    };

    store
        .insert_interview(payload.into_interview(owner_id.to_string()))
        .await
        .unwrap()
}

/// A creation payload for a screen of the given interview.
pub fn test_screen_payload(interview_id: Uuid, order: Option<i32>) -> InterviewScreenCreate {
    InterviewScreenCreate {
        header_text: localized("Header"),
        title: localized("Another stage"),
        order,
        is_in_starting_state: false,
        starting_state_order: None,
        interview_id,
    }
}

/// An unsaved text entry for the given screen.
pub fn test_entry(screen_id: Uuid, order: i32) -> ScreenEntry {
    ScreenEntry {
        id: None,
        name: format!("Entry {}", order),
        prompt: localized("What is your name?"),
        text: localized(""),
        required: false,
        response_key: format!("entry_{}", order),
        response_type: ResponseType::Text,
        response_type_options: None,
        order,
        screen_id,
    }
}
