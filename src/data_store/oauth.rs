// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A started but not yet completed OAuth authorization, keyed by its `state`
/// value in [`OauthStateCache`].
#[derive(Debug)]
pub struct PendingAuth {
    /// The interview whose data store settings receive the tokens.
    pub interview_id: Uuid,

    /// The PKCE verifier to present at the token endpoint.
    pub code_verifier: String,

    started: Instant,
}

/// In-process cache of pending OAuth authorizations.
///
/// Each `state` is single use: the callback takes it out of the cache, so a
/// replayed callback finds nothing. Entries which are never completed expire
/// after the configured time to live and get evicted on the next insert.
#[derive(Debug)]
pub struct OauthStateCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingAuth>>,
}

impl OauthStateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a started authorization under its `state` value.
    pub async fn insert(&self, state: String, interview_id: Uuid, code_verifier: String) {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, pending| pending.started.elapsed() < ttl);
        entries.insert(
            state,
            PendingAuth {
                interview_id,
                code_verifier,
                started: Instant::now(),
            },
        );
    }

    /// Take a pending authorization out of the cache. Returns `None` for
    /// unknown, already used or expired states.
    pub async fn take(&self, state: &str) -> Option<PendingAuth> {
        let mut entries = self.entries.lock().await;
        let pending = entries.remove(state)?;

        if pending.started.elapsed() < self.ttl {
            Some(pending)
        } else {
            None
        }
    }
}

/// A random url-safe `state` value binding callback to authorization.
pub fn generate_state() -> String {
    random_token(16)
}

/// A random PKCE code verifier.
pub fn generate_code_verifier() -> String {
    random_token(32)
}

/// The S256 code challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn random_token(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
