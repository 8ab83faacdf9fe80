// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use crate::config::Configuration;
use crate::data_store::OauthStateCache;
use crate::db::SqlStore;

#[derive(Clone, Debug)]
pub struct HttpServiceContext {
    /// SQL database.
    pub store: SqlStore,

    /// Service configuration.
    pub config: Configuration,

    /// Pending OAuth authorizations, keyed by their `state` value.
    pub oauth_states: Arc<OauthStateCache>,
}

impl HttpServiceContext {
    pub fn new(store: SqlStore, config: Configuration, oauth_states: Arc<OauthStateCache>) -> Self {
        Self {
            store,
            config,
            oauth_states,
        }
    }
}
