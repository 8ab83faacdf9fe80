// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::data_store::airtable::{self, AirtableApi, Record};
use crate::data_store::{oauth, refresh_schema, DataStoreError};
use crate::db::errors::StoreError;
use crate::db::models::{
    AirtableConfig, DataStoreConfig, DataStoreSetting, DataStoreType, Interview, InterviewCreate,
    InterviewScreen, InterviewScreenCreate, ScreenEntry, User,
};
use crate::errors::AppError;
use crate::http::context::HttpServiceContext;
use crate::http::service::USER_ID_HEADER;

/// The id of the requesting user, taken from the identity header set by the
/// authenticating proxy in front of this service.
fn current_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|id| !id.is_empty())
        .ok_or(AppError::Unauthenticated)
}

/// Get the user record for an identity, creating a stub record on first
/// sight so foreign keys onto `users` hold from the first request on.
async fn ensure_user(context: &HttpServiceContext, user_id: &str) -> Result<User, AppError> {
    match context.store.get_user(user_id).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => {
            let user = User {
                id: user_id.to_string(),
                email: String::new(),
                identity_provider: "header".to_string(),
                family_name: String::new(),
                given_name: String::new(),
                created_date: None,
            };
            Ok(context.store.upsert_user(user).await?)
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn current_user(
    Extension(context): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user_id = current_user_id(&headers)?;
    let user = ensure_user(&context, &user_id).await?;
    Ok(Json(user))
}

pub async fn create_interview(
    Extension(context): Extension<HttpServiceContext>,
    headers: HeaderMap,
    Json(payload): Json<InterviewCreate>,
) -> Result<Json<Interview>, AppError> {
    let user = ensure_user(&context, &current_user_id(&headers)?).await?;
    let interview = context
        .store
        .insert_interview(payload.into_interview(user.id))
        .await?;

    Ok(Json(interview))
}

pub async fn list_interviews(
    Extension(context): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Json<Vec<Interview>>, AppError> {
    let user_id = current_user_id(&headers)?;
    let interviews = context.store.list_interviews_by_owner(&user_id).await?;
    Ok(Json(interviews))
}

pub async fn get_interview(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    let interview = context.store.get_interview(&id).await?;
    Ok(Json(interview))
}

pub async fn get_interview_by_vanity_url(
    Extension(context): Extension<HttpServiceContext>,
    Path(vanity_url): Path<String>,
) -> Result<Json<Interview>, AppError> {
    let interview = context
        .store
        .get_interview_by_vanity_url(&vanity_url)
        .await?;
    Ok(Json(interview))
}

/// All entries of an interview across its screens, in screen order.
pub async fn list_interview_entries(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScreenEntry>>, AppError> {
    let interview = context.store.get_interview(&id).await?;
    let entries: Vec<ScreenEntry> = interview
        .screens
        .into_iter()
        .flat_map(|screen| screen.entries)
        .collect();

    Ok(Json(entries))
}

pub async fn update_interview(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
    Json(incoming): Json<Interview>,
) -> Result<Json<Interview>, AppError> {
    let interview = context.store.update_interview(&id, incoming).await?;
    Ok(Json(interview))
}

pub async fn delete_interview(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let user_id = current_user_id(&headers)?;
    let interview = context.store.get_interview(&id).await?;
    if interview.owner_id != user_id {
        return Err(AppError::Forbidden);
    }

    context.store.delete_interview(&id).await?;
    Ok(Json(Value::Null))
}

pub async fn update_screen_order(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
    Json(new_order): Json<Vec<Uuid>>,
) -> Result<Json<Vec<InterviewScreen>>, AppError> {
    let screens = context.store.update_screen_order(&id, &new_order).await?;
    Ok(Json(screens))
}

pub async fn update_starting_state(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
    Json(starting_ids): Json<Vec<Uuid>>,
) -> Result<Json<Vec<InterviewScreen>>, AppError> {
    let screens = context
        .store
        .update_starting_state(&id, &starting_ids)
        .await?;
    Ok(Json(screens))
}

pub async fn create_screen(
    Extension(context): Extension<HttpServiceContext>,
    Json(payload): Json<InterviewScreenCreate>,
) -> Result<Json<InterviewScreen>, AppError> {
    let screen = context.store.insert_screen(payload).await?;
    Ok(Json(screen))
}

pub async fn get_screen(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewScreen>, AppError> {
    let screen = context.store.get_screen(&id).await?;
    Ok(Json(screen))
}

pub async fn update_screen(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
    Json(incoming): Json<InterviewScreen>,
) -> Result<Json<InterviewScreen>, AppError> {
    let screen = context.store.update_screen(&id, incoming).await?;
    Ok(Json(screen))
}

pub async fn delete_screen(
    Extension(context): Extension<HttpServiceContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    context.store.delete_screen(&id).await?;
    Ok(Json(Value::Null))
}

/// Load an interview's Airtable settings and build an API client from them,
/// refreshing expired tokens along the way.
///
/// Requests address tables by id only; the base is taken from the mirrored
/// schema, which currently always holds exactly one authorized base.
async fn airtable_api(
    context: &HttpServiceContext,
    interview_id: &Uuid,
) -> Result<(AirtableApi, String), AppError> {
    let mut setting = match context
        .store
        .get_data_store_setting(interview_id, DataStoreType::Airtable)
        .await
    {
        Ok(setting) => setting,
        Err(StoreError::NotFound(_)) => {
            return Err(DataStoreError::NotConfigured("airtable").into())
        }
        Err(err) => return Err(err.into()),
    };

    let refreshed = refresh_airtable_tokens(context, &mut setting).await?;
    if refreshed {
        setting = context.store.save_data_store_setting(setting).await?;
    }

    let config = match &setting.config {
        DataStoreConfig::Airtable(config) => config,
        _ => {
            return Err(AppError::Validation(
                "interview's airtable setting holds a different provider".to_string(),
            ))
        }
    };

    let base_id = config
        .bases
        .as_deref()
        .unwrap_or_default()
        .first()
        .map(|base| base.id.clone())
        .ok_or_else(|| {
            AppError::Validation(
                "no airtable base in the schema mirror, refresh the schema first".to_string(),
            )
        })?;

    let api = AirtableApi::new(config)?;
    Ok((api, base_id))
}

/// Refresh the OAuth tokens of an Airtable setting when they are about to
/// expire. Returns whether anything changed.
async fn refresh_airtable_tokens(
    context: &HttpServiceContext,
    setting: &mut DataStoreSetting,
) -> Result<bool, AppError> {
    if let DataStoreConfig::Airtable(config) = &mut setting.config {
        if airtable::access_token_expired(&config.auth_settings) {
            if let Some(client_id) = context.config.airtable_client_id.as_deref() {
                debug!("Refreshing expired Airtable tokens");
                config.auth_settings =
                    airtable::refresh_access_token(client_id, &config.auth_settings).await?;
                return Ok(true);
            }
        }
    }

    Ok(false)
}

pub async fn search_airtable_records(
    Extension(context): Extension<HttpServiceContext>,
    Path((interview_id, table)): Path<(Uuid, String)>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<Record>>, AppError> {
    let (api, base_id) = airtable_api(&context, &interview_id).await?;
    let records = api.search_records(&base_id, &table, &query).await?;
    Ok(Json(records))
}

pub async fn fetch_airtable_record(
    Extension(context): Extension<HttpServiceContext>,
    Path((interview_id, table, record_id)): Path<(Uuid, String, String)>,
) -> Result<Json<Record>, AppError> {
    let (api, base_id) = airtable_api(&context, &interview_id).await?;
    let record = api.fetch_record(&base_id, &table, &record_id).await?;
    Ok(Json(record))
}

pub async fn create_airtable_record(
    Extension(context): Extension<HttpServiceContext>,
    Path((interview_id, table)): Path<(Uuid, String)>,
    Json(fields): Json<Value>,
) -> Result<Json<Record>, AppError> {
    let (api, base_id) = airtable_api(&context, &interview_id).await?;
    let record = api.create_record(&base_id, &table, fields).await?;
    Ok(Json(record))
}

pub async fn update_airtable_record(
    Extension(context): Extension<HttpServiceContext>,
    Path((interview_id, table, record_id)): Path<(Uuid, String, String)>,
    Json(fields): Json<Value>,
) -> Result<Json<Record>, AppError> {
    let (api, base_id) = airtable_api(&context, &interview_id).await?;
    let record = api.update_record(&base_id, &table, &record_id, fields).await?;
    Ok(Json(record))
}

/// Re-fetch the Airtable schema mirror and persist it.
pub async fn refresh_airtable_schema(
    Extension(context): Extension<HttpServiceContext>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<DataStoreSetting>, AppError> {
    let mut setting = match context
        .store
        .get_data_store_setting(&interview_id, DataStoreType::Airtable)
        .await
    {
        Ok(setting) => setting,
        Err(StoreError::NotFound(_)) => {
            return Err(DataStoreError::NotConfigured("airtable").into())
        }
        Err(err) => return Err(err.into()),
    };

    refresh_airtable_tokens(&context, &mut setting).await?;
    refresh_schema(&mut setting, None).await?;

    let setting = context.store.save_data_store_setting(setting).await?;
    Ok(Json(setting))
}

/// Re-fetch the Google Sheets schema mirror for the given spreadsheet ids
/// and persist it.
pub async fn refresh_google_sheets_schema(
    Extension(context): Extension<HttpServiceContext>,
    Path(interview_id): Path<Uuid>,
    Json(spreadsheet_ids): Json<Vec<String>>,
) -> Result<Json<DataStoreSetting>, AppError> {
    let mut setting = match context
        .store
        .get_data_store_setting(&interview_id, DataStoreType::GoogleSheets)
        .await
    {
        Ok(setting) => setting,
        Err(StoreError::NotFound(_)) => {
            return Err(DataStoreError::NotConfigured("google sheets").into())
        }
        Err(err) => return Err(err.into()),
    };

    refresh_schema(&mut setting, Some(&spreadsheet_ids)).await?;

    let setting = context.store.save_data_store_setting(setting).await?;
    Ok(Json(setting))
}

#[derive(Debug, Deserialize)]
pub struct AirtableAuthParams {
    /// The interview whose settings receive the tokens once the flow
    /// completes.
    pub state: Uuid,
}

/// Start the Airtable OAuth flow for an interview.
///
/// Registers a single-use `state` with the PKCE verifier in the in-process
/// cache and redirects the browser to Airtable's consent page.
pub async fn airtable_auth(
    Extension(context): Extension<HttpServiceContext>,
    Query(params): Query<AirtableAuthParams>,
) -> Result<Redirect, AppError> {
    let client_id = context
        .config
        .airtable_client_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("no airtable oauth client configured".to_string()))?;

    // The interview must exist before handing out a consent redirect.
    context.store.get_interview(&params.state).await?;

    let state = oauth::generate_state();
    let code_verifier = oauth::generate_code_verifier();
    let code_challenge = oauth::code_challenge(&code_verifier);
    context
        .oauth_states
        .insert(state.clone(), params.state, code_verifier)
        .await;

    let redirect_uri = format!("{}/api/airtable-callback", context.config.server_uri);
    let url = reqwest::Url::parse_with_params(
        "https://airtable.com/oauth2/v1/authorize",
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", context.config.airtable_scope.as_str()),
            ("state", state.as_str()),
            ("code_challenge", code_challenge.as_str()),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(anyhow::Error::from)?;

    Ok(Redirect::temporary(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct AirtableCallbackParams {
    pub code: String,
    pub state: String,
}

/// Complete the Airtable OAuth flow.
///
/// The `state` is taken out of the cache (a replayed or expired callback
/// finds nothing), the code is traded for tokens and the tokens are written
/// into the interview's Airtable settings, creating them on first
/// authorization.
pub async fn airtable_callback(
    Extension(context): Extension<HttpServiceContext>,
    Query(params): Query<AirtableCallbackParams>,
) -> Result<Redirect, AppError> {
    let client_id = context
        .config
        .airtable_client_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("no airtable oauth client configured".to_string()))?;

    let pending = context
        .oauth_states
        .take(&params.state)
        .await
        .ok_or_else(|| AppError::Validation("unknown or expired oauth state".to_string()))?;

    let redirect_uri = format!("{}/api/airtable-callback", context.config.server_uri);
    let auth = airtable::exchange_authorization_code(
        client_id,
        &params.code,
        &pending.code_verifier,
        &redirect_uri,
    )
    .await?;

    let setting = match context
        .store
        .get_data_store_setting(&pending.interview_id, DataStoreType::Airtable)
        .await
    {
        Ok(mut setting) => {
            if let DataStoreConfig::Airtable(config) = &mut setting.config {
                config.auth_settings = auth;
            }
            setting
        }
        Err(StoreError::NotFound(_)) => DataStoreSetting {
            id: None,
            setting_type: DataStoreType::Airtable,
            config: DataStoreConfig::Airtable(AirtableConfig {
                api_key: None,
                auth_settings: auth,
                bases: None,
            }),
            interview_id: pending.interview_id,
        },
        Err(err) => return Err(err.into()),
    };
    context.store.save_data_store_setting(setting).await?;

    let target = format!(
        "{}/interview/{}/configure",
        context.config.client_uri, pending.interview_id
    );
    Ok(Redirect::temporary(&target))
}
