// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::Extension;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use log::debug;
use tower_http::cors::{Any, CorsLayer};

use crate::context::Context;
use crate::data_store::OauthStateCache;
use crate::http::api;
use crate::http::context::HttpServiceContext;

/// Header carrying the id of the requesting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build HTTP server with the REST API.
pub fn build_server(http_context: HttpServiceContext) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)])
        .allow_credentials(false)
        .allow_origin(Any);

    Router::new()
        // Interview aggregate routes
        .route(
            "/api/interviews/",
            post(api::create_interview).get(api::list_interviews),
        )
        .route(
            "/api/interviews/by-vanity-url/:vanity_url",
            get(api::get_interview_by_vanity_url),
        )
        .route(
            "/api/interviews/:id",
            get(api::get_interview)
                .put(api::update_interview)
                .delete(api::delete_interview),
        )
        .route("/api/interviews/:id/entries", get(api::list_interview_entries))
        .route(
            "/api/interviews/:id/starting_state",
            post(api::update_starting_state),
        )
        .route(
            "/api/interviews/:id/screen_order",
            post(api::update_screen_order),
        )
        // Screen routes
        .route("/api/interview_screens/", post(api::create_screen))
        .route(
            "/api/interview_screens/:id",
            get(api::get_screen)
                .put(api::update_screen)
                .delete(api::delete_screen),
        )
        // Data store proxy routes
        .route(
            "/api/airtable-records/:interview_id/:table",
            get(api::search_airtable_records).post(api::create_airtable_record),
        )
        .route(
            "/api/airtable-records/:interview_id/:table/:record_id",
            get(api::fetch_airtable_record).put(api::update_airtable_record),
        )
        .route(
            "/api/airtable-schema/:interview_id",
            get(api::refresh_airtable_schema),
        )
        .route(
            "/api/google-sheets-schema/:interview_id",
            post(api::refresh_google_sheets_schema),
        )
        .route("/api/airtable-auth", get(api::airtable_auth))
        .route("/api/airtable-callback", get(api::airtable_callback))
        // User routes
        .route("/api/users/me", get(api::current_user))
        // Add middlewares
        .layer(cors)
        // Add shared context
        .layer(Extension(http_context))
}

/// Start HTTP server.
pub async fn http_service(context: Context) -> Result<()> {
    let http_port = context.config.http_port;
    let http_address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), http_port);

    let oauth_states = Arc::new(OauthStateCache::new(Duration::from_secs(
        context.config.oauth_state_ttl_secs,
    )));
    let http_context = HttpServiceContext::new(
        context.store.clone(),
        context.config.clone(),
        oauth_states,
    );

    debug!("HTTP service listening on {}", http_address);

    axum::Server::try_bind(&http_address)?
        .serve(build_server(http_context).into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
