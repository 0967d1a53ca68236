//! Dashboard pages behind the route guard.
//!
//! Every page in [`pages`] gets a `GET` route. The guard runs before anything
//! is rendered; refusals are a bare `303 See Other`.

use axum::{
    extract::Extension,
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::debug;

use super::auth::{
    session::request_context,
    types::{PageResponse, SessionResponse},
    AuthState,
};
use crate::auth::{guard, pages, GuardDecision, Page};

/// One `GET` route per page.
pub fn routes() -> Router {
    pages().into_iter().fold(Router::new(), |router, page| {
        let path = page.path;
        router.route(
            path,
            get(move |headers: HeaderMap, auth_state: Extension<Arc<AuthState>>| {
                let page = page.clone();
                async move { render(&page, &headers, &auth_state).await }
            }),
        )
    })
}

async fn render(page: &Page, headers: &HeaderMap, auth_state: &AuthState) -> Response {
    let context = match request_context(headers, auth_state).await {
        Ok(context) => context,
        Err(status) => return status.into_response(),
    };

    match guard(&context, page) {
        GuardDecision::Allow => Json(PageResponse {
            path: page.path.to_string(),
            title: page.title.to_string(),
            session: context.session.as_ref().map(SessionResponse::from),
        })
        .into_response(),
        decision @ GuardDecision::RedirectTo(target) => {
            if let Some(cause) = decision.cause() {
                debug!(page = page.path, %cause, "Redirecting to {target}");
            }
            (
                StatusCode::SEE_OTHER,
                [(LOCATION, HeaderValue::from_static(target))],
            )
                .into_response()
        }
    }
}
