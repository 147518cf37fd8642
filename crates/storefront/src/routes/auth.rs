//! Sign-in and sign-out handlers.
//!
//! Authentication itself is out of scope for the storefront; shoppers arrive
//! with an identity established elsewhere. `POST /auth/session` exists for
//! development and tests and is only mounted with `STOREFRONT_DEV_SIGN_IN`.
//! Both handlers publish the change to the auth hub so mounted cart pages
//! pick it up.

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tillpoint_core::{Session as Shopper, UserId};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::models::visitor_key;
use crate::services::identity::VisitorIdentity;
use crate::state::AppState;

/// Development sign-in form data.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub user_id: String,
    pub email: Option<String>,
}

/// Sign in as the given user (development only).
#[instrument(skip(state, session))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignInForm>,
) -> Result<impl IntoResponse> {
    let user_id = form.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }

    let shopper = Shopper {
        user_id: UserId::new(user_id),
        email: form
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
    };

    let visitor = visitor_key(&session).await?;
    // Rotate the session id on privilege change
    session.cycle_id().await?;

    set_sentry_user(&shopper.user_id, shopper.email.as_deref());
    VisitorIdentity::new(&session, state.auth(), visitor)
        .sign_in(shopper)
        .await?;
    tracing::info!(%visitor, user_id, "Shopper signed in");

    Ok(Redirect::to("/cart"))
}

/// Sign out.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    let visitor = visitor_key(&session).await?;

    VisitorIdentity::new(&session, state.auth(), visitor)
        .sign_out()
        .await?;
    clear_sentry_user();
    tracing::info!(%visitor, "Shopper signed out");

    Ok(Redirect::to("/cart"))
}
