//! Authentication pages
//!
//! Handles:
//! - GET|POST /auth/login/         - log in, then go to `next`
//! - POST /auth/logout/            - end the session
//! - GET|POST /auth/registration/  - create an account (the first one is admin)

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::common::{clear_session_cookie, safe_next, session_cookie, NextQuery};
use crate::api::middleware::{extract_session_token, AppState, Viewer};
use crate::api::responses::PageError;
use crate::services::{LoginInput, RegisterInput, UserServiceError};

/// Build the auth router, nested under `/auth`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", get(login_form).post(login))
        .route("/logout/", post(logout))
        .route("/registration/", get(registration_form).post(register))
}

/// Submitted login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Submitted registration form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, PageError> {
    let next = query.next.unwrap_or_default();
    render_login(&state, &viewer, "", &next, &[])
}

async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let next = form.next.clone().unwrap_or_default();
    let input = LoginInput::new(form.username.trim(), form.password.as_str());

    match state.user_service.login(input).await {
        Ok((user, session)) => {
            tracing::info!("User {} logged in", user.username);
            let cookie = session_cookie(&session.id, state.config.blog.session_days)?;
            let target = safe_next(Some(&next));
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&target)).into_response())
        }
        Err(UserServiceError::AuthenticationError(_)) | Err(UserServiceError::ValidationError(_)) => {
            let errors = ["Please enter a correct username and password.".to_string()];
            let html = render_login(&state, &viewer, &form.username, &next, &errors)?;
            Ok((StatusCode::BAD_REQUEST, html).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn logout(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    if let Some(user) = &viewer.user {
        tracing::info!("User {} logged out", user.username);
    }

    let html = state.render("registration/logged_out.html", &TeraContext::new(), None, &viewer.path)?;
    Ok(([(header::SET_COOKIE, clear_session_cookie())], html).into_response())
}

async fn registration_form(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Html<String>, PageError> {
    render_registration(&state, &viewer, &RegistrationValues::default(), &[])
}

async fn register(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, PageError> {
    let values = RegistrationValues {
        username: form.username.clone(),
        email: form.email.clone(),
    };

    if form.password1 != form.password2 {
        let errors = ["The two password fields didn't match.".to_string()];
        let html = render_registration(&state, &viewer, &values, &errors)?;
        return Ok((StatusCode::BAD_REQUEST, html).into_response());
    }

    let input = RegisterInput::new(form.username.trim(), form.email.trim(), form.password1);
    match state.user_service.register(input).await {
        Ok(user) => {
            tracing::info!("Registered user {}", user.username);
            Ok(Redirect::to("/auth/login/").into_response())
        }
        Err(UserServiceError::ValidationError(msg)) | Err(UserServiceError::UserExists(msg)) => {
            let html = render_registration(&state, &viewer, &values, &[msg])?;
            Ok((StatusCode::BAD_REQUEST, html).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Registration fields echoed back into the form; passwords never are
#[derive(Debug, Default, Serialize)]
struct RegistrationValues {
    username: String,
    email: String,
}

fn render_login(
    state: &AppState,
    viewer: &Viewer,
    username: &str,
    next: &str,
    errors: &[String],
) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", next);
    context.insert("errors", errors);
    state.render("registration/login.html", &context, viewer.user.as_ref(), &viewer.path)
}

fn render_registration(
    state: &AppState,
    viewer: &Viewer,
    values: &RegistrationValues,
    errors: &[String],
) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", values);
    context.insert("errors", errors);
    state.render(
        "registration/registration_form.html",
        &context,
        viewer.user.as_ref(),
        &viewer.path,
    )
}
