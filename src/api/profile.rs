//! Profile pages
//!
//! - GET /profile/{username}/        - the user's posts
//! - GET|POST /profile/{username}/edit/ - edit own profile

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tera::Context as TeraContext;

use crate::api::common::{profile_url, PageQuery};
use crate::api::middleware::{AppState, LoginRequired, Viewer};
use crate::api::responses::PageError;
use crate::models::{UpdateProfileInput, User};
use crate::services::UserServiceError;

/// Build the profile router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/edit/", get(edit_form).post(edit_profile))
}

async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let user = state.user_service.get_by_username(&username).await?;
    let page = state
        .post_service
        .list_for_author(user.id, viewer.id(), query.number())
        .await?;

    let mut context = TeraContext::new();
    context.insert("profile", &user);
    context.insert("is_owner", &(viewer.id() == Some(user.id)));
    context.insert("posts", &page.items);
    context.insert("paginator", &page.page_info());
    state.render("blog/profile.html", &context, viewer.user.as_ref(), &viewer.path)
}

async fn edit_form(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(username): Path<String>,
) -> Result<Response, PageError> {
    let user = own_profile(&state, &member, &username).await?;
    let values = UpdateProfileInput {
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
    };
    render_profile_form(&state, &member, &user, &values, &[], StatusCode::OK)
}

async fn edit_profile(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(username): Path<String>,
    Form(input): Form<UpdateProfileInput>,
) -> Result<Response, PageError> {
    let user = own_profile(&state, &member, &username).await?;

    match state.user_service.update_profile(user.id, input.clone()).await {
        Ok(updated) => Ok(Redirect::to(&profile_url(&updated.username)).into_response()),
        Err(UserServiceError::ValidationError(msg)) | Err(UserServiceError::UserExists(msg)) => {
            render_profile_form(&state, &member, &user, &input, &[msg], StatusCode::BAD_REQUEST)
        }
        Err(e) => Err(e.into()),
    }
}

/// The profile being edited, which must be the requester's own
async fn own_profile(
    state: &AppState,
    member: &LoginRequired,
    username: &str,
) -> Result<User, PageError> {
    let user = state.user_service.get_by_username(username).await?;
    if user.id != member.user.id {
        return Err(PageError::Forbidden(
            "You can only edit your own profile.".to_string(),
        ));
    }
    Ok(user)
}

fn render_profile_form(
    state: &AppState,
    member: &LoginRequired,
    user: &User,
    values: &UpdateProfileInput,
    errors: &[String],
    status: StatusCode,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", values);
    context.insert("errors", errors);
    context.insert("action", &format!("{}edit/", profile_url(&user.username)));

    let html = state.render("blog/user.html", &context, Some(&member.user), &member.path)?;
    Ok((status, html).into_response())
}
