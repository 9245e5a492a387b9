//! Comment pages
//!
//! - POST /posts/{id}/comment/         - comment on a post (login required)
//! - GET|POST /comments/{id}/edit/     - edit own comment
//! - GET|POST /comments/{id}/delete/   - delete own comment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::common::{parse_id, post_url};
use crate::api::middleware::{AppState, LoginRequired};
use crate::api::posts::render_detail;
use crate::api::responses::PageError;
use crate::models::{Comment, CreateCommentInput};
use crate::services::CommentServiceError;

/// Build the comment router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/comments/{id}/edit/", get(edit_form).post(edit_comment))
        .route("/comments/{id}/delete/", get(delete_confirm).post(delete_comment))
}

/// Submitted comment form
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

async fn add_comment(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let post_id = parse_id(&id)?;
    let input = CreateCommentInput {
        post_id,
        text: form.text.clone(),
    };

    match state.comment_service.create(member.user.id, input).await {
        Ok(_) => Ok(Redirect::to(&post_url(post_id)).into_response()),
        Err(CommentServiceError::ValidationError(msg)) => {
            render_detail(
                &state,
                post_id,
                Some(&member.user),
                &member.path,
                &form.text,
                &[msg],
                StatusCode::BAD_REQUEST,
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}

async fn edit_form(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let comment = state.comment_service.get_owned(member.user.id, id).await?;
    let text = comment.text.clone();
    render_comment_page(&state, &member, &comment, false, &text, &[], StatusCode::OK)
}

async fn edit_comment(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    match state.comment_service.update(member.user.id, id, &form.text).await {
        Ok(comment) => Ok(Redirect::to(&post_url(comment.post_id)).into_response()),
        Err(CommentServiceError::ValidationError(msg)) => {
            let comment = state.comment_service.get_owned(member.user.id, id).await?;
            render_comment_page(
                &state,
                &member,
                &comment,
                false,
                &form.text,
                &[msg],
                StatusCode::BAD_REQUEST,
            )
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_confirm(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let comment = state.comment_service.get_owned(member.user.id, id).await?;
    render_comment_page(&state, &member, &comment, true, "", &[], StatusCode::OK)
}

async fn delete_comment(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Redirect, PageError> {
    let id = parse_id(&id)?;
    let comment = state.comment_service.delete(member.user.id, id).await?;
    Ok(Redirect::to(&post_url(comment.post_id)))
}

fn render_comment_page(
    state: &AppState,
    member: &LoginRequired,
    comment: &Comment,
    delete: bool,
    text: &str,
    errors: &[String],
    status: StatusCode,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("comment", comment);
    context.insert("delete", &delete);
    context.insert("text", text);
    context.insert("errors", errors);

    let html: Html<String> =
        state.render("blog/comment.html", &context, Some(&member.user), &member.path)?;
    Ok((status, html).into_response())
}
