//! Post pages
//!
//! - GET /                         - published posts, newest first
//! - GET /category/{slug}/         - published posts of a published category
//! - GET /posts/{id}/              - post with its comments
//! - GET|POST /posts/create/       - new post (login required)
//! - GET|POST /posts/{id}/edit/    - edit own post
//! - GET|POST /posts/{id}/delete/  - delete own post

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tera::Context as TeraContext;

use crate::api::common::{parse_id, post_url, profile_url, PageQuery};
use crate::api::middleware::{AppState, LoginRequired, Viewer};
use crate::api::responses::PageError;
use crate::models::{CreatePostInput, Post, UpdatePostInput, User};
use crate::services::{MediaError, PostServiceError};

/// Formats accepted from `datetime-local` inputs
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Build the post router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/category/{slug}/", get(category_posts))
        .route("/posts/create/", get(create_form).post(create_post))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", get(edit_form).post(edit_post))
        .route("/posts/{id}/delete/", get(delete_confirm).post(delete_post))
}

// ============================================================================
// Listings
// ============================================================================

async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let page = state
        .post_service
        .list_published(query.number())
        .await?;

    let mut context = TeraContext::new();
    context.insert("posts", &page.items);
    context.insert("paginator", &page.page_info());
    state.render("blog/index.html", &context, viewer.user.as_ref(), &viewer.path)
}

async fn category_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let category = state.category_service.get_published(&slug).await?;
    let page = state
        .post_service
        .list_for_category(category.id, query.number())
        .await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("posts", &page.items);
    context.insert("paginator", &page.page_info());
    state.render("blog/category.html", &context, viewer.user.as_ref(), &viewer.path)
}

async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    render_detail(&state, id, viewer.user.as_ref(), &viewer.path, "", &[], StatusCode::OK).await
}

/// The detail page with its comments; `comment_text` and `errors` refill
/// the comment form after a rejected submission
pub(crate) async fn render_detail(
    state: &AppState,
    post_id: i64,
    user: Option<&User>,
    path: &str,
    comment_text: &str,
    errors: &[String],
    status: StatusCode,
) -> Result<Response, PageError> {
    let post = state.post_service.get_visible(post_id, user.map(|u| u.id)).await?;
    let comments = state.comment_service.list_for_post(post_id).await?;

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("comment_text", comment_text);
    context.insert("errors", errors);
    let html = state.render("blog/detail.html", &context, user, path)?;
    Ok((status, html).into_response())
}

// ============================================================================
// Create / edit / delete
// ============================================================================

async fn create_form(
    State(state): State<AppState>,
    member: LoginRequired,
) -> Result<Response, PageError> {
    let values = PostFormValues {
        pub_date: Utc::now().format(DATETIME_FORMATS[0]).to_string(),
        is_published: true,
        ..Default::default()
    };
    render_post_form(&state, &member, &values, &[], None, StatusCode::OK).await
}

async fn create_post(
    State(state): State<AppState>,
    member: LoginRequired,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let form = PostForm::read(multipart).await?;
    let mut input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => {
            return render_post_form(
                &state,
                &member,
                &form.values(None),
                &errors,
                None,
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    };

    if let Some(image) = &form.image {
        match state.media.save_image(&image.content_type, &image.data).await {
            Ok(path) => input.image = Some(path),
            Err(MediaError::Io(e)) => return Err(MediaError::Io(e).into()),
            Err(e) => {
                let errors = vec![e.to_string()];
                return render_post_form(
                    &state,
                    &member,
                    &form.values(None),
                    &errors,
                    None,
                    StatusCode::BAD_REQUEST,
                )
                .await;
            }
        }
    }
    let saved_image = input.image.clone();

    match state.post_service.create(member.user.id, input).await {
        Ok(_) => Ok(Redirect::to(&profile_url(&member.user.username)).into_response()),
        Err(e) => {
            if let Some(path) = saved_image {
                discard_upload(&state, &path).await;
            }
            match e {
                PostServiceError::ValidationError(msg) => {
                    render_post_form(
                        &state,
                        &member,
                        &form.values(None),
                        &[msg],
                        None,
                        StatusCode::BAD_REQUEST,
                    )
                    .await
                }
                other => Err(other.into()),
            }
        }
    }
}

async fn edit_form(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let post = state.post_service.get_owned(member.user.id, id).await?;
    let values = PostFormValues::from(&post);
    render_post_form(&state, &member, &values, &[], Some(&post), StatusCode::OK).await
}

async fn edit_post(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    // a non-author is turned away before the form is looked at
    let post = state.post_service.get_owned(member.user.id, id).await?;

    let form = PostForm::read(multipart).await?;
    let current_image = post.image_url();
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => {
            return render_post_form(
                &state,
                &member,
                &form.values(current_image),
                &errors,
                Some(&post),
                StatusCode::BAD_REQUEST,
            )
            .await
        }
    };

    let mut update = UpdatePostInput::replace_all(input);
    if let Some(image) = &form.image {
        match state.media.save_image(&image.content_type, &image.data).await {
            Ok(path) => update.image = Some(Some(path)),
            Err(MediaError::Io(e)) => return Err(MediaError::Io(e).into()),
            Err(e) => {
                let errors = vec![e.to_string()];
                return render_post_form(
                    &state,
                    &member,
                    &form.values(current_image),
                    &errors,
                    Some(&post),
                    StatusCode::BAD_REQUEST,
                )
                .await;
            }
        }
    } else if form.clear_image {
        update.image = Some(None);
    }
    let saved_image = update.image.clone().flatten().filter(|_| form.image.is_some());

    match state.post_service.update(member.user.id, id, update).await {
        Ok(updated) => Ok(Redirect::to(&post_url(updated.id)).into_response()),
        Err(e) => {
            if let Some(path) = saved_image {
                discard_upload(&state, &path).await;
            }
            match e {
                PostServiceError::ValidationError(msg) => {
                    render_post_form(
                        &state,
                        &member,
                        &form.values(current_image),
                        &[msg],
                        Some(&post),
                        StatusCode::BAD_REQUEST,
                    )
                    .await
                }
                other => Err(other.into()),
            }
        }
    }
}

async fn delete_confirm(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    let id = parse_id(&id)?;
    let post = state.post_service.get_owned(member.user.id, id).await?;

    let mut context = TeraContext::new();
    context.insert("post", &post);
    state.render("blog/post_delete.html", &context, Some(&member.user), &member.path)
}

async fn delete_post(
    State(state): State<AppState>,
    member: LoginRequired,
    Path(id): Path<String>,
) -> Result<Redirect, PageError> {
    let id = parse_id(&id)?;
    state.post_service.delete(member.user.id, id).await?;
    Ok(Redirect::to("/"))
}

// ============================================================================
// Form handling
// ============================================================================

/// Values shown in the post form
#[derive(Debug, Default, Serialize)]
struct PostFormValues {
    title: String,
    text: String,
    pub_date: String,
    category_id: Option<i64>,
    location_id: Option<i64>,
    is_published: bool,
    image_url: Option<String>,
}

impl From<&Post> for PostFormValues {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format(DATETIME_FORMATS[1]).to_string(),
            category_id: post.category_id,
            location_id: post.location_id,
            is_published: post.meta.is_published,
            image_url: post.image_url(),
        }
    }
}

struct UploadedImage {
    content_type: String,
    data: Bytes,
}

/// Submitted post form
#[derive(Default)]
struct PostForm {
    title: String,
    text: String,
    pub_date: String,
    category: String,
    location: String,
    /// Unchecked boxes are not submitted at all
    is_published: bool,
    image: Option<UploadedImage>,
    clear_image: bool,
}

impl PostForm {
    async fn read(mut multipart: Multipart) -> Result<Self, PageError> {
        let mut form = PostForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| PageError::BadRequest(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "image" {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| PageError::BadRequest(format!("Failed to read upload: {}", e)))?;
                // an empty file input still sends a part
                if !data.is_empty() {
                    form.image = Some(UploadedImage { content_type, data });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| PageError::BadRequest(format!("Malformed form data: {}", e)))?;
            match name.as_str() {
                "title" => form.title = value,
                "text" => form.text = value,
                "pub_date" => form.pub_date = value,
                "category" => form.category = value,
                "location" => form.location = value,
                "is_published" => form.is_published = value != "false",
                "image-clear" => form.clear_image = value != "false",
                _ => {}
            }
        }

        Ok(form)
    }

    fn to_input(&self) -> Result<CreatePostInput, Vec<String>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title is required".to_string());
        }
        if self.text.trim().is_empty() {
            errors.push("Text is required".to_string());
        }
        let pub_date = match parse_datetime(&self.pub_date) {
            Some(dt) => Some(dt),
            None => {
                errors.push("Enter a valid publication date and time".to_string());
                None
            }
        };
        let category_id = parse_choice(&self.category, "category", &mut errors);
        let location_id = parse_choice(&self.location, "location", &mut errors);

        match pub_date {
            Some(pub_date) if errors.is_empty() => Ok(CreatePostInput {
                title: self.title.clone(),
                text: self.text.clone(),
                pub_date,
                location_id,
                category_id,
                image: None,
                is_published: self.is_published,
            }),
            _ => Err(errors),
        }
    }

    /// Submitted values for re-rendering the form
    fn values(&self, image_url: Option<String>) -> PostFormValues {
        PostFormValues {
            title: self.title.clone(),
            text: self.text.clone(),
            pub_date: self.pub_date.clone(),
            category_id: self.category.trim().parse().ok(),
            location_id: self.location.trim().parse().ok(),
            is_published: self.is_published,
            image_url,
        }
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Optional `<select>` value; empty means none
fn parse_choice(raw: &str, field: &str, errors: &mut Vec<String>) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(format!("Select a valid {}", field));
            None
        }
    }
}

async fn render_post_form(
    state: &AppState,
    member: &LoginRequired,
    values: &PostFormValues,
    errors: &[String],
    post: Option<&Post>,
    status: StatusCode,
) -> Result<Response, PageError> {
    let categories = state.category_service.list().await?;
    let locations = state.location_service.list().await?;

    let action = match post {
        Some(post) => format!("/posts/{}/edit/", post.id),
        None => "/posts/create/".to_string(),
    };

    let mut context = TeraContext::new();
    context.insert("form", values);
    context.insert("errors", errors);
    context.insert("categories", &categories);
    context.insert("locations", &locations);
    context.insert("is_edit", &post.is_some());
    context.insert("action", &action);

    let html = state.render("blog/create.html", &context, Some(&member.user), &member.path)?;
    Ok((status, html).into_response())
}

async fn discard_upload(state: &AppState, path: &str) {
    if let Err(e) = state.media.delete(path).await {
        tracing::warn!("Failed to remove rejected upload {}: {}", path, e);
    }
}
