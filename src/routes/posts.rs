use askama::Template;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::app::{ClientError, DeleteOutcome, PostDraft};
use crate::error::AppResult;
use crate::extractors::{name_cookie, MultipartForm, PersistedName};
use crate::routes::home::{open_session, Html};
use crate::routes::views::{with_alert, HeaderView};
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub header: HeaderView,
    pub post_id: String,
    pub image_url: String,
    pub caption: Option<String>,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct LikeForm {
    pub user_name: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub user_name: Option<String>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct DeleteForm {
    pub confirm: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/comments", post(create_comment))
        .route(
            "/posts/{id}/delete",
            get(confirm_delete).post(delete_post),
        )
}

// --- Handlers ---

/// Send the user back with the failure shown as an alert.
pub fn alert_redirect(path: &str, err: &ClientError) -> Response {
    Redirect::to(&with_alert(path, &err.to_string())).into_response()
}

fn post_anchor(post_id: &str) -> String {
    format!("/#post-{}", post_id)
}

async fn create_post(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    mut form: MultipartForm,
) -> AppResult<Response> {
    let typed = form.text("user_name");
    let mut session = open_session(&state, name.as_deref(), typed.as_deref());

    let draft = PostDraft::from_form(
        form.text("caption").unwrap_or_default(),
        form.text("image_url"),
        form.take_file("image"),
    );

    match session.submit_post(draft).await {
        Ok(submitted) => {
            let redirect = Redirect::to(&post_anchor(&submitted.post.id));
            match submitted.persisted_name {
                Some(user_name) => {
                    let cookie = name_cookie(&state.config.identity.cookie_name, &user_name);
                    Ok(([(header::SET_COOKIE, cookie)], redirect).into_response())
                }
                None => Ok(redirect.into_response()),
            }
        }
        Err(e) => Ok(alert_redirect("/", &e)),
    }
}

async fn like_post(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Path(id): Path<String>,
    Form(form): Form<LikeForm>,
) -> AppResult<Response> {
    let mut session = open_session(&state, name.as_deref(), form.user_name.as_deref());
    if let Err(e) = session.load().await {
        return Ok(alert_redirect("/", &e));
    }

    match session.like(&id).await {
        Ok(_) => Ok(Redirect::to(&post_anchor(&id)).into_response()),
        Err(e) => Ok(alert_redirect("/", &e)),
    }
}

async fn create_comment(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let mut session = open_session(&state, name.as_deref(), form.user_name.as_deref());
    if let Err(e) = session.load().await {
        return Ok(alert_redirect("/", &e));
    }

    match session.add_comment(&id, &form.body).await {
        Ok(_) => Ok(Redirect::to(&post_anchor(&id)).into_response()),
        Err(e) => Ok(alert_redirect("/", &e)),
    }
}

/// Ask before deleting. Only the author gets this far.
async fn confirm_delete(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let mut session = open_session(&state, name.as_deref(), None);
    if let Err(e) = session.load().await {
        return Ok(alert_redirect("/", &e));
    }

    if let Err(e) = session.delete_post(&id, false).await {
        return Ok(alert_redirect("/", &e));
    }

    let Some(post) = session.store().post(&id) else {
        return Ok(alert_redirect("/", &ClientError::NotFound));
    };
    let template = ConfirmDeleteTemplate {
        header: HeaderView::from_session(&session),
        post_id: post.id.clone(),
        image_url: post.image_url.clone(),
        caption: post.caption.clone(),
    };
    Ok(Html(template).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Path(id): Path<String>,
    Form(form): Form<DeleteForm>,
) -> AppResult<Response> {
    let mut session = open_session(&state, name.as_deref(), None);
    if let Err(e) = session.load().await {
        return Ok(alert_redirect("/", &e));
    }

    let confirmed = form.confirm.as_deref() == Some("yes");
    match session.delete_post(&id, confirmed).await {
        Ok(DeleteOutcome::Deleted) => Ok(Redirect::to("/").into_response()),
        Ok(DeleteOutcome::Cancelled) => Ok(Redirect::to(&post_anchor(&id)).into_response()),
        Err(e) => Ok(alert_redirect("/", &e)),
    }
}
