use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::app::{ClientError, Session};
use crate::error::AppResult;
use crate::extractors::{MultipartForm, PersistedName};
use crate::routes::home::{open_session, Html, PageQuery};
use crate::routes::posts::alert_redirect;
use crate::routes::views::{grid_items, initial, profile_href, GridItem, HeaderView};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub header: HeaderView,
    pub alert: Option<String>,
    pub subject: Option<String>,
    pub initial: String,
    pub avatar_url: Option<String>,
    pub post_count: usize,
    pub total_likes: i64,
    pub can_change_avatar: bool,
    pub grid: Vec<GridItem>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(own_profile))
        .route("/avatar", post(change_avatar))
        .route("/profile/{name}", get(user_profile))
}

/// The header's profile button: the current user's own page.
async fn own_profile(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let mut session = open_session(&state, name.as_deref(), None);
    let mut alert = query.alert;
    if let Err(e) = session.load().await {
        alert = Some(e.to_string());
    }

    let subject = session.identity().current().to_string();
    Ok(Html(render_profile(&session, Some(subject.as_str()), alert)))
}

async fn user_profile(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Path(subject): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let mut session = open_session(&state, name.as_deref(), None);
    let mut alert = query.alert;
    if let Err(e) = session.load().await {
        alert = Some(e.to_string());
    }

    Ok(Html(render_profile(&session, Some(subject.as_str()), alert)))
}

async fn change_avatar(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    mut form: MultipartForm,
) -> AppResult<Response> {
    let typed = form.text("user_name");
    let mut session = open_session(&state, name.as_deref(), typed.as_deref());
    let back = match session.identity().current() {
        "" => "/profile".to_string(),
        current => profile_href(current),
    };

    let Some(upload) = form.take_file("avatar") else {
        return Ok(alert_redirect(
            &back,
            &ClientError::validation("Choose an image for your avatar"),
        ));
    };

    match session.change_avatar(upload).await {
        Ok(_) => Ok(Redirect::to(&back).into_response()),
        Err(e) => Ok(alert_redirect(&back, &e)),
    }
}

fn render_profile(session: &Session, subject: Option<&str>, alert: Option<String>) -> ProfileTemplate {
    let view = session.profile(subject);
    ProfileTemplate {
        header: HeaderView::from_session(session),
        alert,
        initial: view.subject.as_deref().map(initial).unwrap_or_default(),
        avatar_url: view.avatar_url.clone(),
        post_count: view.post_count(),
        total_likes: view.total_likes,
        can_change_avatar: view.can_change_avatar,
        grid: grid_items(&view.posts),
        subject: view.subject,
    }
}
