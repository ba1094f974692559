use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::app::{Identity, Session};
use crate::error::AppResult;
use crate::extractors::PersistedName;
use crate::routes::views::{
    notification_views, post_cards, HeaderView, NotificationView, PostCard,
};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/timeline.html")]
pub struct TimelineTemplate {
    pub header: HeaderView,
    pub alert: Option<String>,
    pub posts: Vec<PostCard>,
    /// `Some` while the notifications panel is open.
    pub panel: Option<Vec<NotificationView>>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub alert: Option<String>,
}

/// A session for one request, built from the identity cookie and, while
/// no name is locked, whatever name the form carried.
pub fn open_session(state: &AppState, persisted: Option<&str>, typed: Option<&str>) -> Session {
    Session::new(
        state.backend.clone(),
        Identity::resolve(persisted, typed),
        state.config.client_settings(),
    )
}

pub async fn index(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<TimelineTemplate>> {
    let mut session = open_session(&state, name.as_deref(), None);
    let mut alert = query.alert;
    if let Err(e) = session.load().await {
        alert = Some(e.to_string());
    }

    Ok(Html(render_timeline(&session, alert)))
}

/// The timeline with the notifications panel open. Opening marks every
/// notification read, so the badge renders as zero.
pub async fn notifications(
    State(state): State<AppState>,
    PersistedName(name): PersistedName,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<TimelineTemplate>> {
    let mut session = open_session(&state, name.as_deref(), None);
    let mut alert = query.alert;
    if let Err(e) = session.load_timeline().await {
        alert = Some(e.to_string());
    }
    session.open_notifications().await;

    Ok(Html(render_timeline(&session, alert)))
}

fn render_timeline(session: &Session, alert: Option<String>) -> TimelineTemplate {
    let store = session.store();
    TimelineTemplate {
        header: HeaderView::from_session(session),
        alert,
        posts: post_cards(session),
        panel: store
            .notifications_open()
            .then(|| notification_views(store.notifications())),
    }
}
