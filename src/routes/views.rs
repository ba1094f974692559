use chrono::{DateTime, Utc};

use crate::app::Session;
use crate::db::models::{Notification, NotificationKind, Post};
use crate::extractors::encode_component;

// --- View structs ---

pub struct HeaderView {
    pub name: String,
    pub locked: bool,
    pub initial: String,
    pub avatar_url: Option<String>,
    pub unread: usize,
    pub profile_href: Option<String>,
}

pub struct PostCard {
    pub id: String,
    pub user_name: String,
    pub initial: String,
    pub profile_href: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub likes: i64,
    pub created_at: String,
    pub can_delete: bool,
    pub needs_name: bool,
    pub comments: Vec<CommentView>,
}

pub struct CommentView {
    pub user_name: String,
    pub body: String,
}

pub struct NotificationView {
    pub icon: &'static str,
    pub from_user: String,
    pub message: &'static str,
    pub body: Option<String>,
    pub created_at: String,
    pub read: bool,
}

pub struct GridItem {
    pub image_url: String,
    pub caption: String,
}

impl HeaderView {
    pub fn from_session(session: &Session) -> Self {
        let identity = session.identity();
        let name = identity.current().to_string();
        Self {
            initial: initial(&name),
            profile_href: (!name.is_empty()).then(|| profile_href(&name)),
            avatar_url: session.store().avatar_url().map(str::to_string),
            unread: session.store().unread_count(),
            locked: identity.is_locked(),
            name,
        }
    }
}

pub fn post_cards(session: &Session) -> Vec<PostCard> {
    let current = session.identity().current();
    let needs_name = !session.identity().is_locked();
    session
        .store()
        .posts()
        .iter()
        .map(|post| post_card(post, session, current, needs_name))
        .collect()
}

fn post_card(post: &Post, session: &Session, current: &str, needs_name: bool) -> PostCard {
    PostCard {
        id: post.id.clone(),
        user_name: post.user_name.clone(),
        initial: initial(&post.user_name),
        profile_href: profile_href(&post.user_name),
        image_url: post.image_url.clone(),
        caption: post.caption.clone(),
        likes: post.likes,
        created_at: format_relative_time(&post.created_at),
        can_delete: !current.is_empty() && post.user_name == current,
        needs_name,
        comments: session
            .store()
            .comments_for(&post.id)
            .iter()
            .map(|c| CommentView {
                user_name: c.user_name.clone(),
                body: c.body.clone(),
            })
            .collect(),
    }
}

pub fn notification_views(notifications: &[Notification]) -> Vec<NotificationView> {
    notifications
        .iter()
        .map(|n| {
            let (icon, message) = match n.kind {
                NotificationKind::Like => ("\u{2764}\u{fe0f}", "liked your post"),
                NotificationKind::Comment => ("\u{1f4ac}", "commented"),
            };
            NotificationView {
                icon,
                from_user: n.from_user.clone(),
                message,
                body: n.body.clone(),
                created_at: format_relative_time(&n.created_at),
                read: n.read,
            }
        })
        .collect()
}

pub fn grid_items(posts: &[Post]) -> Vec<GridItem> {
    posts
        .iter()
        .map(|p| GridItem {
            image_url: p.image_url.clone(),
            caption: p.caption.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn profile_href(user_name: &str) -> String {
    format!("/profile/{}", encode_path_segment(user_name))
}

/// Form encoding writes spaces as `+`, which a path keeps literally.
fn encode_path_segment(value: &str) -> String {
    encode_component(value).replace('+', "%20")
}

/// Upper-cased first character, `?` for an empty name.
pub fn initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

/// Append an `alert` query parameter to a local path.
pub fn with_alert(path: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}alert={}", path, separator, encode_component(message))
}

// --- Time formatting ---

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
