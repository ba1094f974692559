use std::collections::HashMap;

use crate::db::models::{Comment, Notification, Post};

/// Everything the page shows, replaced only through [`Store::apply`].
#[derive(Debug, Clone, Default)]
pub struct Store {
    posts: Vec<Post>,
    /// Comments by parent post id, oldest first.
    comments: HashMap<String, Vec<Comment>>,
    notifications: Vec<Notification>,
    notifications_open: bool,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    PostsLoaded(Vec<Post>),
    CommentsLoaded(Vec<Comment>),
    /// A freshly inserted post goes to the top of the timeline.
    PostCreated(Post),
    /// Replace the row with the same id by the backend-confirmed row.
    PostUpdated(Post),
    /// Drop the post and every comment attached to it.
    PostDeleted(String),
    CommentAdded(Comment),
    NotificationsLoaded(Vec<Notification>),
    NotificationsMarkedRead,
    NotificationsOpened,
    AvatarLoaded(Option<String>),
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::PostsLoaded(posts) => self.posts = posts,
            Action::CommentsLoaded(comments) => {
                let mut index: HashMap<String, Vec<Comment>> = HashMap::new();
                for comment in comments {
                    index
                        .entry(comment.post_id.clone())
                        .or_default()
                        .push(comment);
                }
                self.comments = index;
            }
            Action::PostCreated(post) => self.posts.insert(0, post),
            Action::PostUpdated(post) => {
                if let Some(slot) = self.posts.iter_mut().find(|p| p.id == post.id) {
                    *slot = post;
                }
            }
            Action::PostDeleted(post_id) => {
                self.posts.retain(|p| p.id != post_id);
                self.comments.remove(&post_id);
            }
            Action::CommentAdded(comment) => {
                self.comments
                    .entry(comment.post_id.clone())
                    .or_default()
                    .push(comment);
            }
            Action::NotificationsLoaded(notifications) => self.notifications = notifications,
            Action::NotificationsMarkedRead => {
                for notification in &mut self.notifications {
                    notification.read = true;
                }
            }
            Action::NotificationsOpened => self.notifications_open = true,
            Action::AvatarLoaded(url) => self.avatar_url = url,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn comments_for(&self, post_id: &str) -> &[Comment] {
        self.comments
            .get(post_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn notifications_open(&self) -> bool {
        self.notifications_open
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}
