use super::store::Store;
use crate::db::models::Post;

/// One author's page, derived from posts already in the store.
#[derive(Debug, Clone, Default)]
pub struct ProfileView {
    /// `None` when no user was selected.
    pub subject: Option<String>,
    pub posts: Vec<Post>,
    pub total_likes: i64,
    /// Only known for one's own profile.
    pub avatar_url: Option<String>,
    pub can_change_avatar: bool,
}

impl ProfileView {
    pub fn derive(store: &Store, subject: Option<&str>, current_name: &str) -> Self {
        let Some(subject) = subject.filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let posts: Vec<Post> = store
            .posts()
            .iter()
            .filter(|p| p.user_name == subject)
            .cloned()
            .collect();
        let total_likes = posts.iter().map(|p| p.likes).sum();
        let own = !current_name.is_empty() && subject == current_name;

        Self {
            subject: Some(subject.to_string()),
            posts,
            total_likes,
            avatar_url: if own {
                store.avatar_url().map(str::to_string)
            } else {
                None
            },
            can_change_avatar: own,
        }
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}
