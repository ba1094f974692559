use super::composer::{
    avatar_key, file_extension, image_key, now_millis, random_token, ImageSource, PostDraft, Upload,
};
use super::error::{ClientError, ClientResult};
use super::identity::Identity;
use super::profile::ProfileView;
use super::store::{Action, Store};
use crate::backend::{Backend, Bucket, UploadOptions};
use crate::db::models::{Comment, NewComment, NewNotification, NewPost, NotificationKind, Post, Profile};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub notification_limit: usize,
    pub cache_control: String,
    pub nest_uploads_under_user: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            notification_limit: 30,
            cache_control: "3600".to_string(),
            nest_uploads_under_user: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostSubmitted {
    pub post: Post,
    /// Set when this post locked the name; the caller persists it.
    pub persisted_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user did not confirm; nothing was sent.
    Cancelled,
}

/// One user's view of the app: identity, on-screen state and the backend.
///
/// Every operation validates first, then awaits its backend calls one after
/// another, and only touches the store once the calls it depends on have
/// succeeded. A failed operation leaves the store as it was.
pub struct Session {
    backend: Backend,
    identity: Identity,
    store: Store,
    settings: ClientSettings,
}

impl Session {
    pub fn new(backend: Backend, identity: Identity, settings: ClientSettings) -> Self {
        Self {
            backend,
            identity,
            store: Store::new(),
            settings,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Page load: the timeline plus this user's notifications.
    pub async fn load(&mut self) -> ClientResult<()> {
        self.load_timeline().await?;
        self.fetch_notifications().await;
        Ok(())
    }

    /// Posts, comments and the user's avatar, without notifications. Only a
    /// failure to load posts is reported.
    pub async fn load_timeline(&mut self) -> ClientResult<()> {
        let posts = self
            .backend
            .rows
            .list_posts()
            .await
            .map_err(|e| ClientError::backend("load posts", e))?;
        self.store.apply(Action::PostsLoaded(posts));

        match self.backend.rows.list_comments().await {
            Ok(comments) => self.store.apply(Action::CommentsLoaded(comments)),
            Err(e) => tracing::warn!("Failed to load comments: {}", e),
        }

        if self.identity.is_locked() {
            self.load_avatar().await;
        }

        Ok(())
    }

    pub async fn load_avatar(&mut self) {
        let user_name = self.identity.current().to_string();
        if user_name.is_empty() {
            return;
        }

        match self.backend.rows.find_profile(&user_name).await {
            Ok(profile) => self.store.apply(Action::AvatarLoaded(
                profile.and_then(|p| p.avatar_url),
            )),
            Err(e) => tracing::warn!("Failed to load profile for {}: {}", user_name, e),
        }
    }

    pub async fn submit_post(&mut self, draft: PostDraft) -> ClientResult<PostSubmitted> {
        let user_name = self.identity.require("Enter your name before posting")?;
        let image_url = match draft.require_image()? {
            ImageSource::Url(url) => url.trim().to_string(),
            ImageSource::File(upload) => {
                let folder = self
                    .settings
                    .nest_uploads_under_user
                    .then_some(user_name.as_str());
                let key = image_key(
                    now_millis(),
                    &random_token(),
                    &file_extension(&upload.file_name),
                    folder,
                );
                self.upload(Bucket::Images, &key, upload, false)
                    .await
                    .map_err(|e| ClientError::backend("upload image", e))?;
                self.backend.blobs.public_url(Bucket::Images, &key)
            }
        };

        let post = self
            .backend
            .rows
            .insert_post(NewPost {
                user_name: user_name.clone(),
                image_url,
                caption: draft.caption(),
            })
            .await
            .map_err(|e| ClientError::backend("create post", e))?;

        tracing::info!("{} posted {}", user_name, post.id);
        let persisted_name = self.identity.lock();
        self.store.apply(Action::PostCreated(post.clone()));

        Ok(PostSubmitted {
            post,
            persisted_name,
        })
    }

    /// Add one like. Repeated likes accumulate.
    pub async fn like(&mut self, post_id: &str) -> ClientResult<Post> {
        let liker = self.identity.require("Enter your name before liking")?;
        let post = self.store.post(post_id).cloned().ok_or(ClientError::NotFound)?;

        let updated = self
            .backend
            .rows
            .set_post_likes(&post.id, post.likes + 1)
            .await
            .map_err(|e| ClientError::backend("like post", e))?;
        self.store.apply(Action::PostUpdated(updated.clone()));

        if post.user_name != liker {
            self.notify(NewNotification {
                user_name: post.user_name,
                from_user: liker,
                post_id: post.id,
                kind: NotificationKind::Like,
                body: None,
            })
            .await;
        }

        Ok(updated)
    }

    pub async fn add_comment(&mut self, post_id: &str, text: &str) -> ClientResult<Comment> {
        let commenter = self.identity.require("Enter your name before commenting")?;
        let body = text.trim();
        if body.is_empty() {
            return Err(ClientError::validation("Write something before sending"));
        }
        let post = self.store.post(post_id).cloned().ok_or(ClientError::NotFound)?;

        let comment = self
            .backend
            .rows
            .insert_comment(NewComment {
                post_id: post.id.clone(),
                user_name: commenter.clone(),
                body: body.to_string(),
            })
            .await
            .map_err(|e| ClientError::backend("add comment", e))?;
        self.store.apply(Action::CommentAdded(comment.clone()));

        if post.user_name != commenter {
            self.notify(NewNotification {
                user_name: post.user_name,
                from_user: commenter,
                post_id: post.id,
                kind: NotificationKind::Comment,
                body: Some(comment.body.clone()),
            })
            .await;
        }

        Ok(comment)
    }

    /// Delete one of the current user's own posts.
    pub async fn delete_post(
        &mut self,
        post_id: &str,
        confirmed: bool,
    ) -> ClientResult<DeleteOutcome> {
        let post = self.store.post(post_id).ok_or(ClientError::NotFound)?;
        let current = self.identity.current().to_string();
        if current.is_empty() || post.user_name != current {
            return Err(ClientError::NotAuthor);
        }
        if !confirmed {
            return Ok(DeleteOutcome::Cancelled);
        }

        let deleted = self
            .backend
            .rows
            .delete_post(post_id, &current)
            .await
            .map_err(|e| ClientError::backend("delete post", e))?;
        if deleted == 0 {
            tracing::warn!("Post {} was already gone", post_id);
        }

        self.store.apply(Action::PostDeleted(post_id.to_string()));
        Ok(DeleteOutcome::Deleted)
    }

    /// Upload a new avatar and point the user's profile at it. Returns the
    /// avatar's public URL.
    pub async fn change_avatar(&mut self, upload: Upload) -> ClientResult<String> {
        let user_name = self
            .identity
            .require("Enter your name before changing your avatar")?;
        if upload.data.is_empty() {
            return Err(ClientError::validation("Choose an image for your avatar"));
        }

        let key = avatar_key(
            now_millis(),
            &random_token(),
            &file_extension(&upload.file_name),
        );
        self.upload(Bucket::Avatars, &key, &upload, true)
            .await
            .map_err(|e| ClientError::backend("upload avatar", e))?;
        let avatar_url = self.backend.blobs.public_url(Bucket::Avatars, &key);

        self.backend
            .rows
            .upsert_profile(Profile {
                user_name,
                avatar_url: Some(avatar_url.clone()),
            })
            .await
            .map_err(|e| ClientError::backend("save profile", e))?;

        self.store.apply(Action::AvatarLoaded(Some(avatar_url.clone())));
        Ok(avatar_url)
    }

    pub async fn fetch_notifications(&mut self) {
        let user_name = self.identity.current().to_string();
        if user_name.is_empty() {
            return;
        }

        match self
            .backend
            .rows
            .list_notifications(&user_name, self.settings.notification_limit)
            .await
        {
            Ok(notifications) => self.store.apply(Action::NotificationsLoaded(notifications)),
            Err(e) => tracing::warn!("Failed to fetch notifications: {}", e),
        }
    }

    /// Open the panel: refetch, mark everything read on the backend, then
    /// mark it read locally. The badge reads zero once this returns.
    pub async fn open_notifications(&mut self) {
        self.fetch_notifications().await;
        self.store.apply(Action::NotificationsOpened);

        let user_name = self.identity.current().to_string();
        if user_name.is_empty() {
            return;
        }

        match self.backend.rows.mark_notifications_read(&user_name).await {
            Ok(updated) => {
                tracing::debug!("Marked {} notifications read for {}", updated, user_name);
                self.store.apply(Action::NotificationsMarkedRead);
            }
            Err(e) => tracing::warn!("Failed to mark notifications read: {}", e),
        }
    }

    pub fn profile(&self, subject: Option<&str>) -> ProfileView {
        ProfileView::derive(&self.store, subject, self.identity.current())
    }

    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        upload: &Upload,
        upsert: bool,
    ) -> crate::backend::BackendResult<()> {
        let content_type = upload
            .content_type
            .clone()
            .filter(|ct| ct.starts_with("image/"));
        self.backend
            .blobs
            .upload(
                bucket,
                key,
                upload.data.clone(),
                UploadOptions {
                    cache_control: self.settings.cache_control.clone(),
                    upsert,
                    content_type,
                },
            )
            .await
    }

    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.backend.rows.insert_notification(notification).await {
            tracing::warn!("Failed to create notification: {}", e);
        }
    }
}
