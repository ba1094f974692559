use bytes::Bytes;
use chrono::Utc;
use rand::Rng;

use super::error::{ClientError, ClientResult};

/// A file picked in a form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A pasted image address, stored as-is.
    Url(String),
    File(Upload),
}

/// What the composer form holds at submit time.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub caption: String,
    pub image: Option<ImageSource>,
}

impl PostDraft {
    /// Picks the image source from the two form inputs. A chosen file wins
    /// over a pasted URL; blank inputs count as absent.
    pub fn from_form(caption: String, image_url: Option<String>, file: Option<Upload>) -> Self {
        let file = file.filter(|f| !f.file_name.is_empty() || !f.data.is_empty());
        let image = match (file, image_url) {
            (Some(file), _) => Some(ImageSource::File(file)),
            (None, Some(url)) if !url.trim().is_empty() => Some(ImageSource::Url(url)),
            _ => None,
        };
        Self { caption, image }
    }

    /// Trimmed caption, `None` when blank.
    pub fn caption(&self) -> Option<String> {
        let caption = self.caption.trim();
        (!caption.is_empty()).then(|| caption.to_string())
    }

    pub(crate) fn require_image(&self) -> ClientResult<&ImageSource> {
        match &self.image {
            None => Err(ClientError::validation("Choose an image to post")),
            Some(ImageSource::File(upload)) if upload.data.is_empty() => {
                Err(ClientError::validation("The selected image file is empty"))
            }
            Some(source) => Ok(source),
        }
    }
}

/// Extension of an uploaded file name, lowercased; `png` when there is
/// no usable one.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string())
}

/// Random lowercase base-36 token for upload keys.
pub(crate) fn random_token() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..11)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Key for a post image: `<millis>_<token>.<ext>`, optionally under a
/// folder named after the user.
pub fn image_key(millis: i64, token: &str, ext: &str, folder: Option<&str>) -> String {
    let file = format!("{millis}_{token}.{ext}");
    match folder {
        Some(folder) => format!("{}/{}", folder_segment(folder), file),
        None => file,
    }
}

/// Key for an avatar. Never contains user text.
pub fn avatar_key(millis: i64, token: &str, ext: &str) -> String {
    format!("avatar-{millis}-{token}.{ext}")
}

/// A user name made safe to use as one path segment.
fn folder_segment(name: &str) -> String {
    let segment: String = name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    match segment.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, data: &'static [u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: None,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn file_wins_over_url() {
        let draft = PostDraft::from_form(
            String::new(),
            Some("https://example.com/a.png".to_string()),
            Some(upload("b.jpg", b"jpg")),
        );
        assert!(matches!(draft.image, Some(ImageSource::File(_))));
    }

    #[test]
    fn blank_inputs_mean_no_image() {
        let draft = PostDraft::from_form(String::new(), Some("   ".to_string()), None);
        assert!(draft.image.is_none());
        assert!(matches!(
            draft.require_image(),
            Err(ClientError::Validation(_))
        ));

        // Browsers submit an empty part when no file was chosen
        let draft = PostDraft::from_form(String::new(), None, Some(upload("", b"")));
        assert!(draft.image.is_none());
    }

    #[test]
    fn empty_file_is_rejected() {
        let draft = PostDraft::from_form(String::new(), None, Some(upload("a.png", b"")));
        assert!(matches!(
            draft.require_image(),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn caption_is_trimmed_or_none() {
        let mut draft = PostDraft::default();
        draft.caption = "  hi  ".to_string();
        assert_eq!(draft.caption(), Some("hi".to_string()));
        draft.caption = "   ".to_string();
        assert_eq!(draft.caption(), None);
    }

    #[test]
    fn extension_falls_back_to_png() {
        assert_eq!(file_extension("cat.JPG"), "jpg");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("noext"), "png");
        assert_eq!(file_extension("trailing."), "png");
        assert_eq!(file_extension("weird.p/ng"), "png");
    }

    #[test]
    fn image_key_shape() {
        assert_eq!(image_key(1700000000000, "abc123", "png", None), "1700000000000_abc123.png");
        assert_eq!(
            image_key(1, "t", "gif", Some("ゆき")),
            "ゆき/1_t.gif"
        );
        assert_eq!(image_key(1, "t", "gif", Some("../x")), ".._x/1_t.gif");
        assert_eq!(image_key(1, "t", "gif", Some("..")), "_/1_t.gif");
    }

    #[test]
    fn avatar_key_has_no_user_text() {
        assert_eq!(avatar_key(42, "tok", "webp"), "avatar-42-tok.webp");
    }

    #[test]
    fn random_tokens_are_base36_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 11);
        assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(a, b);
    }
}
