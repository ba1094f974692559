use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header;
use axum::http::request::Parts;
use std::collections::HashMap;
use url::form_urlencoded;

use crate::app::Upload;
use crate::error::AppError;
use crate::state::AppState;

/// The user name persisted in the identity cookie, if any.
#[derive(Debug, Clone)]
pub struct PersistedName(pub Option<String>);

impl FromRequestParts<AppState> for PersistedName {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let name = read_cookie(parts, &state.config.identity.cookie_name)
            .map(decode_component)
            .filter(|name| !name.trim().is_empty());
        Ok(PersistedName(name))
    }
}

/// `Set-Cookie` value that keeps the chosen name for ten years.
pub fn name_cookie(cookie_name: &str, user_name: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age=315360000; SameSite=Lax",
        cookie_name,
        encode_component(user_name)
    )
}

pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Inverse of [`encode_component`]. An encoded value has no raw `=` or `&`,
/// so it parses as a single bare key.
pub fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default()
}

fn read_cookie<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

/// A `multipart/form-data` body split into text fields and files.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    form.files.insert(
                        name,
                        Upload {
                            file_name,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }
}
