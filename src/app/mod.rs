//! Client-side behaviour of the photo app: who the user is, what is on
//! screen, and the sequence of backend calls behind each user action.

mod composer;
mod error;
mod identity;
mod profile;
mod session;
mod store;

pub use self::composer::{avatar_key, image_key, file_extension, ImageSource, PostDraft, Upload};
pub use self::error::{ClientError, ClientResult};
pub use self::identity::Identity;
pub use self::profile::ProfileView;
pub use self::session::{ClientSettings, DeleteOutcome, PostSubmitted, Session};
pub use self::store::{Action, Store};
