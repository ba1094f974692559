use super::error::{ClientError, ClientResult};

/// The free-text user name. It is the only identity there is: whoever
/// claims a name acts as that name.
///
/// A persisted name is locked (read-only). An unlocked name follows what the
/// user types until the first successful post locks it for good.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    name: String,
    locked: bool,
}

impl Identity {
    /// Identity from the persisted value, if any. Blank values are ignored.
    pub fn restore(persisted: Option<&str>) -> Self {
        match persisted.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Self {
                name: name.to_string(),
                locked: true,
            },
            None => Self::default(),
        }
    }

    /// A persisted name wins; otherwise the name typed into the form is used.
    pub fn resolve(persisted: Option<&str>, typed: Option<&str>) -> Self {
        let mut identity = Self::restore(persisted);
        if let Some(typed) = typed {
            identity.set_name(typed);
        }
        identity
    }

    /// Edit the name field. Has no effect once locked.
    pub fn set_name(&mut self, value: &str) {
        if !self.locked {
            self.name = value.to_string();
        }
    }

    /// The trimmed name; empty when none has been entered.
    pub fn current(&self) -> &str {
        self.name.trim()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_present(&self) -> bool {
        !self.current().is_empty()
    }

    /// The trimmed name, or a validation error carrying `message`.
    pub fn require(&self, message: &str) -> ClientResult<String> {
        if self.is_present() {
            Ok(self.current().to_string())
        } else {
            Err(ClientError::validation(message))
        }
    }

    /// Lock the name after a successful post. Returns the trimmed value to
    /// persist the first time, `None` if it was already locked.
    pub fn lock(&mut self) -> Option<String> {
        if self.locked || !self.is_present() {
            return None;
        }
        self.name = self.name.trim().to_string();
        self.locked = true;
        Some(self.name.clone())
    }
}
