//! Client records

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// A stored client row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Input for creating a client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: String,
}

impl NewClient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Name of at least 2 characters and a plausible email address
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 2 {
            return Err(StoreError::Validation(
                "name must be at least 2 characters long".into(),
            ));
        }

        if !looks_like_email(&self.email) {
            return Err(StoreError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }

        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
