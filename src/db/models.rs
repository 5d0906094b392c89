use serde::{Deserialize, Serialize};
use std::fmt;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 255;
pub const BODY_MIN_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub created_at: String,
}

/// A post that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    title: String,
    body: String,
}

impl NewPost {
    pub fn new(title: &str, body: &str) -> Result<Self, ValidationError> {
        let title = title.trim();
        let body = body.trim();

        let title_len = title.chars().count();
        if title_len < TITLE_MIN_CHARS {
            return Err(ValidationError::new(
                "title",
                format!("must be at least {TITLE_MIN_CHARS} characters"),
            ));
        }
        if title_len > TITLE_MAX_CHARS {
            return Err(ValidationError::new(
                "title",
                format!("must be at most {TITLE_MAX_CHARS} characters"),
            ));
        }
        if body.chars().count() < BODY_MIN_CHARS {
            return Err(ValidationError::new(
                "body",
                format!("must be at least {BODY_MIN_CHARS} characters"),
            ));
        }

        Ok(Self {
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// One way of proving who an account belongs to.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Local { password_hash: String },
    External { provider_id: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Local { .. } => f
                .debug_struct("Local")
                .field("password_hash", &"<redacted>")
                .finish(),
            Credential::External { provider_id } => f
                .debug_struct("External")
                .field("provider_id", provider_id)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub credentials: Vec<Credential>,
    pub created_at: String,
}

impl UserAccount {
    pub fn password_hash(&self) -> Option<&str> {
        self.credentials.iter().find_map(|c| match c {
            Credential::Local { password_hash } => Some(password_hash.as_str()),
            Credential::External { .. } => None,
        })
    }

    pub fn external_id(&self) -> Option<&str> {
        self.credentials.iter().find_map(|c| match c {
            Credential::External { provider_id } => Some(provider_id.as_str()),
            Credential::Local { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_of_three_chars_is_accepted_and_two_rejected() {
        assert!(NewPost::new("abc", "body text").is_ok());

        let err = NewPost::new("ab", "body text").unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        assert!(NewPost::new("été", "body").is_ok());
        assert!(NewPost::new(&"é".repeat(255), "body").is_ok());
        assert!(NewPost::new(&"é".repeat(256), "body").is_err());
    }

    #[test]
    fn surrounding_whitespace_does_not_count() {
        let err = NewPost::new("  ab  ", "body").unwrap_err();
        assert_eq!(err.field, "title");

        let err = NewPost::new("Title", " x ").unwrap_err();
        assert_eq!(err.field, "body");

        let post = NewPost::new("  Title ", "\nBody\n").unwrap();
        assert_eq!(post.title(), "Title");
        assert_eq!(post.body(), "Body");
    }

    #[test]
    fn credential_debug_hides_password_hash() {
        let account = UserAccount {
            id: "a1".into(),
            username: Some("alice".into()),
            display_name: None,
            credentials: vec![Credential::Local {
                password_hash: "$2b$04$secret".into(),
            }],
            created_at: String::new(),
        };
        let debug = format!("{:?}", account);
        assert!(!debug.contains("$2b$04$secret"));
        assert_eq!(account.password_hash(), Some("$2b$04$secret"));
        assert_eq!(account.external_id(), None);
    }
}
