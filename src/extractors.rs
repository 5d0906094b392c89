use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session::cookie_value;
use crate::error::AppError;
use crate::state::AppState;

/// The signed-in user, rebuilt from the session payload without touching
/// the accounts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Name to greet the user with.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("friend")
    }
}

/// Extractor that requires authentication.
/// Anonymous requests are rejected with a redirect to the login page.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let payload = state
            .sessions
            .load(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(payload.into_user())
    }
}

/// Optional user extractor: `None` instead of a redirect when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    /// Display name for page chrome.
    pub fn viewer(&self) -> Option<String> {
        self.0.as_ref().map(|user| user.name().to_string())
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => {
                tracing::warn!("Session lookup failed, treating request as anonymous: {}", e);
                Ok(MaybeUser(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, display_name: Option<&str>) -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            username: username.map(String::from),
            display_name: display_name.map(String::from),
        }
    }

    #[test]
    fn name_prefers_display_name_then_username() {
        assert_eq!(user(Some("alice"), Some("Alice A.")).name(), "Alice A.");
        assert_eq!(user(Some("alice"), None).name(), "alice");
        assert_eq!(user(None, None).name(), "friend");
    }

    #[test]
    fn maybe_user_reports_authentication() {
        assert!(!MaybeUser(None).is_authenticated());
        assert_eq!(MaybeUser(None).viewer(), None);

        let signed_in = MaybeUser(Some(user(None, Some("Ada"))));
        assert!(signed_in.is_authenticated());
        assert_eq!(signed_in.viewer().as_deref(), Some("Ada"));
    }
}
