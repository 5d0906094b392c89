use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::external::find_or_create_external;
use crate::auth::local::{authenticate_local, register_local};
use crate::auth::session::{clear_cookie, cookie_value, session_cookie, SessionPayload};
use crate::auth::AuthError;
use crate::db::models::UserAccount;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::home::Html;
use crate::state::AppState;

const OAUTH_STATE_COOKIE: &str = "scribe_oauth_state";
const OAUTH_STATE_PATH: &str = "/auth/external";

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub notice: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub viewer: Option<String>,
    pub notice: Option<&'static str>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct NoticeQuery {
    pub error: Option<String>,
}

impl NoticeQuery {
    /// Only known codes produce text; anything else in the URL is ignored.
    fn message(&self) -> Option<&'static str> {
        match self.error.as_deref()? {
            "credentials" => Some("That username and password did not match."),
            "taken" => Some("That username is already taken."),
            "invalid" => Some(
                "Usernames are 3 to 32 letters, digits, '.', '_' or '-'. \
                 Passwords need at least 8 characters.",
            ),
            "external" => Some("Google sign-in did not complete. Please try again."),
            "unavailable" => Some("Sign-in is temporarily unavailable. Please try again."),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// -- Helpers --

fn redirect_with_cookies(to: &str, cookies: Vec<String>) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, to.to_string())],
        AppendHeaders(cookies.into_iter().map(|c| (header::SET_COOKIE, c))),
        "",
    )
        .into_response()
}

/// Start a session for `account` and return its cookie. Any session the
/// browser already holds is dropped first so a token is never reused
/// across logins.
async fn establish_session(
    state: &AppState,
    headers: &HeaderMap,
    account: &UserAccount,
) -> AppResult<String> {
    let auth = &state.config.auth;
    if let Some(previous) = cookie_value(headers, &auth.cookie_name) {
        state.sessions.delete(previous).await?;
    }

    let payload = SessionPayload::from_account(account);
    let token = state.sessions.create(&payload, auth.session_hours).await?;
    tracing::info!(account_id = %account.id, "Session established");

    Ok(session_cookie(
        &auth.cookie_name,
        &token,
        auth.session_hours,
        auth.secure_cookies,
    ))
}

// -- Local login --

/// GET /login: render login page, or go home if already signed in
pub async fn login_page(maybe_user: MaybeUser, Query(query): Query<NoticeQuery>) -> Response {
    if maybe_user.is_authenticated() {
        return Redirect::to("/").into_response();
    }

    Html(LoginTemplate {
        viewer: None,
        notice: query.message(),
    })
    .into_response()
}

/// POST /login: check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let result = authenticate_local(
        state.accounts.as_ref(),
        &form.username,
        &form.password,
        state.config.auth.bcrypt_cost,
    )
    .await;

    match result {
        Ok(account) => {
            let cookie = establish_session(&state, &headers, &account).await?;
            Ok(redirect_with_cookies("/", vec![cookie]))
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Rejected local login");
            Ok(Redirect::to("/login?error=credentials").into_response())
        }
        Err(e) => {
            tracing::error!("Local login failed: {}", e);
            Ok(Redirect::to("/login?error=unavailable").into_response())
        }
    }
}

// -- Registration --

/// GET /register: render registration page
pub async fn register_page(maybe_user: MaybeUser, Query(query): Query<NoticeQuery>) -> Response {
    Html(RegisterTemplate {
        viewer: maybe_user.viewer(),
        notice: query.message(),
    })
    .into_response()
}

/// POST /register: create a local account and sign it in
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let result = register_local(
        state.accounts.as_ref(),
        &form.username,
        &form.password,
        state.config.auth.bcrypt_cost,
    )
    .await;

    match result {
        Ok(account) => {
            let cookie = establish_session(&state, &headers, &account).await?;
            Ok(redirect_with_cookies("/", vec![cookie]))
        }
        Err(AuthError::DuplicateUsername) => {
            Ok(Redirect::to("/register?error=taken").into_response())
        }
        Err(AuthError::InvalidInput(reason)) => {
            tracing::debug!("Rejected registration: {}", reason);
            Ok(Redirect::to("/register?error=invalid").into_response())
        }
        Err(e) => {
            tracing::error!("Registration failed: {}", e);
            Ok(Redirect::to("/register?error=unavailable").into_response())
        }
    }
}

// -- Logout --

/// POST /logout: delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = &state.config.auth;
    if let Some(token) = cookie_value(&headers, &auth.cookie_name) {
        if let Err(e) = state.sessions.delete(token).await {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
    }

    redirect_with_cookies(
        "/",
        vec![clear_cookie(&auth.cookie_name, "/", auth.secure_cookies)],
    )
}

// -- External identity --

/// GET /auth/external: send the browser to the identity provider
pub async fn external_start(State(state): State<AppState>) -> Response {
    let csrf_state = state.oauth_states.lock().await.issue();

    let Some(url) = state.identity.authorize_url(&csrf_state) else {
        state.oauth_states.lock().await.take(&csrf_state);
        tracing::warn!("External sign-in requested but no identity provider is configured");
        return Redirect::to("/login?error=external").into_response();
    };

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age=300{}",
        OAUTH_STATE_COOKIE,
        csrf_state,
        OAUTH_STATE_PATH,
        crate::auth::session::secure_suffix(state.config.auth.secure_cookies)
    );

    redirect_with_cookies(url.as_str(), vec![cookie])
}

/// GET /auth/external/callback: finish the handshake and sign in
pub async fn external_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    let clear_state = clear_cookie(
        OAUTH_STATE_COOKIE,
        OAUTH_STATE_PATH,
        state.config.auth.secure_cookies,
    );
    let failure = |clear_state: String| {
        redirect_with_cookies("/login?error=external", vec![clear_state])
    };

    if let Some(error) = query.error.as_deref() {
        tracing::info!("Identity provider returned error: {}", error);
        return Ok(failure(clear_state));
    }

    let (Some(code), Some(returned_state)) = (query.code.as_deref(), query.state.as_deref())
    else {
        return Ok(failure(clear_state));
    };

    if cookie_value(&headers, OAUTH_STATE_COOKIE) != Some(returned_state) {
        tracing::warn!("External callback state does not match the browser cookie");
        return Ok(failure(clear_state));
    }
    if !state.oauth_states.lock().await.take(returned_state) {
        tracing::warn!("External callback state is unknown or expired");
        return Ok(failure(clear_state));
    }

    let profile = match state.identity.exchange(code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Identity provider exchange failed: {}", e);
            return Ok(failure(clear_state));
        }
    };

    let account = match find_or_create_external(state.accounts.as_ref(), &profile).await {
        Ok(account) => account,
        Err(AuthError::Store(e)) => return Err(e.into()),
        Err(e) => {
            tracing::warn!("External sign-in rejected: {}", e);
            return Ok(failure(clear_state));
        }
    };

    let cookie = establish_session(&state, &headers, &account).await?;
    Ok(redirect_with_cookies("/", vec![cookie, clear_state]))
}
