use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::NewPost;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::{visible_posts, Html};
use crate::slug;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/compose.html")]
pub struct ComposeTemplate {
    pub viewer: Option<String>,
    pub error: Option<String>,
    pub title: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer: Option<String>,
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct ComposeForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// GET /compose
async fn compose_page(user: CurrentUser) -> Html<ComposeTemplate> {
    Html(ComposeTemplate {
        viewer: Some(user.name().to_string()),
        error: None,
        title: String::new(),
        body: String::new(),
    })
}

/// POST /compose: store the post and go home, or show the form again
async fn compose(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ComposeForm>,
) -> AppResult<Response> {
    let post = match NewPost::new(&form.title, &form.body) {
        Ok(post) => post,
        Err(e) => {
            let page = Html(ComposeTemplate {
                viewer: Some(user.name().to_string()),
                error: Some(e.to_string()),
                title: form.title,
                body: form.body,
            });
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
    };

    let created = state.posts.create(post).await?;
    tracing::info!(post_id = %created.id, slug = %created.slug, account_id = %user.id, "Post created");

    Ok(Redirect::to("/").into_response())
}

/// GET /posts/{slug}
async fn show_post(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(requested): Path<String>,
) -> AppResult<Response> {
    let posts = visible_posts(&state).await?;
    let post = slug::resolve(&requested, &posts).ok_or(AppError::NotFound)?;

    Ok(Html(PostTemplate {
        viewer: maybe_user.viewer(),
        title: post.title.clone(),
        body: post.body.clone(),
    })
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/compose", get(compose_page).post(compose))
        .route("/posts/{slug}", get(show_post))
}
