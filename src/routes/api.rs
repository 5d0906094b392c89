use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{NewPost, Post};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PostInput {
    pub title: String,
    pub body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub message: &'static str,
    pub created_post: Post,
}

/// API failures are JSON `{ "error": ... }` bodies with status 400. Store
/// details stay in the log.
pub struct ApiError(AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self.0 {
            AppError::Store(e) => {
                tracing::error!("Post API store error: {}", e);
                "Posts are temporarily unavailable".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Post API internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

/// GET /api/posts
async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.posts.list().await?))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        AppError::BadRequest(format!("Expected a JSON body with title and body: {rejection}"))
    })?;

    let post = NewPost::new(&input.title, &input.body)?;
    let created = state.posts.create(post).await?;
    tracing::info!(post_id = %created.id, slug = %created.slug, "Post created via API");

    Ok(Json(CreatedResponse {
        message: "Post created",
        created_post: created,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/posts", get(list_posts).post(create_post))
}
