use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::models::Post;
use crate::db::StoreError;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::state::AppState;

const EXCERPT_CHARS: usize = 100;

const ABOUT_CONTENT: &str = "Hac habitasse platea dictumst vestibulum rhoncus est pellentesque. \
Dictumst vestibulum rhoncus est pellentesque elit ullamcorper. Non diam phasellus vestibulum \
lorem sed. Platea dictumst quisque sagittis purus sit. Egestas sed sed risus pretium quam \
vulputate dignissim suspendisse. Mauris in aliquam sem fringilla. Semper risus in hendrerit \
gravida rutrum quisque non tellus orci.";

const CONTACT_CONTENT: &str = "Scelerisque eleifend donec pretium vulputate sapien. Rhoncus urna \
neque viverra justo nec ultrices. Arcu dui vivamus arcu felis bibendum. Consectetur adipiscing \
elit duis tristique. Risus viverra adipiscing at in tellus integer feugiat. Sapien nec sagittis \
aliquam malesuada bibendum arcu vitae.";

/// Shown on the home page until the first post is written.
pub fn default_posts() -> Vec<Post> {
    vec![Post {
        id: "default-lorem-ipsum".to_string(),
        title: "Lorem Ipsum".to_string(),
        body: "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nullam id dolor id \
               nibh ultricies vehicula ut id elit. Nullam id dolor id nibh ultricies vehicula \
               ut id elit."
            .to_string(),
        slug: "lorem-ipsum".to_string(),
        created_at: String::new(),
    }]
}

/// Stored posts, or the built-in ones while the store is empty.
pub async fn visible_posts(state: &AppState) -> Result<Vec<Post>, StoreError> {
    let posts = state.posts.list().await?;
    if posts.is_empty() {
        Ok(default_posts())
    } else {
        Ok(posts)
    }
}

pub struct PostSummary {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        let mut excerpt: String = post.body.chars().take(EXCERPT_CHARS).collect();
        if post.body.chars().count() > EXCERPT_CHARS {
            excerpt.push_str("...");
        }
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt,
        }
    }
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub viewer: Option<String>,
    pub posts: Vec<PostSummary>,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub viewer: Option<String>,
    pub content: &'static str,
}

#[derive(Template)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub viewer: Option<String>,
    pub content: &'static str,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(State(state): State<AppState>, maybe_user: MaybeUser) -> AppResult<Response> {
    let posts = visible_posts(&state).await?;

    Ok(Html(HomeTemplate {
        viewer: maybe_user.viewer(),
        posts: posts.iter().map(PostSummary::from).collect(),
    })
    .into_response())
}

pub async fn about(maybe_user: MaybeUser) -> Html<AboutTemplate> {
    Html(AboutTemplate {
        viewer: maybe_user.viewer(),
        content: ABOUT_CONTENT,
    })
}

pub async fn contact(maybe_user: MaybeUser) -> Html<ContactTemplate> {
    Html(ContactTemplate {
        viewer: maybe_user.viewer(),
        content: CONTACT_CONTENT,
    })
}
