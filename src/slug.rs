//! Post addressing: titles map to kebab-case slugs, slugs map back to posts.

use crate::db::models::Post;

/// Slug base used when a title contains no alphanumeric characters at all.
pub const FALLBACK_SLUG: &str = "post";

/// Lowercase the input and collapse every run of non-alphanumeric characters
/// into a single hyphen, with no hyphen at either end.
pub fn to_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            // Some lowercase mappings add combining marks; drop them so the
            // output stays a fixed point.
            slug.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Joins a base slug to its collision counter. `to_slug` never emits two
/// hyphens in a row, so a suffixed slug cannot equal any title's slug.
pub const SUFFIX_SEPARATOR: &str = "--";

/// Candidate slugs for a new post in the order they should be tried:
/// `base`, `base--2`, `base--3`, ... A title with no alphanumerics has no
/// bare slug and starts at `post--1`.
pub fn candidates(title: &str) -> impl Iterator<Item = String> {
    let base = to_slug(title);
    let (bare, stem, first_n) = if base.is_empty() {
        (None, FALLBACK_SLUG.to_string(), 1u64)
    } else {
        (Some(base.clone()), base, 2u64)
    };
    bare.into_iter()
        .chain((first_n..).map(move |n| format!("{stem}{SUFFIX_SEPARATOR}{n}")))
}

/// Find the post addressed by `requested`.
///
/// An exact stored slug wins, which is how suffixed slugs are reached.
/// Otherwise the request is normalized, so `Lorem%20Ipsum` and `LOREM-ipsum`
/// reach the first post (store order) whose title slugs to the same value.
pub fn resolve<'a>(requested: &str, posts: &'a [Post]) -> Option<&'a Post> {
    let exact = requested.trim().to_lowercase();
    if let Some(post) = posts.iter().find(|post| post.slug == exact) {
        return Some(post);
    }

    let wanted = to_slug(requested);
    if wanted.is_empty() {
        return None;
    }
    posts.iter().find(|post| to_slug(&post.title) == wanted)
}
