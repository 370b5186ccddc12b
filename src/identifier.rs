//! Blog identifier extraction from user-entered URLs.

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::types::{BlogId, FeedTarget};

/// Derive the blog identifier from a URL such as `https://myblog.blogspot.com/2020/01/post.html`
///
/// The identifier is the text between the last `//` before the domain marker
/// (or the start of the input) and the marker itself.
///
/// # Errors
/// Returns [`Error::InvalidUrl`] if the marker is missing or the extracted
/// identifier is empty or contains a path separator.
pub fn extract_blog_id(input: &str, config: &FeedConfig) -> Result<BlogId> {
    let input = input.trim();
    let marker = config.domain_marker();

    let Some(marker_pos) = input.find(&marker) else {
        return Err(invalid_url(input, config));
    };

    let head = &input[..marker_pos];
    let start = head.rfind("//").map(|pos| pos + 2).unwrap_or(0);

    BlogId::new(&head[start..]).map_err(|_| invalid_url(input, config))
}

/// Build the posts feed base URL for a blog (no query parameters)
pub fn feed_url(blog_id: &BlogId, config: &FeedConfig) -> String {
    format!(
        "{}://{}.{}/feeds/posts/default",
        config.scheme, blog_id, config.domain
    )
}

/// Extract the identifier and resolve the feed URL in one step
pub fn resolve_target(input: &str, config: &FeedConfig) -> Result<FeedTarget> {
    let blog_id = extract_blog_id(input, config)?;
    let feed_url = feed_url(&blog_id, config);
    Ok(FeedTarget { blog_id, feed_url })
}

fn invalid_url(input: &str, config: &FeedConfig) -> Error {
    Error::InvalidUrl {
        message: format!(
            "Please enter a valid blog URL, for example https://yourblog.{}",
            config.domain
        ),
        input: input.to_string(),
    }
}
