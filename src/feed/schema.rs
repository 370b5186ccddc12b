//! Serde model of the Blogger JSON feed (`?alt=json`).
//!
//! Blogger wraps every scalar in an object whose text lives under `$t`, e.g.
//! `"title": {"type": "text", "$t": "Hello"}`.

use serde::Deserialize;

use crate::types::{FeedPage, PostEntry};

#[derive(Debug, Deserialize)]
pub(crate) struct FeedDocument {
    pub(crate) feed: Feed,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Feed {
    #[serde(default)]
    pub(crate) entry: Option<Vec<RawEntry>>,
    #[serde(rename = "openSearch$totalResults", default)]
    pub(crate) total_results: Option<TextNode>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TextNode {
    #[serde(rename = "$t", default)]
    pub(crate) text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    #[serde(default)]
    title: Option<TextNode>,
    #[serde(default)]
    published: Option<TextNode>,
    #[serde(default)]
    updated: Option<TextNode>,
    #[serde(default)]
    author: Vec<RawAuthor>,
    #[serde(default)]
    content: Option<TextNode>,
    // summary-only feeds carry the body here instead of in `content`
    #[serde(default)]
    summary: Option<TextNode>,
    #[serde(default)]
    category: Vec<RawCategory>,
    #[serde(default)]
    link: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default)]
    term: String,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    href: String,
}

impl From<RawEntry> for PostEntry {
    fn from(raw: RawEntry) -> Self {
        let text = |node: Option<TextNode>| node.map(|n| n.text).unwrap_or_default();

        let author = raw
            .author
            .into_iter()
            .next()
            .and_then(|a| a.name)
            .map(|n| n.text)
            .filter(|name| !name.is_empty());

        let permalink = raw
            .link
            .into_iter()
            .find(|link| link.rel == "alternate")
            .map(|link| link.href)
            .filter(|href| !href.is_empty());

        let categories = raw
            .category
            .into_iter()
            .map(|c| c.term)
            .filter(|term| !term.is_empty())
            .collect();

        PostEntry {
            title: text(raw.title),
            published: text(raw.published),
            updated: text(raw.updated),
            author,
            content: raw.content.or(raw.summary).map(|n| n.text),
            categories,
            permalink,
        }
    }
}

impl From<FeedDocument> for FeedPage {
    fn from(doc: FeedDocument) -> Self {
        let total_results = doc
            .feed
            .total_results
            .and_then(|node| node.text.trim().parse::<usize>().ok());

        FeedPage {
            entries: doc
                .feed
                .entry
                .unwrap_or_default()
                .into_iter()
                .map(PostEntry::from)
                .collect(),
            total_results,
        }
    }
}
