//! Story fetching for the import workflow
//!
//! Fetch failures split into three classes the importer treats differently:
//! a timeout is retryable by the user, a parse failure means the source
//! needs manual attention, and any other transport error is reported as-is.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::notify::ExternalAuthor;
use crate::workflow::ChapterContent;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The source did not respond within the configured timeout
    #[error("Timed out fetching {0}; try again later")]
    Timeout(String),
    /// The source responded but its content could not be understood
    #[error("Could not parse a story from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("Fetching {url} failed: {reason}")]
    Http { url: String, reason: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// A story parsed out of an external source
#[derive(Debug, Clone, Default)]
pub struct ParsedStory {
    pub title: String,
    pub summary: Option<String>,
    pub chapters: Vec<ChapterContent>,
    pub external_author: Option<ExternalAuthor>,
}

#[async_trait]
pub trait StoryFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedStory, FetchError>;
}

/// Fetcher that pulls the source over HTTP with a hard per-item timeout
pub struct HttpStoryFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStoryFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl StoryFetcher for HttpStoryFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedStory, FetchError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout(url.to_string()))?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::Http {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        parse_story(url, &body)
    }
}

/// Minimal structural parse: the first non-empty line titles the story,
/// the rest is one chapter
fn parse_story(url: &str, body: &str) -> Result<ParsedStory, FetchError> {
    let mut lines = body.lines().skip_while(|l| l.trim().is_empty());
    let title = match lines.next() {
        Some(line) => line.trim().to_string(),
        None => {
            return Err(FetchError::Parse {
                url: url.to_string(),
                reason: "the source was empty".to_string(),
            })
        }
    };

    let content: String = lines.collect::<Vec<_>>().join("\n");
    if content.trim().is_empty() {
        return Err(FetchError::Parse {
            url: url.to_string(),
            reason: "no story content after the title".to_string(),
        });
    }

    Ok(ParsedStory {
        title,
        summary: None,
        chapters: vec![ChapterContent {
            title: None,
            content,
        }],
        external_author: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonempty_line_becomes_the_title() {
        let story = parse_story("http://example.com/1", "\n\n  My Story  \nOnce upon a time.")
            .unwrap();
        assert_eq!(story.title, "My Story");
        assert_eq!(story.chapters.len(), 1);
        assert_eq!(story.chapters[0].content, "Once upon a time.");
    }

    #[test]
    fn empty_or_title_only_sources_fail_to_parse() {
        assert!(matches!(
            parse_story("http://example.com/2", "   \n "),
            Err(FetchError::Parse { .. })
        ));
        assert!(matches!(
            parse_story("http://example.com/3", "Just A Title\n\n"),
            Err(FetchError::Parse { .. })
        ));
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(FetchError::Timeout("u".to_string()).is_retryable());
        assert!(!FetchError::Parse {
            url: "u".to_string(),
            reason: "r".to_string()
        }
        .is_retryable());
    }
}
