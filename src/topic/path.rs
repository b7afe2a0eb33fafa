// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Topic path parsing.
//!
//! Topics are slash-delimited, MQTT style: `/living/light/set` and
//! `living/light/set` name the same position in the tree.
//!
//! Two segment tokens are reserved for queries and may never be stored:
//! - `%` matches exactly one segment
//! - `#` matches the remainder of the path down to a leaf

use std::fmt;
use thiserror::Error;

/// Matches exactly one segment in a query pattern.
pub const SINGLE_LEVEL_WILDCARD: &str = "%";

/// Matches any remaining depth in a query pattern.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Separator between topic segments.
pub const SEPARATOR: char = '/';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,
    #[error("topic '{topic}' has an empty segment at position {position}")]
    EmptySegment { topic: String, position: usize },
    #[error("topic '{topic}' uses reserved wildcard '{segment}' as a literal segment")]
    ReservedSegment { topic: String, segment: String },
}

/// An ordered sequence of topic segments.
///
/// # Example
///
/// ```
/// use topic_cache::TopicPath;
///
/// let a = TopicPath::parse("/a/b");
/// let b = TopicPath::parse("a/b");
/// assert_eq!(a, b);
/// assert_eq!(a.segments(), ["a", "b"]);
/// assert_eq!(a.to_string(), "a/b");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TopicPath {
    segments: Vec<String>,
}

impl TopicPath {
    /// Split on `/`, dropping the empty segment produced by a leading slash.
    ///
    /// Parsing never fails. Use [`TopicPath::parse_for_storage`] when the
    /// path is about to become part of the tree.
    pub fn parse(topic: &str) -> Self {
        let mut segments: Vec<String> = topic.split(SEPARATOR).map(str::to_owned).collect();
        if segments.first().is_some_and(|s| s.is_empty()) {
            segments.remove(0);
        }
        Self { segments }
    }

    /// Parse and validate a topic that will be stored.
    ///
    /// Rejects empty topics, empty segments (`a//b`, `a/b/`) and the query
    /// wildcards `%` / `#` used as literal segments.
    pub fn parse_for_storage(topic: &str) -> Result<Self, TopicError> {
        let path = Self::parse(topic);
        path.validate_for_storage(topic)?;
        Ok(path)
    }

    fn validate_for_storage(&self, raw: &str) -> Result<(), TopicError> {
        if self.segments.is_empty() || (self.segments.len() == 1 && self.segments[0].is_empty()) {
            return Err(TopicError::Empty);
        }
        for (position, segment) in self.segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(TopicError::EmptySegment {
                    topic: raw.to_string(),
                    position,
                });
            }
            if is_wildcard(segment) {
                return Err(TopicError::ReservedSegment {
                    topic: raw.to_string(),
                    segment: segment.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if any segment is a query wildcard.
    pub fn is_pattern(&self) -> bool {
        self.segments.iter().any(|s| is_wildcard(s))
    }

    /// Path with one more segment appended.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for TopicPath {
    fn from(topic: &str) -> Self {
        Self::parse(topic)
    }
}

/// Join a parent topic string and a child segment without a leading slash.
pub(crate) fn join_topic(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        let mut topic = String::with_capacity(parent.len() + 1 + segment.len());
        topic.push_str(parent);
        topic.push(SEPARATOR);
        topic.push_str(segment);
        topic
    }
}

#[inline]
pub(crate) fn is_wildcard(segment: &str) -> bool {
    segment == SINGLE_LEVEL_WILDCARD || segment == MULTI_LEVEL_WILDCARD
}
