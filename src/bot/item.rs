//! Items the bot reads and the replies it posts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of discussion item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Comment,
    Submission,
}

impl ItemKind {
    /// Reddit "thing" type prefix for this kind
    pub fn fullname_prefix(&self) -> &'static str {
        match self {
            ItemKind::Comment => "t1",
            ItemKind::Submission => "t3",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Comment => write!(f, "comment"),
            ItemKind::Submission => write!(f, "submission"),
        }
    }
}

/// A comment or submission received from an item source.
///
/// Immutable once received; the dispatcher consumes each one exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionItem {
    /// Platform id without type prefix, e.g. `e4x2k9q`
    pub id: String,
    pub kind: ItemKind,
    /// Rendered HTML of the body (comment body or self-post text)
    pub rendered_content: String,
    /// Link target of a link submission
    pub raw_content_url: Option<String>,
    /// Subreddit the item was posted in, for log context
    pub subreddit: Option<String>,
}

impl DiscussionItem {
    pub fn comment<I: Into<String>, H: Into<String>>(id: I, rendered_content: H) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Comment,
            rendered_content: rendered_content.into(),
            raw_content_url: None,
            subreddit: None,
        }
    }

    pub fn submission<I: Into<String>, H: Into<String>>(
        id: I,
        rendered_content: H,
        raw_content_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Submission,
            rendered_content: rendered_content.into(),
            raw_content_url,
            subreddit: None,
        }
    }

    pub fn with_subreddit<S: Into<String>>(mut self, subreddit: S) -> Self {
        self.subreddit = Some(subreddit.into());
        self
    }

    /// Typed id used as the reply target, e.g. `t1_e4x2k9q`
    pub fn fullname(&self) -> String {
        format!("{}_{}", self.kind.fullname_prefix(), self.id)
    }
}

/// A reply posted by the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub fullname: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname_prefixes() {
        let comment = DiscussionItem::comment("abc", "<p>hi</p>");
        assert_eq!(comment.fullname(), "t1_abc");

        let submission = DiscussionItem::submission("xyz", "", None);
        assert_eq!(submission.fullname(), "t3_xyz");
    }

    #[test]
    fn test_with_subreddit() {
        let item = DiscussionItem::comment("abc", "").with_subreddit("datascience");
        assert_eq!(item.subreddit.as_deref(), Some("datascience"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ItemKind::Comment.to_string(), "comment");
        assert_eq!(ItemKind::Submission.to_string(), "submission");
    }
}
