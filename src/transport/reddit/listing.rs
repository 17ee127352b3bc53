//! Reddit API response shapes
//!
//! Only the fields the bot reads are modelled. Listings are requested with
//! `raw_json=1` so HTML bodies arrive unescaped.

use crate::bot::item::DiscussionItem;
use serde::Deserialize;
use std::time::Duration;

/// `{"kind": "Listing", "data": {...}}`
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
    #[serde(default)]
    pub after: Option<String>,
}

/// A listing child. `data` is decoded once `kind` is known.
#[derive(Debug, Deserialize)]
pub struct Thing {
    pub kind: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CommentData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionData {
    pub id: String,
    pub name: String,
    /// Absent or null for link posts
    #[serde(default)]
    pub selftext_html: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
}

impl Thing {
    /// Fullname (`t1_...`/`t3_...`) of a comment or submission
    pub fn fullname(&self) -> Option<&str> {
        match self.kind.as_str() {
            "t1" | "t3" => self.data.get("name")?.as_str(),
            _ => None,
        }
    }

    /// Decode a comment or submission; other kinds yield `None`
    pub fn into_item(self) -> Result<Option<DiscussionItem>, serde_json::Error> {
        let (item, subreddit) = match self.kind.as_str() {
            "t1" => {
                let c: CommentData = serde_json::from_value(self.data)?;
                (
                    DiscussionItem::comment(c.id, c.body_html.unwrap_or_default()),
                    c.subreddit,
                )
            }
            "t3" => {
                let s: SubmissionData = serde_json::from_value(self.data)?;
                (
                    DiscussionItem::submission(s.id, s.selftext_html.unwrap_or_default(), s.url),
                    s.subreddit,
                )
            }
            _ => return Ok(None),
        };
        Ok(Some(match subreddit {
            Some(sub) => item.with_subreddit(sub),
            None => item,
        }))
    }
}

/// `POST /api/v1/access_token` response; errors come back with status 200
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/v1/me`
#[derive(Debug, Deserialize)]
pub struct Account {
    pub name: String,
}

/// `POST /api/comment` with `api_type=json`
#[derive(Debug, Deserialize)]
pub struct CommentResponse {
    pub json: CommentResponseBody,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponseBody {
    /// Each error is `[code, message, field]`
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub data: Option<CommentResponseData>,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponseData {
    #[serde(default)]
    pub things: Vec<PostedThing>,
}

#[derive(Debug, Deserialize)]
pub struct PostedThing {
    pub data: PostedThingData,
}

#[derive(Debug, Deserialize)]
pub struct PostedThingData {
    pub id: String,
    pub name: String,
}

/// One entry of a comment response's `errors` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl CommentResponseBody {
    pub fn api_errors(&self) -> Vec<ApiError> {
        self.errors
            .iter()
            .map(|entry| {
                let field = |i: usize| {
                    entry
                        .get(i)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                ApiError {
                    code: field(0),
                    message: field(1),
                }
            })
            .collect()
    }
}

/// Wait requested by a RATELIMIT message such as
/// "you are doing that too much. try again in 9 minutes."
pub fn ratelimit_wait(message: &str) -> Option<Duration> {
    let rest = message.split("try again in ").nth(1)?;
    let mut words = rest.split_whitespace();
    let amount: u64 = words.next()?.parse().ok()?;
    let unit = words.next()?;
    let secs = if unit.starts_with("minute") {
        amount.saturating_mul(60)
    } else if unit.starts_with("second") {
        amount
    } else if unit.starts_with("millisecond") {
        return Some(Duration::from_millis(amount));
    } else {
        return None;
    };
    Some(Duration::from_secs(secs))
}
