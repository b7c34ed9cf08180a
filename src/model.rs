//! Data models for chirp.
//!
//! Entity records mirror the rows kept in the identity store. View models
//! (`AnnotatedTweet`, `RecommendedUser` and friends) are what the aggregation
//! layer derives from them for the pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Primary key of a user row.
pub type UserId = i64;

/// Primary key of a tweet row.
pub type TweetId = i64;

/// Account role. Only `User` accounts take part in the social graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse a role stored in the database. Unknown values are treated as
    /// plain users.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub account: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub intro: Option<String>,
    pub avatar: Option<String>,
    pub cover: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public fields of a tweet or reply author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub account: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            account: user.account.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// A tweet together with its author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tweet {
    pub id: TweetId,
    pub author: Author,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A reply to a tweet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub id: i64,
    pub tweet_id: TweetId,
    pub author: Author,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    /// Account of the replied tweet's author, when the query joined it.
    pub replied_to: Option<String>,
}

/// The only reply column the feed counts need
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyRef {
    pub tweet_id: TweetId,
}

/// A like on a tweet. At most one per (user, tweet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Like {
    pub id: i64,
    pub user_id: UserId,
    pub tweet_id: TweetId,
    pub created_at: DateTime<Utc>,
}

/// One entry of a followers/followings list: the user on the other end of
/// the edge plus the time the edge was created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowEdge {
    pub user: User,
    pub followed_at: DateTime<Utc>,
}

/// A recommendation candidate and the ids of everyone following it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user: User,
    pub follower_ids: Vec<UserId>,
}

/// Per-request view of who is asking.
///
/// Built once per request and passed explicitly into every aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Viewer {
    pub viewer_id: UserId,
    pub following_ids: HashSet<UserId>,
}

impl Viewer {
    #[must_use]
    pub fn new(viewer_id: UserId, following_ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            viewer_id,
            following_ids: following_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn follows(&self, user_id: UserId) -> bool {
        self.following_ids.contains(&user_id)
    }
}

// =============================================================================
// View models
// =============================================================================

/// A tweet with its denormalized counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotatedTweet {
    #[serde(flatten)]
    pub tweet: Tweet,
    pub reply_count: usize,
    pub like_count: usize,
    pub is_liked: bool,
}

/// A tweet on a likes page, with the time it was liked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikedTweet {
    #[serde(flatten)]
    pub tweet: AnnotatedTweet,
    pub liked_time: Option<DateTime<Utc>>,
}

/// An entry of the "who to follow" sidebar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendedUser {
    #[serde(flatten)]
    pub user: User,
    pub is_followed: bool,
    pub follower_count: usize,
}

/// An entry of a followers/followings page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotatedEdge {
    #[serde(flatten)]
    pub user: User,
    pub followed_at: DateTime<Utc>,
    pub is_followed: bool,
    pub is_not_current_user: bool,
}

/// Header of a user page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    #[serde(flatten)]
    pub user: User,
    pub is_followed: bool,
    pub is_current_user: bool,
    pub follower_count: usize,
    pub following_count: usize,
}

/// Row counts of every table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub users_count: i64,
    pub tweets_count: i64,
    pub replies_count: i64,
    pub likes_count: i64,
    pub followships_count: i64,
    pub first_tweet_date: Option<DateTime<Utc>>,
    pub last_tweet_date: Option<DateTime<Utc>>,
}
