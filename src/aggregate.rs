//! Feed aggregation and social-graph denormalization.
//!
//! Everything here is a pure function over rows that the storage layer has
//! already fetched: per-tweet like/reply counters, follow flags, and the
//! orderings the pages are rendered in. Nothing touches the database and
//! nothing mutates its inputs.
//!
//! Inputs that break the data-model invariants (duplicate likes, self
//! follows, repeated ids) are rejected with
//! [`ChirpError::PreconditionViolation`]. They can only come from a broken
//! caller, so they are never retried.

use crate::error::{ChirpError, Result};
use crate::model::{
    AnnotatedEdge, AnnotatedTweet, Candidate, FollowEdge, Like, LikedTweet, ProfileSummary,
    RecommendedUser, ReplyRef, Tweet, TweetId, User, UserId, Viewer,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Like and reply counters indexed by tweet id.
///
/// Built once per request so the per-tweet pass is a map lookup instead of a
/// scan over every like and reply.
#[derive(Debug, Default)]
struct TweetCounters {
    replies: HashMap<TweetId, usize>,
    likes: HashMap<TweetId, usize>,
    liked_by_viewer: HashSet<TweetId>,
}

impl TweetCounters {
    fn build(replies: &[ReplyRef], likes: &[Like], viewer_id: UserId) -> Result<Self> {
        let mut counters = Self::default();
        let mut seen = HashSet::with_capacity(likes.len());

        for reply in replies {
            *counters.replies.entry(reply.tweet_id).or_default() += 1;
        }

        for like in likes {
            if !seen.insert((like.user_id, like.tweet_id)) {
                return Err(ChirpError::precondition(format!(
                    "user {} likes tweet {} more than once",
                    like.user_id, like.tweet_id
                )));
            }
            *counters.likes.entry(like.tweet_id).or_default() += 1;
            if like.user_id == viewer_id {
                counters.liked_by_viewer.insert(like.tweet_id);
            }
        }

        Ok(counters)
    }

    fn annotate(&self, tweet: &Tweet) -> AnnotatedTweet {
        AnnotatedTweet {
            tweet: tweet.clone(),
            reply_count: self.replies.get(&tweet.id).copied().unwrap_or(0),
            like_count: self.likes.get(&tweet.id).copied().unwrap_or(0),
            is_liked: self.liked_by_viewer.contains(&tweet.id),
        }
    }
}

fn ensure_unique_tweets(tweets: &[Tweet]) -> Result<()> {
    let mut ids = HashSet::with_capacity(tweets.len());
    for tweet in tweets {
        if !ids.insert(tweet.id) {
            return Err(ChirpError::precondition(format!(
                "tweet {} appears more than once",
                tweet.id
            )));
        }
    }
    Ok(())
}

/// Attach `reply_count`, `like_count` and `is_liked` to every tweet.
///
/// Output order is input order; callers pass tweets newest first.
///
/// # Errors
///
/// Returns [`ChirpError::PreconditionViolation`] if a tweet id repeats or a
/// user likes the same tweet twice.
pub fn annotate_tweets(
    tweets: &[Tweet],
    replies: &[ReplyRef],
    likes: &[Like],
    viewer_id: UserId,
) -> Result<Vec<AnnotatedTweet>> {
    ensure_unique_tweets(tweets)?;
    let counters = TweetCounters::build(replies, likes, viewer_id)?;

    let annotated: Vec<_> = tweets.iter().map(|t| counters.annotate(t)).collect();
    debug!(
        tweets = annotated.len(),
        replies = replies.len(),
        likes = likes.len(),
        "Annotated tweets"
    );
    Ok(annotated)
}

/// Rank recommendation candidates by follower count, most followed first.
///
/// Ties keep their input order. The candidate set is already limited by the
/// query; nothing is truncated here.
///
/// # Errors
///
/// Returns [`ChirpError::PreconditionViolation`] if the viewer is among the
/// candidates or a candidate follows itself.
pub fn rank_recommended_users(
    candidates: &[Candidate],
    viewer: &Viewer,
) -> Result<Vec<RecommendedUser>> {
    let mut ranked = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let id = candidate.user.id;
        if id == viewer.viewer_id {
            return Err(ChirpError::precondition(format!(
                "viewer {id} is listed as a recommendation candidate"
            )));
        }
        if candidate.follower_ids.contains(&id) {
            return Err(ChirpError::precondition(format!("user {id} follows itself")));
        }
        ranked.push(RecommendedUser {
            user: candidate.user.clone(),
            is_followed: viewer.follows(id),
            follower_count: candidate.follower_ids.len(),
        });
    }

    // sort_by is stable
    ranked.sort_by(|a, b| b.follower_count.cmp(&a.follower_count));
    Ok(ranked)
}

/// Flag each entry of a followers/followings list and order it by edge
/// time, most recent first.
///
/// # Errors
///
/// Returns [`ChirpError::PreconditionViolation`] if a user appears twice.
pub fn rank_follow_edges(edges: &[FollowEdge], viewer: &Viewer) -> Result<Vec<AnnotatedEdge>> {
    let mut ids = HashSet::with_capacity(edges.len());
    let mut ranked = Vec::with_capacity(edges.len());

    for edge in edges {
        if !ids.insert(edge.user.id) {
            return Err(ChirpError::precondition(format!(
                "user {} appears twice in one follow list",
                edge.user.id
            )));
        }
        ranked.push(AnnotatedEdge {
            user: edge.user.clone(),
            followed_at: edge.followed_at,
            is_followed: viewer.follows(edge.user.id),
            is_not_current_user: edge.user.id != viewer.viewer_id,
        });
    }

    ranked.sort_by(|a, b| b.followed_at.cmp(&a.followed_at));
    Ok(ranked)
}

/// Annotate the tweets `liker_id` has liked and order them by when the like
/// happened, most recent first.
///
/// `is_liked` is still computed for the viewer. Tweets with no like from
/// `liker_id` get `liked_time: None` and sink to the end.
///
/// # Errors
///
/// Same preconditions as [`annotate_tweets`].
pub fn rank_liked_tweets(
    liked_tweets: &[Tweet],
    likes: &[Like],
    replies: &[ReplyRef],
    viewer_id: UserId,
    liker_id: UserId,
) -> Result<Vec<LikedTweet>> {
    let annotated = annotate_tweets(liked_tweets, replies, likes, viewer_id)?;

    let liked_at: HashMap<TweetId, _> = likes
        .iter()
        .filter(|like| like.user_id == liker_id)
        .map(|like| (like.tweet_id, like.created_at))
        .collect();

    let mut ranked: Vec<LikedTweet> = annotated
        .into_iter()
        .map(|tweet| LikedTweet {
            liked_time: liked_at.get(&tweet.tweet.id).copied(),
            tweet,
        })
        .collect();

    // Option orders None below Some, so reversing puts missing likes last.
    ranked.sort_by(|a, b| b.liked_time.cmp(&a.liked_time));
    Ok(ranked)
}

/// Build the header shown on top of every user page.
#[must_use]
pub fn summarize_profile(
    user: &User,
    follower_ids: &[UserId],
    following_ids: &[UserId],
    viewer: &Viewer,
) -> ProfileSummary {
    ProfileSummary {
        user: user.clone(),
        is_followed: viewer.follows(user.id),
        is_current_user: user.id == viewer.viewer_id,
        follower_count: follower_ids.len(),
        following_count: following_ids.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Role};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap()
    }

    fn create_test_user(id: UserId) -> User {
        User {
            id,
            account: format!("user{id}"),
            name: format!("User {id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            role: Role::User,
            intro: None,
            avatar: None,
            cover: None,
            created_at: base_time(),
        }
    }

    fn create_test_tweet(id: TweetId, minutes: i64) -> Tweet {
        Tweet {
            id,
            author: Author::from(&create_test_user(100)),
            description: format!("tweet {id}"),
            created_at: base_time() + Duration::minutes(minutes),
        }
    }

    fn like(id: i64, user_id: UserId, tweet_id: TweetId, minutes: i64) -> Like {
        Like {
            id,
            user_id,
            tweet_id,
            created_at: base_time() + Duration::minutes(minutes),
        }
    }

    fn candidate(id: UserId, followers: usize) -> Candidate {
        Candidate {
            user: create_test_user(id),
            follower_ids: (1000..).take(followers).collect(),
        }
    }

    fn edge(id: UserId, minutes: i64) -> FollowEdge {
        FollowEdge {
            user: create_test_user(id),
            followed_at: base_time() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_annotate_tweets_scenario() {
        let tweets = vec![create_test_tweet(1, 1), create_test_tweet(2, 2)];
        let replies = vec![ReplyRef { tweet_id: 1 }];
        let likes = vec![like(1, 5, 1, 0), like(2, 9, 1, 0)];

        let annotated = annotate_tweets(&tweets, &replies, &likes, 5).unwrap();

        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].tweet.id, 1);
        assert_eq!(annotated[0].reply_count, 1);
        assert_eq!(annotated[0].like_count, 2);
        assert!(annotated[0].is_liked);
        assert_eq!(annotated[1].tweet.id, 2);
        assert_eq!(annotated[1].reply_count, 0);
        assert_eq!(annotated[1].like_count, 0);
        assert!(!annotated[1].is_liked);
    }

    #[test]
    fn test_annotate_tweets_preserves_order() {
        let tweets = vec![
            create_test_tweet(3, 30),
            create_test_tweet(1, 10),
            create_test_tweet(2, 20),
        ];
        let annotated = annotate_tweets(&tweets, &[], &[], 7).unwrap();
        let ids: Vec<_> = annotated.iter().map(|t| t.tweet.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_annotate_tweets_counts_match_filters() {
        let tweets: Vec<_> = (1..=4).map(|id| create_test_tweet(id, id)).collect();
        let likes = vec![
            like(1, 1, 1, 0),
            like(2, 2, 1, 0),
            like(3, 3, 2, 0),
            like(4, 1, 4, 0),
            like(5, 9, 99, 0),
        ];
        let replies = vec![
            ReplyRef { tweet_id: 2 },
            ReplyRef { tweet_id: 2 },
            ReplyRef { tweet_id: 4 },
        ];

        let annotated = annotate_tweets(&tweets, &replies, &likes, 1).unwrap();

        for a in &annotated {
            let expected_likes = likes.iter().filter(|l| l.tweet_id == a.tweet.id).count();
            let expected_replies = replies.iter().filter(|r| r.tweet_id == a.tweet.id).count();
            let expected_liked = likes
                .iter()
                .any(|l| l.user_id == 1 && l.tweet_id == a.tweet.id);
            assert_eq!(a.like_count, expected_likes);
            assert_eq!(a.reply_count, expected_replies);
            assert_eq!(a.is_liked, expected_liked);
        }
    }

    #[test]
    fn test_annotate_tweets_is_idempotent() {
        let tweets = vec![create_test_tweet(1, 1), create_test_tweet(2, 2)];
        let likes = vec![like(1, 5, 2, 0)];
        let replies = vec![ReplyRef { tweet_id: 2 }];

        let first = annotate_tweets(&tweets, &replies, &likes, 5).unwrap();
        let raw: Vec<Tweet> = first.iter().map(|a| a.tweet.clone()).collect();
        let second = annotate_tweets(&raw, &replies, &likes, 5).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_annotate_tweets_rejects_duplicate_like() {
        let tweets = vec![create_test_tweet(1, 1)];
        let likes = vec![like(1, 5, 1, 0), like(2, 5, 1, 1)];
        let err = annotate_tweets(&tweets, &[], &likes, 5).unwrap_err();
        assert!(matches!(err, ChirpError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_annotate_tweets_rejects_duplicate_tweet() {
        let tweets = vec![create_test_tweet(1, 1), create_test_tweet(1, 2)];
        let err = annotate_tweets(&tweets, &[], &[], 5).unwrap_err();
        assert!(matches!(err, ChirpError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_rank_recommended_users_scenario() {
        let candidates = vec![candidate(1, 3), candidate(2, 5), candidate(3, 5)];
        let viewer = Viewer::new(50, []);

        let ranked = rank_recommended_users(&candidates, &viewer).unwrap();

        let ids: Vec<_> = ranked.iter().map(|u| u.user.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(ranked.iter().all(|u| !u.is_followed));
        assert_eq!(ranked[0].follower_count, 5);
        assert_eq!(ranked[2].follower_count, 3);
    }

    #[test]
    fn test_rank_recommended_users_is_sorted_and_stable() {
        let counts = [2, 0, 4, 2, 4, 1, 0];
        let candidates: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| candidate(i as UserId + 1, n))
            .collect();
        let viewer = Viewer::new(99, [3, 6]);

        let ranked = rank_recommended_users(&candidates, &viewer).unwrap();

        assert!(
            ranked
                .windows(2)
                .all(|w| w[0].follower_count >= w[1].follower_count)
        );
        let ids: Vec<_> = ranked.iter().map(|u| u.user.id).collect();
        assert_eq!(ids, vec![3, 5, 1, 4, 6, 2, 7]);
        for u in &ranked {
            assert_eq!(u.is_followed, u.user.id == 3 || u.user.id == 6);
        }
    }

    #[test]
    fn test_rank_recommended_users_rejects_viewer() {
        let viewer = Viewer::new(2, []);
        let err = rank_recommended_users(&[candidate(2, 1)], &viewer).unwrap_err();
        assert!(matches!(err, ChirpError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_rank_recommended_users_rejects_self_follow() {
        let viewer = Viewer::new(9, []);
        let c = Candidate {
            user: create_test_user(4),
            follower_ids: vec![1, 4],
        };
        let err = rank_recommended_users(&[c], &viewer).unwrap_err();
        assert!(matches!(err, ChirpError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_rank_follow_edges_orders_by_edge_time() {
        let edges = vec![edge(1, 5), edge(2, 30), edge(3, 10), edge(7, 20)];
        let viewer = Viewer::new(7, [3]);

        let ranked = rank_follow_edges(&edges, &viewer).unwrap();

        let ids: Vec<_> = ranked.iter().map(|e| e.user.id).collect();
        assert_eq!(ids, vec![2, 7, 3, 1]);
        assert!(ranked.windows(2).all(|w| w[0].followed_at >= w[1].followed_at));

        let viewer_entry = ranked.iter().find(|e| e.user.id == 7).unwrap();
        assert!(!viewer_entry.is_not_current_user);
        let followed = ranked.iter().find(|e| e.user.id == 3).unwrap();
        assert!(followed.is_followed);
        assert!(followed.is_not_current_user);
        assert!(!ranked.iter().find(|e| e.user.id == 1).unwrap().is_followed);
    }

    #[test]
    fn test_rank_follow_edges_rejects_duplicates() {
        let viewer = Viewer::new(1, []);
        let err = rank_follow_edges(&[edge(2, 1), edge(2, 2)], &viewer).unwrap_err();
        assert!(matches!(err, ChirpError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_rank_liked_tweets_orders_by_like_time() {
        // Tweet 1 is newest but was liked first.
        let tweets = vec![create_test_tweet(1, 100), create_test_tweet(2, 50)];
        let likes = vec![like(1, 5, 1, 110), like(2, 5, 2, 120), like(3, 8, 1, 130)];
        let replies = vec![ReplyRef { tweet_id: 1 }];

        let ranked = rank_liked_tweets(&tweets, &likes, &replies, 8, 5).unwrap();

        assert_eq!(ranked[0].tweet.tweet.id, 2);
        assert_eq!(ranked[0].liked_time, Some(base_time() + Duration::minutes(120)));
        assert!(!ranked[0].tweet.is_liked);
        assert_eq!(ranked[1].tweet.tweet.id, 1);
        assert_eq!(ranked[1].tweet.like_count, 2);
        assert_eq!(ranked[1].tweet.reply_count, 1);
        assert!(ranked[1].tweet.is_liked);
    }

    #[test]
    fn test_rank_liked_tweets_missing_like_sinks() {
        let tweets = vec![create_test_tweet(1, 0), create_test_tweet(2, 0)];
        let likes = vec![like(1, 5, 2, 10)];

        let ranked = rank_liked_tweets(&tweets, &likes, &[], 5, 5).unwrap();

        assert_eq!(ranked[0].tweet.tweet.id, 2);
        assert_eq!(ranked[1].tweet.tweet.id, 1);
        assert_eq!(ranked[1].liked_time, None);
    }

    #[test]
    fn test_summarize_profile_counts() {
        let user = create_test_user(4);
        let viewer = Viewer::new(1, [4]);

        let summary = summarize_profile(&user, &[1, 2, 3], &[9], &viewer);

        assert_eq!(summary.follower_count, 3);
        assert_eq!(summary.following_count, 1);
        assert!(summary.is_followed);
        assert!(!summary.is_current_user);
    }
}
