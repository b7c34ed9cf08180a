//! Text and JSON output of pages.
//!
//! Text renderers return `String`s so the binary decides where they go.

use crate::app::{
    FollowList, FollowPage, HomePage, TweetDetail, TweetPage, UserLikesPage, UserRepliesPage,
    UserTweetsPage,
};
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::model::{
    AnnotatedEdge, AnnotatedTweet, ProfileSummary, RecommendedUser, Reply, Stats, User,
};
use crate::{CONTENT_DIVIDER_WIDTH, format_count, format_relative_date, truncate};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;

const WRAP_WIDTH: usize = 76;
const INDENT: &str = "   ";

/// Serialize a page for `--format json` / `json-pretty`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn divider() -> String {
    "─".repeat(CONTENT_DIVIDER_WIDTH).dimmed().to_string()
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title.bold().cyan());
    let _ = writeln!(out, "{}", divider());
}

fn wrapped(out: &mut String, text: &str) {
    for line in textwrap::wrap(text, WRAP_WIDTH) {
        let _ = writeln!(out, "{INDENT}{line}");
    }
}

/// One tweet with its counters.
#[must_use]
pub fn tweet_card(tweet: &AnnotatedTweet) -> String {
    let mut out = String::new();
    let t = &tweet.tweet;
    let _ = writeln!(
        out,
        "{} {} {} {}",
        t.author.name.bold(),
        format!("@{}", t.author.account).green(),
        format!("· {}", format_relative_date(t.created_at)).dimmed(),
        format!("#{}", t.id).dimmed()
    );
    wrapped(&mut out, &t.description);

    let heart = if tweet.is_liked {
        format!("♥ {}", format_count(tweet.like_count)).red().to_string()
    } else {
        format!("♡ {}", format_count(tweet.like_count))
    };
    let _ = writeln!(
        out,
        "{INDENT}{}  {heart}",
        format!("↩ {}", format_count(tweet.reply_count)).cyan()
    );
    out
}

/// One reply, optionally naming the tweet author it answers.
#[must_use]
pub fn reply_card(reply: &Reply) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {}",
        reply.author.name.bold(),
        format!("@{}", reply.author.account).green(),
        format!("· {}", format_relative_date(reply.created_at)).dimmed()
    );
    if let Some(to) = &reply.replied_to {
        let _ = write!(out, " {}", format!("replying to @{to} on #{}", reply.tweet_id).dimmed());
    }
    out.push('\n');
    wrapped(&mut out, &reply.comment);
    out
}

/// "Name @account", cut to fit a list column.
fn handle(user: &User) -> String {
    truncate(&format!("{} @{}", user.name, user.account), 24)
}

fn follow_badge(is_followed: bool) -> String {
    if is_followed {
        "[following]".green().to_string()
    } else {
        "[follow]".dimmed().to_string()
    }
}

/// The "who to follow" sidebar.
#[must_use]
pub fn sidebar(users: &[RecommendedUser]) -> String {
    let mut out = String::new();
    if users.is_empty() {
        return out;
    }
    heading(&mut out, "Who to follow");
    for entry in users {
        let _ = writeln!(
            out,
            "  {:<24} {:>6} followers  {}  {}",
            handle(&entry.user),
            format_count(entry.follower_count),
            follow_badge(entry.is_followed),
            format!("id {}", entry.user.id).dimmed()
        );
    }
    out
}

/// A user's page header.
#[must_use]
pub fn profile_header(profile: &ProfileSummary, tweet_count: i64) -> String {
    let mut out = String::new();
    let user = &profile.user;
    let _ = write!(
        out,
        "{} {}",
        user.name.bold().cyan(),
        format!("@{}", user.account).green()
    );
    if profile.is_current_user {
        let _ = write!(out, " {}", "(you)".dimmed());
    } else {
        let _ = write!(out, " {}", follow_badge(profile.is_followed));
    }
    out.push('\n');
    if let Some(intro) = user.intro.as_deref().filter(|i| !i.is_empty()) {
        wrapped(&mut out, intro);
    }
    let _ = writeln!(
        out,
        "{INDENT}{} tweets  {} following  {} followers",
        tweet_count.to_string().cyan(),
        format_count(profile.following_count).cyan(),
        format_count(profile.follower_count).cyan()
    );
    let _ = writeln!(out, "{}", divider());
    out
}

fn tweet_list(out: &mut String, tweets: &[AnnotatedTweet], empty: &str) {
    if tweets.is_empty() {
        let _ = writeln!(out, "{}", empty.yellow());
    }
    for tweet in tweets {
        out.push_str(&tweet_card(tweet));
        out.push('\n');
    }
}

#[must_use]
pub fn home_page(page: &HomePage) -> String {
    let mut out = String::new();
    heading(
        &mut out,
        &format!("Home · signed in as @{}", page.current_user.account),
    );
    tweet_list(&mut out, &page.tweets, "No tweets yet.");
    out.push_str(&sidebar(&page.top_users));
    out
}

#[must_use]
pub fn tweet_page(page: &TweetPage) -> String {
    let mut out = String::new();
    out.push_str(&tweet_card(&page.tweet));
    let _ = writeln!(out, "{}", divider());
    if page.replies.is_empty() {
        let _ = writeln!(out, "{}", "No replies yet.".yellow());
    }
    for reply in &page.replies {
        out.push_str(&reply_card(reply));
        out.push('\n');
    }
    out.push_str(&sidebar(&page.top_users));
    out
}

#[must_use]
pub fn tweet_detail(detail: &TweetDetail) -> String {
    let mut out = String::new();
    let t = &detail.tweet;
    let _ = writeln!(
        out,
        "{} {} {}",
        t.author.name.bold(),
        format!("@{}", t.author.account).green(),
        format!("· {}", detail.from_now).dimmed()
    );
    wrapped(&mut out, &t.description);
    out
}

#[must_use]
pub fn user_tweets_page(page: &UserTweetsPage) -> String {
    let tweet_count = i64::try_from(page.tweets.len()).unwrap_or(i64::MAX);
    let mut out = profile_header(&page.profile, tweet_count);
    tweet_list(&mut out, &page.tweets, "No tweets yet.");
    out.push_str(&sidebar(&page.top_users));
    out
}

#[must_use]
pub fn user_replies_page(page: &UserRepliesPage) -> String {
    let mut out = profile_header(&page.profile, page.tweet_count);
    if page.replies.is_empty() {
        let _ = writeln!(out, "{}", "No replies yet.".yellow());
    }
    for reply in &page.replies {
        out.push_str(&reply_card(reply));
        out.push('\n');
    }
    out.push_str(&sidebar(&page.top_users));
    out
}

#[must_use]
pub fn user_likes_page(page: &UserLikesPage) -> String {
    let mut out = profile_header(&page.profile, page.tweet_count);
    if page.liked_tweets.is_empty() {
        let _ = writeln!(out, "{}", "No likes yet.".yellow());
    }
    for liked in &page.liked_tweets {
        out.push_str(&tweet_card(&liked.tweet));
        if let Some(at) = liked.liked_time {
            let liked_at = format!("liked {}", format_relative_date(at));
            let _ = writeln!(out, "{INDENT}{}", liked_at.dimmed());
        }
        out.push('\n');
    }
    out.push_str(&sidebar(&page.top_users));
    out
}

fn edge_line(edge: &AnnotatedEdge) -> String {
    let badge = if edge.is_not_current_user {
        follow_badge(edge.is_followed)
    } else {
        "(you)".dimmed().to_string()
    };
    format!(
        "  {:<24} {}  {}",
        handle(&edge.user),
        badge,
        format!("since {}", format_relative_date(edge.followed_at)).dimmed()
    )
}

#[must_use]
pub fn follow_page(page: &FollowPage) -> String {
    let mut out = String::new();
    let title = match page.list {
        FollowList::Followers => "followers",
        FollowList::Followings => "following",
    };
    heading(
        &mut out,
        &format!(
            "{} @{} · {} tweets · {title}",
            page.user.name, page.user.account, page.tweet_count
        ),
    );
    if page.users.is_empty() {
        let _ = writeln!(out, "{}", "Nobody here yet.".yellow());
    }
    for edge in &page.users {
        let _ = writeln!(out, "{}", edge_line(edge));
    }
    out.push_str(&sidebar(&page.top_users));
    out
}

/// An account record, as shown by `whoami` and `settings`.
#[must_use]
pub fn user_card(user: &User) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", user.name.bold(), format!("@{}", user.account).green());
    let _ = writeln!(out, "  {:<10} {}", "ID:", user.id);
    let _ = writeln!(out, "  {:<10} {}", "Email:", user.email);
    let _ = writeln!(out, "  {:<10} {}", "Role:", user.role);
    let _ = writeln!(
        out,
        "  {:<10} {}",
        "Joined:",
        user.created_at.format("%Y-%m-%d").to_string().dimmed()
    );
    for (label, value) in [
        ("Intro:", &user.intro),
        ("Avatar:", &user.avatar),
        ("Cover:", &user.cover),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "  {label:<10} {value}");
        }
    }
    out
}

#[must_use]
pub fn stats(stats: &Stats) -> String {
    let mut out = String::new();
    heading(&mut out, "Database Statistics");
    for (label, count) in [
        ("Users:", stats.users_count),
        ("Tweets:", stats.tweets_count),
        ("Replies:", stats.replies_count),
        ("Likes:", stats.likes_count),
        ("Follows:", stats.followships_count),
    ] {
        let _ = writeln!(
            out,
            "  {label:<20} {:>10}",
            format_count(usize::try_from(count).unwrap_or(0))
        );
    }
    if let (Some(first), Some(last)) = (stats.first_tweet_date, stats.last_tweet_date) {
        let _ = writeln!(out, "{}", divider());
        let _ = writeln!(out, "  First tweet: {}", first.format("%Y-%m-%d").to_string().green());
        let _ = writeln!(out, "  Last tweet:  {}", last.format("%Y-%m-%d").to_string().green());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Role, Tweet};
    use chrono::{Duration, Utc};

    fn create_test_user(id: i64, account: &str) -> User {
        User {
            id,
            account: account.to_string(),
            name: account.to_uppercase(),
            email: format!("{account}@example.com"),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::User,
            intro: None,
            avatar: None,
            cover: None,
            created_at: Utc::now(),
        }
    }

    fn create_test_tweet(id: i64, text: &str) -> AnnotatedTweet {
        let author = create_test_user(1, "alice");
        AnnotatedTweet {
            tweet: Tweet {
                id,
                author: Author::from(&author),
                description: text.to_string(),
                created_at: Utc::now() - Duration::minutes(3),
            },
            reply_count: 2,
            like_count: 1_500,
            is_liked: true,
        }
    }

    #[test]
    fn test_tweet_card_shows_counters() {
        let card = tweet_card(&create_test_tweet(12, "hello world"));
        assert!(card.contains("hello world"));
        assert!(card.contains("@alice"));
        assert!(card.contains("3m ago"));
        assert!(card.contains("1.5K"));
    }

    #[test]
    fn test_tweet_card_wraps_long_text() {
        let text = "word ".repeat(40);
        let card = tweet_card(&create_test_tweet(1, &text));
        assert!(card.lines().count() > 3);
        assert!(card.lines().all(|l| l.chars().count() < 120));
    }

    #[test]
    fn test_json_never_contains_password_hash() {
        let user = create_test_user(1, "alice");
        let json = to_json(&user, OutputFormat::Json).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secret"));

        let pretty = to_json(&user, OutputFormat::JsonPretty).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_sidebar_empty_and_filled() {
        assert!(sidebar(&[]).is_empty());
        let entry = RecommendedUser {
            user: create_test_user(2, "bob"),
            is_followed: true,
            follower_count: 3,
        };
        let text = sidebar(&[entry]);
        assert!(text.contains("@bob"));
        assert!(text.contains("following"));
    }

    #[test]
    fn test_flattened_tweet_json_fields() {
        let value: serde_json::Value =
            serde_json::from_str(&to_json(&create_test_tweet(5, "hi"), OutputFormat::Json).unwrap())
                .unwrap();
        assert_eq!(value["id"], 5);
        assert_eq!(value["reply_count"], 2);
        assert_eq!(value["like_count"], 1_500);
        assert_eq!(value["is_liked"], true);
        assert_eq!(value["author"]["account"], "alice");
    }
}
