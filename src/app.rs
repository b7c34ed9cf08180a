//! Page and action handlers.
//!
//! Each page method fetches every row-set it needs from [`Storage`] first
//! and only then hands them to [`crate::aggregate`]. Action methods validate
//! their input and let the table constraints settle races.

use crate::aggregate::{
    annotate_tweets, rank_follow_edges, rank_liked_tweets, rank_recommended_users,
    summarize_profile,
};
use crate::auth;
use crate::config::Config;
use crate::error::{ChirpError, Result};
use crate::format_relative_date;
use crate::model::{
    AnnotatedEdge, AnnotatedTweet, LikedTweet, ProfileSummary, RecommendedUser, Reply, Role,
    Tweet, TweetId, User, UserId, Viewer,
};
use crate::storage::{NewUser, Storage};
use crate::text_length;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// Maximum length of a tweet or reply.
pub const MAX_POST_LENGTH: usize = 140;
/// Maximum length of a display name.
pub const MAX_NAME_LENGTH: usize = 50;
/// Maximum length of a profile intro.
pub const MAX_INTRO_LENGTH: usize = 160;

// =============================================================================
// Forms
// =============================================================================

/// Sign-up and account-settings form.
#[derive(Debug, Clone, Default)]
pub struct AccountForm {
    pub account: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub check_password: String,
}

/// Profile edit form. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub intro: Option<String>,
    pub avatar: Option<String>,
    pub cover: Option<String>,
    pub reset_cover: bool,
}

// =============================================================================
// Pages
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HomePage {
    pub current_user: User,
    pub tweets: Vec<AnnotatedTweet>,
    pub top_users: Vec<RecommendedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetPage {
    pub current_user: User,
    pub tweet: AnnotatedTweet,
    pub replies: Vec<Reply>,
    pub top_users: Vec<RecommendedUser>,
}

/// A single tweet with a "3m ago" style timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TweetDetail {
    pub current_user: User,
    pub tweet: Tweet,
    pub from_now: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTweetsPage {
    pub profile: ProfileSummary,
    pub tweets: Vec<AnnotatedTweet>,
    pub top_users: Vec<RecommendedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRepliesPage {
    pub profile: ProfileSummary,
    pub tweet_count: i64,
    pub replies: Vec<Reply>,
    pub top_users: Vec<RecommendedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserLikesPage {
    pub profile: ProfileSummary,
    pub tweet_count: i64,
    pub liked_tweets: Vec<LikedTweet>,
    pub top_users: Vec<RecommendedUser>,
}

/// Which side of the follow graph a [`FollowPage`] lists.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowList {
    Followers,
    Followings,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowPage {
    pub list: FollowList,
    pub user: User,
    pub tweet_count: i64,
    pub users: Vec<AnnotatedEdge>,
    pub top_users: Vec<RecommendedUser>,
}

// =============================================================================
// Validation
// =============================================================================

fn require_text(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ChirpError::validation(field, "cannot be blank"));
    }
    if text_length(value) > max {
        return Err(ChirpError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn validate_account_form(form: &AccountForm) -> Result<()> {
    let fields = [
        &form.account,
        &form.name,
        &form.email,
        &form.password,
        &form.check_password,
    ];
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ChirpError::validation("form", "all fields are required"));
    }
    if form.password != form.check_password {
        return Err(ChirpError::validation(
            "check_password",
            "password and confirmation do not match",
        ));
    }
    require_text("name", &form.name, MAX_NAME_LENGTH)
}

fn ensure_self(viewer: &Viewer, user_id: UserId, resource: &'static str) -> Result<()> {
    if viewer.viewer_id == user_id {
        Ok(())
    } else {
        Err(ChirpError::PermissionDenied { resource })
    }
}

// =============================================================================
// App
// =============================================================================

/// Request handlers over one database.
pub struct App {
    storage: Storage,
    config: Config,
}

impl App {
    #[must_use]
    pub const fn new(storage: Storage, config: Config) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Build the viewer context for a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotSignedIn`] if the user no longer exists.
    pub fn viewer(&self, user_id: UserId) -> Result<Viewer> {
        Viewer::load(&self.storage, user_id)
    }

    fn user(&self, user_id: UserId) -> Result<User> {
        self.storage
            .get_user(user_id)?
            .ok_or_else(|| ChirpError::not_found("User", user_id))
    }

    fn tweet(&self, tweet_id: TweetId) -> Result<Tweet> {
        self.storage
            .get_tweet(tweet_id)?
            .ok_or_else(|| ChirpError::not_found("Tweet", tweet_id))
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Register a regular user.
    ///
    /// # Errors
    ///
    /// Returns a validation or conflict error describing the first problem.
    pub fn sign_up(&self, form: &AccountForm) -> Result<User> {
        validate_account_form(form)?;
        self.ensure_available(&form.account, &form.email, None)?;

        let password_hash = auth::hash_password(&form.password, self.config.auth.bcrypt_cost)?;
        self.storage.create_user(
            &NewUser {
                account: form.account.clone(),
                name: form.name.clone(),
                email: form.email.clone(),
                password_hash,
                role: Role::User,
            },
            Utc::now(),
        )
    }

    fn ensure_available(&self, account: &str, email: &str, except: Option<UserId>) -> Result<()> {
        if self.storage.account_taken(account, except)? {
            return Err(ChirpError::AccountTaken {
                account: account.to_string(),
            });
        }
        if self.storage.email_taken(email, except)? {
            return Err(ChirpError::EmailTaken {
                email: email.to_string(),
            });
        }
        Ok(())
    }

    /// Register an admin account. Admin names only collide with other
    /// admins; emails are not checked against regular users.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or [`ChirpError::AccountTaken`] when an
    /// admin already holds the account name.
    pub fn create_admin(&self, form: &AccountForm) -> Result<User> {
        validate_account_form(form)?;
        if self
            .storage
            .find_user_by_account(&form.account, Role::Admin)?
            .is_some()
        {
            return Err(ChirpError::AccountTaken {
                account: form.account.clone(),
            });
        }

        let password_hash = auth::hash_password(&form.password, self.config.auth.bcrypt_cost)?;
        let admin = self.storage.create_user(
            &NewUser {
                account: form.account.clone(),
                name: form.name.clone(),
                email: form.email.clone(),
                password_hash,
                role: Role::Admin,
            },
            Utc::now(),
        )?;
        info!(user_id = admin.id, "Admin account created");
        Ok(admin)
    }

    /// Check credentials against the accounts holding `role`.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::InvalidCredentials`] on mismatch.
    pub fn sign_in(&self, account: &str, password: &str, role: Role) -> Result<User> {
        let user = auth::authenticate(&self.storage, account, password, role)?;
        info!(user_id = user.id, %role, "Credentials accepted");
        Ok(user)
    }

    /// The viewer's own record. Other users' records are refused.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::PermissionDenied`] for any other user id.
    pub fn user_data(&self, viewer: &Viewer, user_id: UserId) -> Result<User> {
        ensure_self(viewer, user_id, "data")?;
        self.user(user_id)
    }

    /// Change account name, display name, email and password.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::PermissionDenied`] for other users, or a
    /// validation/conflict error.
    pub fn update_settings(
        &self,
        viewer: &Viewer,
        user_id: UserId,
        form: &AccountForm,
    ) -> Result<User> {
        ensure_self(viewer, user_id, "settings")?;
        validate_account_form(form)?;
        self.ensure_available(&form.account, &form.email, Some(user_id))?;

        let mut user = self.user(user_id)?;
        user.account.clone_from(&form.account);
        user.name.clone_from(&form.name);
        user.email.clone_from(&form.email);
        user.password_hash = auth::hash_password(&form.password, self.config.auth.bcrypt_cost)?;
        let user = self.storage.update_user(&user)?;
        info!(user_id, "Account settings updated");
        Ok(user)
    }

    /// Change display name, intro, avatar and cover.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::PermissionDenied`] for other users, or a
    /// validation error for the name or intro.
    pub fn edit_profile(
        &self,
        viewer: &Viewer,
        user_id: UserId,
        form: &ProfileForm,
    ) -> Result<User> {
        ensure_self(viewer, user_id, "profile")?;
        require_text("name", &form.name, MAX_NAME_LENGTH)?;
        if let Some(intro) = &form.intro {
            if text_length(intro) > MAX_INTRO_LENGTH {
                return Err(ChirpError::validation(
                    "intro",
                    format!("must be at most {MAX_INTRO_LENGTH} characters"),
                ));
            }
        }

        let mut user = self.user(user_id)?;
        user.name.clone_from(&form.name);
        if let Some(intro) = form.intro.as_ref().filter(|i| !i.is_empty()) {
            user.intro = Some(intro.clone());
        }
        if let Some(avatar) = form.avatar.as_ref().filter(|a| !a.is_empty()) {
            user.avatar = Some(avatar.clone());
        }
        if form.reset_cover {
            user.cover = Some(self.config.profile.default_cover.clone());
        } else if let Some(cover) = form.cover.as_ref().filter(|c| !c.is_empty()) {
            user.cover = Some(cover.clone());
        }
        self.storage.update_user(&user)
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Post a tweet as the viewer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or over-long description.
    pub fn post_tweet(&self, viewer: &Viewer, description: &str) -> Result<Tweet> {
        require_text("description", description, MAX_POST_LENGTH)?;
        self.storage
            .create_tweet(viewer.viewer_id, description, Utc::now())
    }

    /// Reply to a tweet as the viewer. Returns the new reply id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or over-long comment, or
    /// [`ChirpError::NotFound`] for an unknown tweet.
    pub fn post_reply(&self, viewer: &Viewer, tweet_id: TweetId, comment: &str) -> Result<i64> {
        require_text("comment", comment, MAX_POST_LENGTH)?;
        self.storage
            .create_reply(tweet_id, viewer.viewer_id, comment, Utc::now())
    }

    /// Like a tweet.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::AlreadyLiked`] or [`ChirpError::NotFound`].
    pub fn like(&self, viewer: &Viewer, tweet_id: TweetId) -> Result<()> {
        self.storage
            .create_like(viewer.viewer_id, tweet_id, Utc::now())
            .map(|_| ())
    }

    /// Remove the viewer's like.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotLiked`] if there is none.
    pub fn unlike(&self, viewer: &Viewer, tweet_id: TweetId) -> Result<()> {
        self.storage.delete_like(viewer.viewer_id, tweet_id)
    }

    /// Follow another user.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::CannotFollowSelf`], [`ChirpError::NotFound`] or
    /// [`ChirpError::AlreadyFollowing`].
    pub fn follow(&self, viewer: &Viewer, user_id: UserId) -> Result<()> {
        if user_id == viewer.viewer_id {
            return Err(ChirpError::CannotFollowSelf);
        }
        self.user(user_id)?;
        self.storage
            .create_followship(viewer.viewer_id, user_id, Utc::now())
    }

    /// Stop following a user.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFollowing`] if there was no edge.
    pub fn unfollow(&self, viewer: &Viewer, user_id: UserId) -> Result<()> {
        self.storage.delete_followship(viewer.viewer_id, user_id)
    }

    // -------------------------------------------------------------------------
    // Pages
    // -------------------------------------------------------------------------

    /// The "who to follow" sidebar shown on every page.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a precondition violation.
    pub fn top_users(&self, viewer: &Viewer) -> Result<Vec<RecommendedUser>> {
        let candidates = self
            .storage
            .recommendation_candidates(viewer.viewer_id, self.config.feed.recommend_limit)?;
        rank_recommended_users(&candidates, viewer)
    }

    /// Everyone's tweets, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a precondition violation.
    pub fn home_page(&self, viewer: &Viewer) -> Result<HomePage> {
        let current_user = self.user(viewer.viewer_id)?;
        let tweets = self.storage.list_tweets()?;
        let replies = self.storage.list_reply_refs()?;
        let likes = self.storage.list_likes()?;
        let top_users = self.top_users(viewer)?;

        Ok(HomePage {
            current_user,
            tweets: annotate_tweets(&tweets, &replies, &likes, viewer.viewer_id)?,
            top_users,
        })
    }

    /// One tweet with its replies.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown tweet.
    pub fn tweet_page(&self, viewer: &Viewer, tweet_id: TweetId) -> Result<TweetPage> {
        let current_user = self.user(viewer.viewer_id)?;
        let tweet = self.tweet(tweet_id)?;
        let replies = self.storage.list_replies_for_tweet(tweet_id)?;
        let reply_refs = self.storage.list_reply_refs()?;
        let likes = self.storage.list_likes()?;
        let top_users = self.top_users(viewer)?;

        let annotated = annotate_tweets(
            std::slice::from_ref(&tweet),
            &reply_refs,
            &likes,
            viewer.viewer_id,
        )?
        .into_iter()
        .next()
        .ok_or_else(|| ChirpError::precondition("annotating one tweet produced none"))?;

        Ok(TweetPage {
            current_user,
            tweet: annotated,
            replies,
            top_users,
        })
    }

    /// One tweet with a relative timestamp, for lightweight clients.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown tweet.
    pub fn tweet_detail(&self, viewer: &Viewer, tweet_id: TweetId) -> Result<TweetDetail> {
        let tweet = self.tweet(tweet_id)?;
        Ok(TweetDetail {
            current_user: self.user(viewer.viewer_id)?,
            from_now: format_relative_date(tweet.created_at),
            tweet,
        })
    }

    fn profile(&self, viewer: &Viewer, user_id: UserId) -> Result<ProfileSummary> {
        let user = self.user(user_id)?;
        let followers = self.storage.follower_ids(user_id)?;
        let followings = self.storage.following_ids(user_id)?;
        Ok(summarize_profile(&user, &followers, &followings, viewer))
    }

    /// A user's tweets.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown user.
    pub fn user_tweets_page(&self, viewer: &Viewer, user_id: UserId) -> Result<UserTweetsPage> {
        let profile = self.profile(viewer, user_id)?;
        let tweets = self.storage.list_tweets_by_user(user_id)?;
        let replies = self.storage.list_reply_refs()?;
        let likes = self.storage.list_likes()?;
        let top_users = self.top_users(viewer)?;

        Ok(UserTweetsPage {
            profile,
            tweets: annotate_tweets(&tweets, &replies, &likes, viewer.viewer_id)?,
            top_users,
        })
    }

    /// A user's replies.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown user.
    pub fn user_replies_page(&self, viewer: &Viewer, user_id: UserId) -> Result<UserRepliesPage> {
        Ok(UserRepliesPage {
            profile: self.profile(viewer, user_id)?,
            tweet_count: self.storage.count_tweets_by_user(user_id)?,
            replies: self.storage.list_replies_by_user(user_id)?,
            top_users: self.top_users(viewer)?,
        })
    }

    /// Tweets a user has liked, most recently liked first.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown user.
    pub fn user_likes_page(&self, viewer: &Viewer, user_id: UserId) -> Result<UserLikesPage> {
        let profile = self.profile(viewer, user_id)?;
        let liked = self.storage.list_tweets_liked_by(user_id)?;
        let replies = self.storage.list_reply_refs()?;
        let likes = self.storage.list_likes()?;
        let tweet_count = self.storage.count_tweets_by_user(user_id)?;
        let top_users = self.top_users(viewer)?;

        Ok(UserLikesPage {
            profile,
            tweet_count,
            liked_tweets: rank_liked_tweets(&liked, &likes, &replies, viewer.viewer_id, user_id)?,
            top_users,
        })
    }

    /// Users that `user_id` follows, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown user.
    pub fn followings_page(&self, viewer: &Viewer, user_id: UserId) -> Result<FollowPage> {
        self.follow_page(viewer, user_id, FollowList::Followings)
    }

    /// Users following `user_id`, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] for an unknown user.
    pub fn followers_page(&self, viewer: &Viewer, user_id: UserId) -> Result<FollowPage> {
        self.follow_page(viewer, user_id, FollowList::Followers)
    }

    fn follow_page(
        &self,
        viewer: &Viewer,
        user_id: UserId,
        list: FollowList,
    ) -> Result<FollowPage> {
        let user = self.user(user_id)?;
        let edges = match list {
            FollowList::Followers => self.storage.followers_of(user_id)?,
            FollowList::Followings => self.storage.followings_of(user_id)?,
        };
        let tweet_count = self.storage.count_tweets_by_user(user_id)?;
        let top_users = self.top_users(viewer)?;

        Ok(FollowPage {
            list,
            user,
            tweet_count,
            users: rank_follow_edges(&edges, viewer)?,
            top_users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        App::new(Storage::open_memory().unwrap(), config)
    }

    fn form(account: &str) -> AccountForm {
        AccountForm {
            account: account.to_string(),
            name: account.to_string(),
            email: format!("{account}@example.com"),
            password: "pw".to_string(),
            check_password: "pw".to_string(),
        }
    }

    #[test]
    fn test_sign_up_validation() {
        let app = test_app();

        let mut missing = form("alice");
        missing.email.clear();
        assert!(matches!(
            app.sign_up(&missing),
            Err(ChirpError::Validation { field: "form", .. })
        ));

        let mut mismatch = form("alice");
        mismatch.check_password = "other".to_string();
        assert!(matches!(
            app.sign_up(&mismatch),
            Err(ChirpError::Validation {
                field: "check_password",
                ..
            })
        ));

        app.sign_up(&form("alice")).unwrap();
        assert!(matches!(
            app.sign_up(&form("alice")),
            Err(ChirpError::AccountTaken { .. })
        ));

        let mut same_email = form("alice2");
        same_email.email = "alice@example.com".to_string();
        assert!(matches!(
            app.sign_up(&same_email),
            Err(ChirpError::EmailTaken { .. })
        ));
    }

    #[test]
    fn test_sign_in() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        assert_eq!(app.sign_in("alice", "pw", Role::User).unwrap().id, alice.id);
        assert!(matches!(
            app.sign_in("alice", "nope", Role::User),
            Err(ChirpError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_admin_signs_in_only_as_admin() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let root = app.create_admin(&form("root")).unwrap();
        assert_eq!(root.role, Role::Admin);

        assert_eq!(app.sign_in("root", "pw", Role::Admin).unwrap().id, root.id);
        assert!(matches!(
            app.sign_in("root", "pw", Role::User),
            Err(ChirpError::InvalidCredentials)
        ));
        assert!(matches!(
            app.sign_in("alice", "pw", Role::Admin),
            Err(ChirpError::InvalidCredentials)
        ));

        // A regular user may take the same name; each sign-in path finds its own row.
        let mut twin = form("root");
        twin.email = "root-user@example.com".to_string();
        let user_root = app.sign_up(&twin).unwrap();
        assert_eq!(app.sign_in("root", "pw", Role::User).unwrap().id, user_root.id);
        assert!(matches!(
            app.create_admin(&form("root")),
            Err(ChirpError::AccountTaken { .. })
        ));

        assert!(matches!(app.viewer(root.id), Err(ChirpError::AdminViewer)));
        let top = app.top_users(&app.viewer(alice.id).unwrap()).unwrap();
        assert!(top.iter().all(|u| u.user.role == Role::User));
    }

    #[test]
    fn test_post_tweet_limits() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();

        assert!(matches!(
            app.post_tweet(&viewer, "   "),
            Err(ChirpError::Validation { .. })
        ));
        assert!(app.post_tweet(&viewer, &"x".repeat(141)).is_err());
        assert!(app.post_tweet(&viewer, &"x".repeat(140)).is_ok());
        assert!(app.post_tweet(&viewer, &"é".repeat(140)).is_ok());
    }

    #[test]
    fn test_follow_rules() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let bob = app.sign_up(&form("bob")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();

        assert!(matches!(
            app.follow(&viewer, alice.id),
            Err(ChirpError::CannotFollowSelf)
        ));
        assert!(matches!(
            app.follow(&viewer, 999),
            Err(ChirpError::NotFound { .. })
        ));
        app.follow(&viewer, bob.id).unwrap();
        assert!(matches!(
            app.follow(&viewer, bob.id),
            Err(ChirpError::AlreadyFollowing { .. })
        ));
        app.unfollow(&viewer, bob.id).unwrap();
        assert!(matches!(
            app.unfollow(&viewer, bob.id),
            Err(ChirpError::NotFollowing { .. })
        ));
    }

    #[test]
    fn test_settings_are_private() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let bob = app.sign_up(&form("bob")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();

        assert!(matches!(
            app.user_data(&viewer, bob.id),
            Err(ChirpError::PermissionDenied { .. })
        ));
        assert!(matches!(
            app.update_settings(&viewer, bob.id, &form("bob")),
            Err(ChirpError::PermissionDenied { .. })
        ));
        assert_eq!(app.user_data(&viewer, alice.id).unwrap().account, "alice");
    }

    #[test]
    fn test_update_settings_keeps_own_account() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        app.sign_up(&form("bob")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();

        let mut settings = form("alice");
        settings.name = "Alice Cooper".to_string();
        settings.password = "new".to_string();
        settings.check_password = "new".to_string();
        let updated = app.update_settings(&viewer, alice.id, &settings).unwrap();
        assert_eq!(updated.name, "Alice Cooper");
        assert!(app.sign_in("alice", "new", Role::User).is_ok());

        assert!(matches!(
            app.update_settings(&viewer, alice.id, &form("bob")),
            Err(ChirpError::AccountTaken { .. })
        ));
    }

    #[test]
    fn test_edit_profile() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();

        let edit = ProfileForm {
            name: "Alice".to_string(),
            intro: Some("hi there".to_string()),
            avatar: Some("https://example.com/a.png".to_string()),
            cover: Some("https://example.com/c.png".to_string()),
            reset_cover: false,
        };
        let user = app.edit_profile(&viewer, alice.id, &edit).unwrap();
        assert_eq!(user.intro.as_deref(), Some("hi there"));
        assert_eq!(user.cover.as_deref(), Some("https://example.com/c.png"));

        // Empty fields keep the current values; reset restores the default cover.
        let reset = ProfileForm {
            name: "Alice".to_string(),
            intro: Some(String::new()),
            reset_cover: true,
            ..ProfileForm::default()
        };
        let user = app.edit_profile(&viewer, alice.id, &reset).unwrap();
        assert_eq!(user.intro.as_deref(), Some("hi there"));
        assert_eq!(user.avatar.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(
            user.cover.as_deref(),
            Some(crate::config::DEFAULT_COVER_URL)
        );

        let too_long = ProfileForm {
            name: "n".repeat(51),
            ..ProfileForm::default()
        };
        assert!(matches!(
            app.edit_profile(&viewer, alice.id, &too_long),
            Err(ChirpError::Validation { field: "name", .. })
        ));

        let long_intro = ProfileForm {
            name: "Alice".to_string(),
            intro: Some("i".repeat(161)),
            ..ProfileForm::default()
        };
        assert!(matches!(
            app.edit_profile(&viewer, alice.id, &long_intro),
            Err(ChirpError::Validation { field: "intro", .. })
        ));
    }

    #[test]
    fn test_tweet_page_counts_replies_and_likes() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let bob = app.sign_up(&form("bob")).unwrap();
        let alice_v = app.viewer(alice.id).unwrap();
        let bob_v = app.viewer(bob.id).unwrap();

        let tweet = app.post_tweet(&alice_v, "hello").unwrap();
        app.post_reply(&bob_v, tweet.id, "hey").unwrap();
        app.like(&bob_v, tweet.id).unwrap();

        let page = app.tweet_page(&bob_v, tweet.id).unwrap();
        assert_eq!(page.tweet.reply_count, 1);
        assert_eq!(page.tweet.like_count, 1);
        assert!(page.tweet.is_liked);
        assert_eq!(page.replies.len(), 1);

        let page = app.tweet_page(&alice_v, tweet.id).unwrap();
        assert!(!page.tweet.is_liked);

        assert!(matches!(
            app.tweet_page(&alice_v, 404),
            Err(ChirpError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tweet_detail() {
        let app = test_app();
        let alice = app.sign_up(&form("alice")).unwrap();
        let viewer = app.viewer(alice.id).unwrap();
        let tweet = app.post_tweet(&viewer, "hello").unwrap();

        let detail = app.tweet_detail(&viewer, tweet.id).unwrap();
        assert_eq!(detail.from_now, "just now");
        assert_eq!(detail.tweet.author.account, "alice");
    }
}
