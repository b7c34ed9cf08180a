//! CLI definitions for chirp.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// chirp - a small social timeline in your terminal
#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(version)]
#[command(about = "Post, reply, like and follow on a local social timeline")]
#[command(long_about = r"
chirp keeps users, tweets, replies, likes and follows in a single SQLite
file and renders the familiar pages (home feed, tweet thread, profile tabs,
follower lists) as colored text or JSON.

Quick start:
  1. Create the database:  chirp init
  2. Register:             chirp signup alice --name Alice --email a@example.com \
                             --password pw --confirm pw
  3. Sign in:              chirp signin alice
  4. Post and read:        chirp post 'hello'  /  chirp feed
")]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "CHIRP_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Path to the session file
    #[arg(long, env = "CHIRP_SESSION", global = true, hide = true)]
    pub session: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Be verbose (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create (or upgrade) the database
    Init(InitArgs),

    /// Register a new account
    Signup(SignupArgs),

    /// Sign in as an existing account
    Signin(SigninArgs),

    /// Forget the current sign-in
    Signout,

    /// Show the signed-in account
    Whoami,

    /// Show the home feed
    Feed,

    /// Post a tweet
    Post(PostArgs),

    /// Show a tweet and its replies
    Tweet(TweetArgs),

    /// Reply to a tweet
    Reply(ReplyArgs),

    /// Like a tweet
    Like(TweetRef),

    /// Remove a like
    Unlike(TweetRef),

    /// Follow a user
    Follow(UserRef),

    /// Stop following a user
    Unfollow(UserRef),

    /// Show a user's page
    User(UserArgs),

    /// Show or change account settings
    Settings(SettingsArgs),

    /// Edit your profile
    Profile(ProfileArgs),

    /// Show database statistics
    Stats,

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Delete an existing database first
    #[arg(long, short = 'F')]
    pub force: bool,

    /// Also create an admin account with this handle
    #[arg(long, value_name = "ACCOUNT", requires = "admin_password")]
    pub admin: Option<String>,

    /// Email for the admin account (defaults to <ACCOUNT>@localhost)
    #[arg(long, requires = "admin")]
    pub admin_email: Option<String>,

    /// Password for the admin account
    #[arg(
        long,
        env = "CHIRP_ADMIN_PASSWORD",
        hide_env_values = true,
        requires = "admin"
    )]
    pub admin_password: Option<String>,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    /// Account handle (used to sign in)
    pub account: String,

    /// Display name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: String,

    /// Password
    #[arg(long, short = 'p', env = "CHIRP_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Password confirmation (must match --password)
    #[arg(long, env = "CHIRP_PASSWORD_CONFIRM", hide_env_values = true)]
    pub confirm: String,
}

#[derive(Args, Debug)]
pub struct SigninArgs {
    /// Account handle
    pub account: String,

    /// Password
    #[arg(long, short = 'p', env = "CHIRP_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Sign in to an admin account instead of a regular one
    #[arg(long)]
    pub admin: bool,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Tweet text (at most 140 characters)
    pub text: String,
}

#[derive(Args, Debug)]
pub struct TweetArgs {
    /// Tweet ID
    pub id: i64,

    /// Only the tweet itself, with a relative timestamp
    #[arg(long, short = 'b')]
    pub brief: bool,
}

#[derive(Args, Debug)]
pub struct ReplyArgs {
    /// Tweet ID to reply to
    pub id: i64,

    /// Reply text (at most 140 characters)
    pub text: String,
}

#[derive(Args, Debug)]
pub struct TweetRef {
    /// Tweet ID
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct UserRef {
    /// User ID
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct UserArgs {
    /// User ID
    pub id: i64,

    /// Which tab of the user page to show
    #[arg(default_value = "tweets")]
    pub tab: UserTab,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// New account handle
    #[arg(long)]
    pub account: Option<String>,

    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New email address
    #[arg(long)]
    pub email: Option<String>,

    /// Password to set (required when changing anything)
    #[arg(long, short = 'p', requires = "confirm")]
    pub password: Option<String>,

    /// Password confirmation (must match --password)
    #[arg(long)]
    pub confirm: Option<String>,
}

impl SettingsArgs {
    /// True when no change was requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
    }
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Display name (at most 50 characters)
    #[arg(long)]
    pub name: Option<String>,

    /// Self introduction (at most 160 characters)
    #[arg(long)]
    pub intro: Option<String>,

    /// Avatar image URL
    #[arg(long)]
    pub avatar: Option<String>,

    /// Cover image URL
    #[arg(long, conflicts_with = "reset_cover")]
    pub cover: Option<String>,

    /// Restore the default cover image
    #[arg(long)]
    pub reset_cover: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Set a configuration value (key=value) and save it
    #[arg(long)]
    pub set: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserTab {
    #[default]
    Tweets,
    Replies,
    Likes,
    Followings,
    Followers,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}
