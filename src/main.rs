//! chirp - a small social timeline CLI
//!
//! Main entry point for the chirp command-line tool.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use chirp::app::{AccountForm, ProfileForm};
use chirp::error::format_error;
use chirp::model::Role;
use chirp::session::Session;
use chirp::{
    App, ChirpError, Cli, Commands, Config, OutputFormat, Storage, UserTab, Viewer, cli,
    logging, render,
};

/// Everything a command needs besides its own arguments.
struct Invocation {
    config: Config,
    format: OutputFormat,
    quiet: bool,
}

impl Invocation {
    fn new(cli: &Cli) -> Self {
        let mut config = Config::load();
        if let Some(db) = &cli.db {
            config.paths.db = Some(db.clone());
        }
        if let Some(session) = &cli.session {
            config.paths.session = Some(session.clone());
        }
        if cli.no_color {
            config.output.colors = false;
        }
        let format = cli
            .format
            .or_else(|| config.output.format.parse().ok())
            .unwrap_or_default();

        Self {
            config,
            format,
            quiet: cli.quiet,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.config.db_path()
    }

    fn session_path(&self) -> PathBuf {
        self.config.session_path()
    }

    fn open_app(&self) -> Result<App> {
        let storage = Storage::open_existing(self.db_path())?;
        Ok(App::new(storage, self.config.clone()))
    }

    /// Open the database and resolve the signed-in viewer.
    fn signed_in(&self) -> Result<(App, Viewer)> {
        let app = self.open_app()?;
        let session = Session::require(&self.session_path())?;
        let viewer = app.viewer(session.user_id)?;
        debug!(user_id = viewer.viewer_id, "Resolved viewer");
        Ok((app, viewer))
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                println!("{}", render::to_json(value, self.format)?);
            }
            OutputFormat::Text => print!("{}", text(value)),
        }
        Ok(())
    }

    /// Report a completed action.
    fn done(&self, message: &str, value: &serde_json::Value) -> Result<()> {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                println!("{}", render::to_json(value, self.format)?);
            }
            OutputFormat::Text if !self.quiet => println!("{} {message}", "✓".green()),
            OutputFormat::Text => {}
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let ctx = Invocation::new(&cli);

    if !ctx.config.output.colors {
        colored::control::set_override(false);
    }
    logging::init_cli_logging(
        cli.quiet,
        cli.verbose,
        ctx.config.output.colors,
        &ctx.config.logging,
    );

    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ChirpError>() {
        Some(chirp_err) => {
            let suggestions: Vec<&str> = chirp_err.suggestion().into_iter().collect();
            let title = if chirp_err.is_recoverable() {
                chirp_err.to_string()
            } else {
                format!("Error: {chirp_err}")
            };
            let explanation = err
                .chain()
                .skip(1)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(": ");
            format_error(&title, &explanation, &suggestions)
        }
        None => format_error(&format!("{err:#}"), "", &[]),
    }
}

fn run(cli: &Cli, ctx: &Invocation) -> Result<()> {
    match &cli.command {
        Commands::Init(args) => cmd_init(ctx, args),
        Commands::Signup(args) => cmd_signup(ctx, args),
        Commands::Signin(args) => cmd_signin(ctx, args),
        Commands::Signout => cmd_signout(ctx),
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Feed => cmd_feed(ctx),
        Commands::Post(args) => cmd_post(ctx, args),
        Commands::Tweet(args) => cmd_tweet(ctx, args),
        Commands::Reply(args) => cmd_reply(ctx, args),
        Commands::Like(args) => cmd_like(ctx, args, true),
        Commands::Unlike(args) => cmd_like(ctx, args, false),
        Commands::Follow(args) => cmd_follow(ctx, args, true),
        Commands::Unfollow(args) => cmd_follow(ctx, args, false),
        Commands::User(args) => cmd_user(ctx, args),
        Commands::Settings(args) => cmd_settings(ctx, args),
        Commands::Profile(args) => cmd_profile(ctx, args),
        Commands::Stats => cmd_stats(ctx),
        Commands::Config(args) => cmd_config(ctx, args),
        Commands::Completions(args) => cmd_completions(args),
    }
}

fn cmd_init(ctx: &Invocation, args: &cli::InitArgs) -> Result<()> {
    let db_path = ctx.db_path();

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if args.force && db_path.exists() {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = db_path.clone().into_os_string();
            path.push(suffix);
            let path = PathBuf::from(path);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Session::clear(&ctx.session_path())?;
        info!("Cleared existing database");
    }

    let storage = Storage::open(&db_path)?;
    let schema_version = storage.schema_version();

    let admin = match (&args.admin, &args.admin_password) {
        (Some(account), Some(password)) => {
            let app = App::new(storage, ctx.config.clone());
            let form = AccountForm {
                account: account.clone(),
                name: account.clone(),
                email: args
                    .admin_email
                    .clone()
                    .unwrap_or_else(|| format!("{account}@localhost")),
                password: password.clone(),
                check_password: password.clone(),
            };
            Some(app.create_admin(&form)?)
        }
        _ => None,
    };

    let message = match &admin {
        Some(admin) => format!(
            "Database ready at {} (admin @{} created)",
            db_path.display(),
            admin.account
        ),
        None => format!("Database ready at {}", db_path.display()),
    };
    ctx.done(
        &message,
        &json!({
            "db": db_path,
            "schema_version": schema_version,
            "admin": admin,
        }),
    )
}

fn cmd_signup(ctx: &Invocation, args: &cli::SignupArgs) -> Result<()> {
    let app = ctx.open_app()?;
    let form = AccountForm {
        account: args.account.clone(),
        name: args.name.clone(),
        email: args.email.clone(),
        password: args.password.clone(),
        check_password: args.confirm.clone(),
    };
    let user = app.sign_up(&form)?;
    ctx.done(
        &format!(
            "Registered @{} (id {}). Sign in with 'chirp signin {}'.",
            user.account, user.id, user.account
        ),
        &json!({ "user": user }),
    )
}

fn cmd_signin(ctx: &Invocation, args: &cli::SigninArgs) -> Result<()> {
    let app = ctx.open_app()?;
    let role = if args.admin { Role::Admin } else { Role::User };
    let user = app.sign_in(&args.account, &args.password, role)?;
    let session = Session {
        user_id: user.id,
        account: user.account.clone(),
        role,
        signed_in_at: Utc::now(),
    };
    session.save(&ctx.session_path())?;
    let message = match role {
        Role::Admin => format!("Signed in as admin @{}", user.account),
        Role::User => format!("Signed in as @{}", user.account),
    };
    ctx.done(&message, &json!({ "user": user }))
}

fn cmd_signout(ctx: &Invocation) -> Result<()> {
    let removed = Session::clear(&ctx.session_path())?;
    let message = if removed { "Signed out" } else { "Not signed in" };
    ctx.done(message, &json!({ "signed_out": removed }))
}

fn cmd_whoami(ctx: &Invocation) -> Result<()> {
    let app = ctx.open_app()?;
    let session = Session::require(&ctx.session_path())?;
    let user = match session.role {
        Role::Admin => app
            .storage()
            .get_user(session.user_id)?
            .filter(|user| user.role == Role::Admin)
            .ok_or(ChirpError::NotSignedIn)?,
        Role::User => {
            let viewer = app.viewer(session.user_id)?;
            app.user_data(&viewer, viewer.viewer_id)?
        }
    };
    ctx.emit(&user, render::user_card)
}

fn cmd_feed(ctx: &Invocation) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let page = app.home_page(&viewer)?;
    ctx.emit(&page, render::home_page)
}

fn cmd_post(ctx: &Invocation, args: &cli::PostArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let tweet = app.post_tweet(&viewer, &args.text)?;
    ctx.done(&format!("Posted tweet #{}", tweet.id), &json!({ "tweet": tweet }))
}

fn cmd_tweet(ctx: &Invocation, args: &cli::TweetArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    if args.brief {
        let detail = app.tweet_detail(&viewer, args.id)?;
        ctx.emit(&detail, render::tweet_detail)
    } else {
        let page = app.tweet_page(&viewer, args.id)?;
        ctx.emit(&page, render::tweet_page)
    }
}

fn cmd_reply(ctx: &Invocation, args: &cli::ReplyArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let reply_id = app.post_reply(&viewer, args.id, &args.text)?;
    ctx.done(
        &format!("Replied to tweet #{}", args.id),
        &json!({ "reply_id": reply_id, "tweet_id": args.id }),
    )
}

fn cmd_like(ctx: &Invocation, args: &cli::TweetRef, like: bool) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let message = if like {
        app.like(&viewer, args.id)?;
        format!("Liked tweet #{}", args.id)
    } else {
        app.unlike(&viewer, args.id)?;
        format!("Unliked tweet #{}", args.id)
    };
    ctx.done(&message, &json!({ "tweet_id": args.id, "is_liked": like }))
}

fn cmd_follow(ctx: &Invocation, args: &cli::UserRef, follow: bool) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let message = if follow {
        app.follow(&viewer, args.id)?;
        format!("Following user {}", args.id)
    } else {
        app.unfollow(&viewer, args.id)?;
        format!("Unfollowed user {}", args.id)
    };
    ctx.done(&message, &json!({ "user_id": args.id, "is_followed": follow }))
}

fn cmd_user(ctx: &Invocation, args: &cli::UserArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let id = args.id;
    match args.tab {
        UserTab::Tweets => ctx.emit(&app.user_tweets_page(&viewer, id)?, render::user_tweets_page),
        UserTab::Replies => {
            ctx.emit(&app.user_replies_page(&viewer, id)?, render::user_replies_page)
        }
        UserTab::Likes => ctx.emit(&app.user_likes_page(&viewer, id)?, render::user_likes_page),
        UserTab::Followings => ctx.emit(&app.followings_page(&viewer, id)?, render::follow_page),
        UserTab::Followers => ctx.emit(&app.followers_page(&viewer, id)?, render::follow_page),
    }
}

fn cmd_settings(ctx: &Invocation, args: &cli::SettingsArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let current = app.user_data(&viewer, viewer.viewer_id)?;
    if args.is_empty() {
        return ctx.emit(&current, render::user_card);
    }

    let password = args
        .password
        .clone()
        .ok_or_else(|| ChirpError::validation("password", "is required when changing settings"))?;
    let form = AccountForm {
        account: args.account.clone().unwrap_or(current.account),
        name: args.name.clone().unwrap_or(current.name),
        email: args.email.clone().unwrap_or(current.email),
        password,
        check_password: args.confirm.clone().unwrap_or_default(),
    };
    let user = app.update_settings(&viewer, viewer.viewer_id, &form)?;

    // Keep the session's account name in step with a renamed account.
    let session_path = ctx.session_path();
    if let Some(mut session) = Session::load(&session_path)? {
        if session.account != user.account {
            session.account.clone_from(&user.account);
            session.save(&session_path)?;
        }
    }
    ctx.done("Settings updated", &json!({ "user": user }))
}

fn cmd_profile(ctx: &Invocation, args: &cli::ProfileArgs) -> Result<()> {
    let (app, viewer) = ctx.signed_in()?;
    let current = app.user_data(&viewer, viewer.viewer_id)?;
    let form = ProfileForm {
        name: args.name.clone().unwrap_or(current.name),
        intro: args.intro.clone(),
        avatar: args.avatar.clone(),
        cover: args.cover.clone(),
        reset_cover: args.reset_cover,
    };
    let user = app.edit_profile(&viewer, viewer.viewer_id, &form)?;
    ctx.done("Profile updated", &json!({ "user": user }))
}

fn cmd_stats(ctx: &Invocation) -> Result<()> {
    let storage = Storage::open_existing(ctx.db_path())?;
    let stats = storage.get_stats()?;
    ctx.emit(&stats, render::stats)
}

fn cmd_config(ctx: &Invocation, args: &cli::ConfigArgs) -> Result<()> {
    if let Some(assignment) = &args.set {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            ChirpError::InvalidArgument {
                reason: format!("expected key=value, got '{assignment}'"),
            }
        })?;
        let mut config = Config::load();
        config.set(key.trim(), value.trim())?;
        let path = config.save()?;
        return ctx.done(
            &format!("Set {} in {}", key.trim(), path.display()),
            &json!({ "key": key.trim(), "value": value.trim(), "path": path }),
        );
    }

    match ctx.format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", render::to_json(&ctx.config, ctx.format)?);
        }
        OutputFormat::Text => {
            println!("{}", "Current Configuration".bold().cyan());
            println!("  Database: {}", ctx.db_path().display());
            println!("  Session:  {}", ctx.session_path().display());
            if let Some(path) = Config::user_config_path() {
                println!("  File:     {}", path.display());
            }
            if args.show {
                println!();
                print!("{}", ctx.config.to_toml());
            }
        }
    }
    Ok(())
}

fn cmd_completions(args: &cli::CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "chirp", &mut io::stdout());
    Ok(())
}
