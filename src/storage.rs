//! `SQLite` storage for chirp.
//!
//! Owns the schema and every query the pages need. Rows are turned into
//! typed [`crate::model`] records here, before they reach the aggregation
//! layer. The data-model invariants (one like per user and tweet, one edge
//! per ordered pair, no self-follow, unique accounts) are enforced as table
//! constraints; writes map constraint failures onto domain errors.

use crate::error::{ChirpError, Result};
use crate::model::{
    Author, Candidate, FollowEdge, Like, Reply, ReplyRef, Role, Stats, Tweet, TweetId, User,
    UserId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

const USER_COLUMNS: &str = "u.id, u.account, u.name, u.email, u.password_hash, u.role, \
    u.intro, u.avatar, u.cover, u.created_at";

const TWEET_COLUMNS: &str =
    "t.id, t.description, t.created_at, u.id, u.account, u.name, u.avatar";

const REPLY_SELECT: &str = r"
    SELECT r.id, r.tweet_id, r.comment, r.created_at,
           u.id, u.account, u.name, u.avatar, tu.account
    FROM replies r
    JOIN users u ON u.id = r.user_id
    JOIN tweets t ON t.id = r.tweet_id
    JOIN users tu ON tu.id = t.user_id
";

const fn epoch_utc() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Fixed-width UTC timestamps, so text order is time order.
fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| epoch_utc(), |dt| dt.with_timezone(&Utc))
}

fn parse_db_time_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extended result code of a constraint failure, if `err` is one.
fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(e.extended_code)
        }
        _ => None,
    }
}

fn constraint_message(err: &rusqlite::Error) -> &str {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg,
        _ => "",
    }
}

fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        account: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        password_hash: row.get(offset + 4)?,
        role: Role::from_db(&row.get::<_, String>(offset + 5)?),
        intro: row.get(offset + 6)?,
        avatar: row.get(offset + 7)?,
        cover: row.get(offset + 8)?,
        created_at: parse_db_time(&row.get::<_, String>(offset + 9)?),
    })
}

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        id: row.get(0)?,
        description: row.get(1)?,
        created_at: parse_db_time(&row.get::<_, String>(2)?),
        author: Author {
            id: row.get(3)?,
            account: row.get(4)?,
            name: row.get(5)?,
            avatar: row.get(6)?,
        },
    })
}

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        tweet_id: row.get(1)?,
        comment: row.get(2)?,
        created_at: parse_db_time(&row.get::<_, String>(3)?),
        author: Author {
            id: row.get(4)?,
            account: row.get(5)?,
            name: row.get(6)?,
            avatar: row.get(7)?,
        },
        replied_to: row.get(8)?,
    })
}

fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Fields needed to register an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub account: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open an existing database, failing if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::DatabaseNotFound`] when `db_path` does not exist.
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(ChirpError::database_not_found(path));
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version();

        if current_version > SCHEMA_VERSION {
            return Err(ChirpError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            });
        }

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }

        Ok(())
    }

    /// Stored schema version; 0 for a fresh database.
    #[must_use]
    pub fn schema_version(&self) -> i32 {
        let result: rusqlite::Result<i32> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        result.unwrap_or_default()
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                intro TEXT,
                avatar TEXT,
                cover TEXT,
                created_at TEXT NOT NULL
            );
            -- Accounts and emails only need to be unique among regular users.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_account
                ON users(account) WHERE role = 'user';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email
                ON users(email) WHERE role = 'user';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_admins_account
                ON users(account) WHERE role = 'admin';

            CREATE TABLE IF NOT EXISTS tweets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_created_at ON tweets(created_at);
            CREATE INDEX IF NOT EXISTS idx_tweets_user ON tweets(user_id);

            CREATE TABLE IF NOT EXISTS replies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tweet_id INTEGER NOT NULL REFERENCES tweets(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_replies_tweet ON replies(tweet_id);
            CREATE INDEX IF NOT EXISTS idx_replies_user ON replies(user_id);

            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                tweet_id INTEGER NOT NULL REFERENCES tweets(id),
                created_at TEXT NOT NULL,
                UNIQUE (user_id, tweet_id)
            );
            CREATE INDEX IF NOT EXISTS idx_likes_tweet ON likes(tweet_id);

            CREATE TABLE IF NOT EXISTS followships (
                follower_id INTEGER NOT NULL REFERENCES users(id),
                following_id INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, following_id),
                CHECK (follower_id <> following_id)
            );
            CREATE INDEX IF NOT EXISTS idx_followships_following ON followships(following_id);
            ",
        )?;

        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::AccountTaken`] or [`ChirpError::EmailTaken`] when
    /// another regular user already holds the account or email.
    pub fn create_user(&self, new: &NewUser, at: DateTime<Utc>) -> Result<User> {
        self.conn
            .execute(
                r"
                INSERT INTO users (account, name, email, password_hash, role, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
                params![
                    new.account,
                    new.name,
                    new.email,
                    new.password_hash,
                    new.role.as_str(),
                    to_db_time(at),
                ],
            )
            .map_err(|e| Self::map_user_conflict(e, &new.account, &new.email))?;

        let id = self.conn.last_insert_rowid();
        info!(user_id = id, account = %new.account, "Created user");
        self.get_user(id)?
            .ok_or_else(|| ChirpError::not_found("User", id))
    }

    /// Name the missing side of a failed foreign key. SQLite does not say
    /// which reference failed, so the acting user is checked first.
    fn missing_reference(
        &self,
        actor_id: UserId,
        target: &'static str,
        target_id: i64,
    ) -> Result<ChirpError> {
        if self.get_user(actor_id)?.is_none() {
            return Ok(ChirpError::not_found("User", actor_id));
        }
        Ok(ChirpError::not_found(target, target_id))
    }

    fn map_user_conflict(err: rusqlite::Error, account: &str, email: &str) -> ChirpError {
        if constraint_code(&err).is_none() {
            return err.into();
        }
        if constraint_message(&err).contains("email") {
            ChirpError::EmailTaken {
                email: email.to_string(),
            }
        } else {
            ChirpError::AccountTaken {
                account: account.to_string(),
            }
        }
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![id], |row| user_from_row(row, 0))
            .optional()?)
    }

    /// Look up a user holding `role` by account name.
    ///
    /// Regular users and admins have separate account namespaces, so the
    /// same name may resolve to a different row per role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_user_by_account(&self, account: &str, role: Role) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.account = ? AND u.role = ?");
        Ok(self
            .conn
            .query_row(&sql, params![account, role.as_str()], |row| {
                user_from_row(row, 0)
            })
            .optional()?)
    }

    /// Whether a regular user other than `except` holds `account`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn account_taken(&self, account: &str, except: Option<UserId>) -> Result<bool> {
        self.exists_other("account", account, except)
    }

    /// Whether a regular user other than `except` holds `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool> {
        self.exists_other("email", email, except)
    }

    fn exists_other(&self, column: &str, value: &str, except: Option<UserId>) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {column} = ? AND role = 'user' AND id <> ?)"
        );
        let found: bool = self
            .conn
            .query_row(&sql, params![value, except.unwrap_or(-1)], |row| row.get(0))?;
        Ok(found)
    }

    /// Persist the mutable columns of `user` (account settings and profile).
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] if the user row is gone, or a
    /// conflict error when the new account or email is taken.
    pub fn update_user(&self, user: &User) -> Result<User> {
        let changed = self
            .conn
            .execute(
                r"
                UPDATE users
                SET account = ?, name = ?, email = ?, password_hash = ?,
                    intro = ?, avatar = ?, cover = ?
                WHERE id = ?
                ",
                params![
                    user.account,
                    user.name,
                    user.email,
                    user.password_hash,
                    user.intro,
                    user.avatar,
                    user.cover,
                    user.id,
                ],
            )
            .map_err(|e| Self::map_user_conflict(e, &user.account, &user.email))?;

        if changed == 0 {
            return Err(ChirpError::not_found("User", user.id));
        }
        debug!(user_id = user.id, "Updated user");
        self.get_user(user.id)?
            .ok_or_else(|| ChirpError::not_found("User", user.id))
    }

    // =========================================================================
    // Tweets
    // =========================================================================

    /// Insert a tweet.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] if the author does not exist.
    pub fn create_tweet(
        &self,
        author_id: UserId,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<Tweet> {
        self.conn
            .execute(
                "INSERT INTO tweets (user_id, description, created_at) VALUES (?, ?, ?)",
                params![author_id, description, to_db_time(at)],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(_) => ChirpError::not_found("User", author_id),
                None => e.into(),
            })?;

        let id = self.conn.last_insert_rowid();
        info!(tweet_id = id, author_id, "Created tweet");
        self.get_tweet(id)?
            .ok_or_else(|| ChirpError::not_found("Tweet", id))
    }

    /// Look up a tweet with its author.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets t JOIN users u ON u.id = t.user_id WHERE t.id = ?"
        );
        Ok(self
            .conn
            .query_row(&sql, params![id], tweet_from_row)
            .optional()?)
    }

    /// All tweets, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tweets(&self) -> Result<Vec<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets t JOIN users u ON u.id = t.user_id
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map([], tweet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tweets)
    }

    /// Tweets written by one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tweets_by_user(&self, user_id: UserId) -> Result<Vec<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets t JOIN users u ON u.id = t.user_id
             WHERE t.user_id = ?
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(params![user_id], tweet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tweets)
    }

    /// Tweets one user has liked, newest tweet first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tweets_liked_by(&self, user_id: UserId) -> Result<Vec<Tweet>> {
        let sql = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets t
             JOIN users u ON u.id = t.user_id
             JOIN likes l ON l.tweet_id = t.id
             WHERE l.user_id = ?
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tweets = stmt
            .query_map(params![user_id], tweet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tweets)
    }

    /// Number of tweets a user has written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_tweets_by_user(&self, user_id: UserId) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tweets WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Insert a reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFound`] if the tweet or author does not exist.
    pub fn create_reply(
        &self,
        tweet_id: TweetId,
        author_id: UserId,
        comment: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        if let Err(e) = self.conn.execute(
            "INSERT INTO replies (tweet_id, user_id, comment, created_at) VALUES (?, ?, ?, ?)",
            params![tweet_id, author_id, comment, to_db_time(at)],
        ) {
            return Err(match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    self.missing_reference(author_id, "Tweet", tweet_id)?
                }
                _ => e.into(),
            });
        }

        let id = self.conn.last_insert_rowid();
        info!(reply_id = id, tweet_id, author_id, "Created reply");
        Ok(id)
    }

    /// The tweet id of every reply; all the feed counters need.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_reply_refs(&self) -> Result<Vec<ReplyRef>> {
        let mut stmt = self.conn.prepare("SELECT tweet_id FROM replies")?;
        let refs = stmt
            .query_map([], |row| Ok(ReplyRef { tweet_id: row.get(0)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// Replies to one tweet, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_replies_for_tweet(&self, tweet_id: TweetId) -> Result<Vec<Reply>> {
        let sql =
            format!("{REPLY_SELECT} WHERE r.tweet_id = ? ORDER BY r.created_at DESC, r.id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let replies = stmt
            .query_map(params![tweet_id], reply_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(replies)
    }

    /// Replies written by one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_replies_by_user(&self, user_id: UserId) -> Result<Vec<Reply>> {
        let sql =
            format!("{REPLY_SELECT} WHERE r.user_id = ? ORDER BY r.created_at DESC, r.id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let replies = stmt
            .query_map(params![user_id], reply_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(replies)
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Record that `user_id` likes `tweet_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::AlreadyLiked`] on a repeat like and
    /// [`ChirpError::NotFound`] for an unknown user or tweet.
    pub fn create_like(
        &self,
        user_id: UserId,
        tweet_id: TweetId,
        at: DateTime<Utc>,
    ) -> Result<Like> {
        if let Err(e) = self.conn.execute(
            "INSERT INTO likes (user_id, tweet_id, created_at) VALUES (?, ?, ?)",
            params![user_id, tweet_id, to_db_time(at)],
        ) {
            return Err(match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    self.missing_reference(user_id, "Tweet", tweet_id)?
                }
                Some(_) => ChirpError::AlreadyLiked { tweet_id },
                None => e.into(),
            });
        }

        let id = self.conn.last_insert_rowid();
        debug!(like_id = id, user_id, tweet_id, "Created like");
        Ok(Like {
            id,
            user_id,
            tweet_id,
            created_at: parse_db_time(&to_db_time(at)),
        })
    }

    /// Remove a like.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotLiked`] if there was nothing to remove.
    pub fn delete_like(&self, user_id: UserId, tweet_id: TweetId) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM likes WHERE user_id = ? AND tweet_id = ?",
            params![user_id, tweet_id],
        )?;
        if removed == 0 {
            return Err(ChirpError::NotLiked { tweet_id });
        }
        debug!(user_id, tweet_id, "Deleted like");
        Ok(())
    }

    /// Every like.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_likes(&self) -> Result<Vec<Like>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, tweet_id, created_at FROM likes ORDER BY id")?;
        let likes = stmt
            .query_map([], |row| {
                Ok(Like {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    tweet_id: row.get(2)?,
                    created_at: parse_db_time(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(likes)
    }

    // =========================================================================
    // Followships
    // =========================================================================

    /// Record that `follower_id` follows `following_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::CannotFollowSelf`],
    /// [`ChirpError::AlreadyFollowing`] or [`ChirpError::NotFound`] when the
    /// matching constraint rejects the row.
    pub fn create_followship(
        &self,
        follower_id: UserId,
        following_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Err(e) = self.conn.execute(
            "INSERT INTO followships (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            params![follower_id, following_id, to_db_time(at)],
        ) {
            return Err(match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_CHECK) => ChirpError::CannotFollowSelf,
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    self.missing_reference(follower_id, "User", following_id)?
                }
                Some(_) => ChirpError::AlreadyFollowing {
                    user_id: following_id,
                },
                None => e.into(),
            });
        }

        debug!(follower_id, following_id, "Created followship");
        Ok(())
    }

    /// Remove a follow edge.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotFollowing`] if there was no such edge.
    pub fn delete_followship(&self, follower_id: UserId, following_id: UserId) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM followships WHERE follower_id = ? AND following_id = ?",
            params![follower_id, following_id],
        )?;
        if removed == 0 {
            return Err(ChirpError::NotFollowing {
                user_id: following_id,
            });
        }
        debug!(follower_id, following_id, "Deleted followship");
        Ok(())
    }

    /// Ids of the users `user_id` follows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn following_ids(&self, user_id: UserId) -> Result<Vec<UserId>> {
        self.edge_ids(
            "SELECT following_id FROM followships WHERE follower_id = ? ORDER BY following_id",
            user_id,
        )
    }

    /// Ids of the users following `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>> {
        self.edge_ids(
            "SELECT follower_id FROM followships WHERE following_id = ? ORDER BY follower_id",
            user_id,
        )
    }

    fn edge_ids(&self, sql: &str, user_id: UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Users following `user_id`, with the time each edge was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn followers_of(&self, user_id: UserId) -> Result<Vec<FollowEdge>> {
        self.edges(
            "JOIN users u ON u.id = f.follower_id WHERE f.following_id = ?",
            user_id,
        )
    }

    /// Users `user_id` follows, with the time each edge was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn followings_of(&self, user_id: UserId) -> Result<Vec<FollowEdge>> {
        self.edges(
            "JOIN users u ON u.id = f.following_id WHERE f.follower_id = ?",
            user_id,
        )
    }

    fn edges(&self, join_where: &str, user_id: UserId) -> Result<Vec<FollowEdge>> {
        let sql = format!("SELECT {USER_COLUMNS}, f.created_at FROM followships f {join_where}");
        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params![user_id], |row| {
                Ok(FollowEdge {
                    user: user_from_row(row, 0)?,
                    followed_at: parse_db_time(&row.get::<_, String>(10)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Regular users other than the viewer, most followed first, at most
    /// `limit` of them, each with its follower ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn recommendation_candidates(
        &self,
        viewer_id: UserId,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.role = 'user' AND u.id <> ?
             ORDER BY (SELECT COUNT(*) FROM followships f WHERE f.following_id = u.id) DESC, u.id
             LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params![viewer_id, limit_to_i64(limit)], |row| {
                user_from_row(row, 0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        users
            .into_iter()
            .map(|user| {
                let follower_ids = self.follower_ids(user.id)?;
                Ok(Candidate { user, follower_ids })
            })
            .collect()
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Row counts and tweet date bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the consolidated query fails.
    pub fn get_stats(&self) -> Result<Stats> {
        let query = r"
            SELECT
                (SELECT COUNT(*) FROM users) AS users_count,
                (SELECT COUNT(*) FROM tweets) AS tweets_count,
                (SELECT COUNT(*) FROM replies) AS replies_count,
                (SELECT COUNT(*) FROM likes) AS likes_count,
                (SELECT COUNT(*) FROM followships) AS followships_count,
                (SELECT MIN(created_at) FROM tweets) AS first_tweet_date,
                (SELECT MAX(created_at) FROM tweets) AS last_tweet_date
        ";

        Ok(self.conn.query_row(query, [], |row| {
            Ok(Stats {
                users_count: row.get(0)?,
                tweets_count: row.get(1)?,
                replies_count: row.get(2)?,
                likes_count: row.get(3)?,
                followships_count: row.get(4)?,
                first_tweet_date: parse_db_time_opt(row.get(5)?),
                last_tweet_date: parse_db_time_opt(row.get(6)?),
            })
        })?)
    }
}
