//! SQLite-backed chat store via libsql.
//!
//! One database file (`streams.db`) in the data directory, WAL journal.
//! Every `begin()` opens its own connection and issues `BEGIN IMMEDIATE`, so
//! concurrent units of work serialize on the write lock (waiting up to the busy
//! timeout) instead of interleaving. A connection dropped without COMMIT is
//! closed and SQLite rolls its transaction back.

use crate::domain::{
    DefaultStreamGroup, DomainError, Message, NewStream, NewUser, OutgoingMessage, Realm,
    Recipient, Stream, StreamPostPolicy, Subscription, SystemGroup, TopicSummary, User, UserRole,
};
use crate::ports::{ChatStore, StoreTx};
use libsql::{params, Connection, Database, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REALM_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS realm (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    settings_json TEXT NOT NULL
)"#;

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    is_bot INTEGER NOT NULL DEFAULT 0,
    bot_owner_id INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    api_key TEXT NOT NULL UNIQUE
)"#;

const STREAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS streams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT NOT NULL DEFAULT '',
    invite_only INTEGER NOT NULL DEFAULT 0,
    is_web_public INTEGER NOT NULL DEFAULT 0,
    history_public_to_subscribers INTEGER NOT NULL DEFAULT 1,
    stream_post_policy INTEGER NOT NULL DEFAULT 1,
    message_retention_days INTEGER,
    can_administer_channel_group TEXT NOT NULL,
    can_remove_subscribers_group TEXT NOT NULL,
    email_token TEXT NOT NULL,
    deactivated INTEGER NOT NULL DEFAULT 0,
    date_created INTEGER NOT NULL,
    creator_id INTEGER
)"#;

const SUBSCRIPTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    user_id INTEGER NOT NULL,
    stream_id INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    color TEXT NOT NULL,
    is_muted INTEGER NOT NULL DEFAULT 0,
    pin_to_top INTEGER NOT NULL DEFAULT 0,
    desktop_notifications INTEGER,
    audible_notifications INTEGER,
    push_notifications INTEGER,
    email_notifications INTEGER,
    wildcard_mentions_notify INTEGER,
    joined_after_message_id INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, stream_id)
)"#;
const SUBSCRIPTIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_subscriptions_stream ON subscriptions (stream_id, active)";

const DEFAULT_STREAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS default_streams (
    stream_id INTEGER PRIMARY KEY
)"#;

const DEFAULT_STREAM_GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS default_stream_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT NOT NULL DEFAULT ''
)"#;

const DEFAULT_STREAM_GROUP_MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS default_stream_group_streams (
    group_id INTEGER NOT NULL,
    stream_id INTEGER NOT NULL,
    PRIMARY KEY (group_id, stream_id)
)"#;

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id INTEGER NOT NULL,
    stream_id INTEGER,
    topic TEXT,
    -- Unicode-folded topic; SQLite's lower() folds ASCII only.
    topic_key TEXT,
    recipient_user_id INTEGER,
    content TEXT NOT NULL,
    date_sent INTEGER NOT NULL
)"#;
const MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_stream_topic ON messages (stream_id, topic_key)";

const STREAM_COLUMNS: &str = "id, name, description, invite_only, is_web_public, \
    history_public_to_subscribers, stream_post_policy, message_retention_days, \
    can_administer_channel_group, can_remove_subscribers_group, email_token, deactivated, \
    date_created, creator_id";

const SUBSCRIPTION_COLUMNS: &str = "user_id, stream_id, active, color, is_muted, pin_to_top, \
    desktop_notifications, audible_notifications, push_notifications, email_notifications, \
    wildcard_mentions_notify, joined_after_message_id";

const USER_COLUMNS: &str = "id, email, full_name, role, is_bot, bot_owner_id, is_active, api_key";

const MESSAGE_COLUMNS: &str =
    "id, sender_id, stream_id, topic, recipient_user_id, content, date_sent";

/// Milliseconds a writer waits for the lock held by another unit of work.
const BUSY_TIMEOUT_MS: u64 = 5000;

fn db_err(e: libsql::Error) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// SQLite store. Safe to share via Arc; each transaction gets its own connection.
pub struct SqliteStore {
    db: Database,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Connect to (or create) `streams.db` under `base_dir` and ensure the schema exists.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("streams.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        // PRAGMA returns a row; use query and drain it (execute fails on returned rows).
        pragma(&conn, "PRAGMA journal_mode=WAL").await?;
        pragma(&conn, "PRAGMA synchronous=NORMAL").await?;

        for ddl in [
            REALM_TABLE,
            USERS_TABLE,
            STREAMS_TABLE,
            SUBSCRIPTIONS_TABLE,
            SUBSCRIPTIONS_INDEX,
            DEFAULT_STREAMS_TABLE,
            DEFAULT_STREAM_GROUPS_TABLE,
            DEFAULT_STREAM_GROUP_MEMBERS_TABLE,
            MESSAGES_TABLE,
            MESSAGES_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");
        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

async fn pragma(conn: &Connection, sql: &str) -> Result<(), DomainError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DomainError::Repo(format!("{} failed: {}", sql, e)))?;
    while rows.next().await.map_err(db_err)?.is_some() {}
    Ok(())
}

#[async_trait::async_trait]
impl ChatStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        pragma(&conn, &format!("PRAGMA busy_timeout={}", BUSY_TIMEOUT_MS)).await?;
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(db_err)?;
        Ok(Box::new(SqliteTx { conn }))
    }
}

/// Open `BEGIN IMMEDIATE` transaction on a dedicated connection.
pub struct SqliteTx {
    conn: Connection,
}

fn flag(row: &Row, idx: i32) -> Result<bool, DomainError> {
    Ok(row.get::<i64>(idx).map_err(db_err)? != 0)
}

fn opt_flag(row: &Row, idx: i32) -> Result<Option<bool>, DomainError> {
    Ok(row.get::<Option<i64>>(idx).map_err(db_err)?.map(|v| v != 0))
}

fn group(row: &Row, idx: i32) -> Result<SystemGroup, DomainError> {
    let raw: String = row.get(idx).map_err(db_err)?;
    SystemGroup::parse(&raw)
        .ok_or_else(|| DomainError::Repo(format!("unknown permission group '{}'", raw)))
}

fn row_to_user(row: &Row) -> Result<User, DomainError> {
    let role: String = row.get(3).map_err(db_err)?;
    Ok(User {
        id: row.get(0).map_err(db_err)?,
        email: row.get(1).map_err(db_err)?,
        full_name: row.get(2).map_err(db_err)?,
        role: UserRole::parse(&role)
            .ok_or_else(|| DomainError::Repo(format!("unknown role '{}'", role)))?,
        is_bot: flag(row, 4)?,
        bot_owner_id: row.get(5).map_err(db_err)?,
        is_active: flag(row, 6)?,
        api_key: row.get(7).map_err(db_err)?,
    })
}

fn row_to_stream(row: &Row) -> Result<Stream, DomainError> {
    let policy: i64 = row.get(6).map_err(db_err)?;
    let retention: Option<i64> = row.get(7).map_err(db_err)?;
    Ok(Stream {
        id: row.get(0).map_err(db_err)?,
        name: row.get(1).map_err(db_err)?,
        description: row.get(2).map_err(db_err)?,
        invite_only: flag(row, 3)?,
        is_web_public: flag(row, 4)?,
        history_public_to_subscribers: flag(row, 5)?,
        stream_post_policy: StreamPostPolicy::try_from(policy as u8).map_err(DomainError::Repo)?,
        message_retention_days: retention.map(|d| d as i32),
        can_administer_channel_group: group(row, 8)?,
        can_remove_subscribers_group: group(row, 9)?,
        email_token: row.get(10).map_err(db_err)?,
        deactivated: flag(row, 11)?,
        date_created: row.get(12).map_err(db_err)?,
        creator_id: row.get(13).map_err(db_err)?,
    })
}

fn row_to_subscription(row: &Row) -> Result<Subscription, DomainError> {
    Ok(Subscription {
        user_id: row.get(0).map_err(db_err)?,
        stream_id: row.get(1).map_err(db_err)?,
        active: flag(row, 2)?,
        color: row.get(3).map_err(db_err)?,
        is_muted: flag(row, 4)?,
        pin_to_top: flag(row, 5)?,
        desktop_notifications: opt_flag(row, 6)?,
        audible_notifications: opt_flag(row, 7)?,
        push_notifications: opt_flag(row, 8)?,
        email_notifications: opt_flag(row, 9)?,
        wildcard_mentions_notify: opt_flag(row, 10)?,
        joined_after_message_id: row.get(11).map_err(db_err)?,
    })
}

fn row_to_message(row: &Row) -> Result<Message, DomainError> {
    let stream_id: Option<i64> = row.get(2).map_err(db_err)?;
    let topic: Option<String> = row.get(3).map_err(db_err)?;
    let recipient_user_id: Option<i64> = row.get(4).map_err(db_err)?;
    let recipient = match (stream_id, recipient_user_id) {
        (Some(stream_id), _) => Recipient::Stream {
            stream_id,
            topic: topic.unwrap_or_default(),
        },
        (None, Some(user_id)) => Recipient::Direct { user_id },
        (None, None) => {
            return Err(DomainError::Repo("message without recipient".to_string()));
        }
    };
    Ok(Message {
        id: row.get(0).map_err(db_err)?,
        sender_id: row.get(1).map_err(db_err)?,
        recipient,
        content: row.get(5).map_err(db_err)?,
        date_sent: row.get(6).map_err(db_err)?,
    })
}

fn opt_bool(v: Option<bool>) -> Option<i64> {
    v.map(i64::from)
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl SqliteTx {
    async fn query_one<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        map: fn(&Row) -> Result<T, DomainError>,
    ) -> Result<Option<T>, DomainError> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(map(&row)?)),
            None => Ok(None),
        }
    }

    async fn query_all<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        map: fn(&Row) -> Result<T, DomainError>,
    ) -> Result<Vec<T>, DomainError> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(map(&row)?);
        }
        Ok(out)
    }

    async fn group_stream_ids(&self, group_id: i64) -> Result<Vec<i64>, DomainError> {
        self.query_all(
            "SELECT stream_id FROM default_stream_group_streams WHERE group_id = ?1 ORDER BY stream_id",
            params![group_id],
            |row| row.get::<i64>(0).map_err(db_err),
        )
        .await
    }

    async fn with_streams(
        &self,
        groups: Vec<(i64, String, String)>,
    ) -> Result<Vec<DefaultStreamGroup>, DomainError> {
        let mut out = Vec::with_capacity(groups.len());
        for (id, name, description) in groups {
            let stream_ids = self.group_stream_ids(id).await?;
            out.push(DefaultStreamGroup {
                id,
                name,
                description,
                stream_ids,
            });
        }
        Ok(out)
    }
}

fn row_to_group_header(row: &Row) -> Result<(i64, String, String), DomainError> {
    Ok((
        row.get(0).map_err(db_err)?,
        row.get(1).map_err(db_err)?,
        row.get(2).map_err(db_err)?,
    ))
}

#[async_trait::async_trait]
impl StoreTx for SqliteTx {
    async fn realm(&mut self) -> Result<Realm, DomainError> {
        let json = self
            .query_one("SELECT settings_json FROM realm WHERE id = 1", (), |row| {
                row.get::<String>(0).map_err(db_err)
            })
            .await?;
        match json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| DomainError::Repo(format!("corrupt realm settings: {}", e))),
            None => Ok(Realm::default()),
        }
    }

    async fn save_realm(&mut self, realm: &Realm) -> Result<(), DomainError> {
        let json = serde_json::to_string(realm).map_err(|e| DomainError::Repo(e.to_string()))?;
        self.conn
            .execute(
                r#"
                INSERT INTO realm (id, settings_json) VALUES (1, ?1)
                ON CONFLICT (id) DO UPDATE SET settings_json = excluded.settings_json
                "#,
                params![json],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        self.query_one(&sql, params![id], row_to_user).await
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        self.query_one(&sql, params![email], row_to_user).await
    }

    async fn user_by_api_key(&mut self, api_key: &str) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {} FROM users WHERE api_key = ?1", USER_COLUMNS);
        self.query_one(&sql, params![api_key], row_to_user).await
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, DomainError> {
        let api_key = new_token();
        self.conn
            .execute(
                r#"
                INSERT INTO users (email, full_name, role, is_bot, bot_owner_id, is_active, api_key)
                VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                "#,
                params![
                    user.email.as_str(),
                    user.full_name.as_str(),
                    user.role.as_str(),
                    i64::from(user.is_bot),
                    user.bot_owner_id,
                    api_key.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        let id = self.conn.last_insert_rowid();
        debug!(user_id = id, email = %user.email, "user created");
        Ok(User {
            id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            is_bot: user.is_bot,
            bot_owner_id: user.bot_owner_id,
            is_active: true,
            api_key,
        })
    }

    async fn count_users(&mut self) -> Result<i64, DomainError> {
        let count = self
            .query_one("SELECT COUNT(*) FROM users", (), |row| {
                row.get::<i64>(0).map_err(db_err)
            })
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn stream_by_id(&mut self, id: i64) -> Result<Option<Stream>, DomainError> {
        let sql = format!("SELECT {} FROM streams WHERE id = ?1", STREAM_COLUMNS);
        self.query_one(&sql, params![id], row_to_stream).await
    }

    async fn stream_by_name(&mut self, name: &str) -> Result<Option<Stream>, DomainError> {
        let sql = format!("SELECT {} FROM streams WHERE name = ?1", STREAM_COLUMNS);
        self.query_one(&sql, params![name], row_to_stream).await
    }

    async fn insert_stream(&mut self, stream: &NewStream) -> Result<Stream, DomainError> {
        let email_token = new_token();
        let date_created = chrono::Utc::now().timestamp();
        self.conn
            .execute(
                r#"
                INSERT INTO streams (
                    name, description, invite_only, is_web_public, history_public_to_subscribers,
                    stream_post_policy, message_retention_days, can_administer_channel_group,
                    can_remove_subscribers_group, email_token, deactivated, date_created, creator_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)
                "#,
                params![
                    stream.name.as_str(),
                    stream.description.as_str(),
                    i64::from(stream.invite_only),
                    i64::from(stream.is_web_public),
                    i64::from(stream.history_public_to_subscribers),
                    i64::from(u8::from(stream.stream_post_policy)),
                    stream.message_retention_days.map(i64::from),
                    stream.can_administer_channel_group.as_str(),
                    stream.can_remove_subscribers_group.as_str(),
                    email_token.as_str(),
                    date_created,
                    stream.creator_id
                ],
            )
            .await
            .map_err(db_err)?;
        let id = self.conn.last_insert_rowid();
        debug!(stream_id = id, name = %stream.name, "stream created");
        Ok(Stream {
            id,
            name: stream.name.clone(),
            description: stream.description.clone(),
            invite_only: stream.invite_only,
            is_web_public: stream.is_web_public,
            history_public_to_subscribers: stream.history_public_to_subscribers,
            stream_post_policy: stream.stream_post_policy,
            message_retention_days: stream.message_retention_days,
            can_administer_channel_group: stream.can_administer_channel_group,
            can_remove_subscribers_group: stream.can_remove_subscribers_group,
            email_token,
            deactivated: false,
            date_created,
            creator_id: stream.creator_id,
        })
    }

    async fn update_stream(&mut self, stream: &Stream) -> Result<(), DomainError> {
        self.conn
            .execute(
                r#"
                UPDATE streams SET
                    name = ?2, description = ?3, invite_only = ?4, is_web_public = ?5,
                    history_public_to_subscribers = ?6, stream_post_policy = ?7,
                    message_retention_days = ?8, can_administer_channel_group = ?9,
                    can_remove_subscribers_group = ?10, deactivated = ?11
                WHERE id = ?1
                "#,
                params![
                    stream.id,
                    stream.name.as_str(),
                    stream.description.as_str(),
                    i64::from(stream.invite_only),
                    i64::from(stream.is_web_public),
                    i64::from(stream.history_public_to_subscribers),
                    i64::from(u8::from(stream.stream_post_policy)),
                    stream.message_retention_days.map(i64::from),
                    stream.can_administer_channel_group.as_str(),
                    stream.can_remove_subscribers_group.as_str(),
                    i64::from(stream.deactivated)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_streams(&mut self) -> Result<Vec<Stream>, DomainError> {
        let sql = format!("SELECT {} FROM streams ORDER BY id", STREAM_COLUMNS);
        self.query_all(&sql, (), row_to_stream).await
    }

    async fn subscription(
        &mut self,
        user_id: i64,
        stream_id: i64,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND stream_id = ?2",
            SUBSCRIPTION_COLUMNS
        );
        self.query_one(&sql, params![user_id, stream_id], row_to_subscription)
            .await
    }

    async fn subscriptions_for_user(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND active = 1 ORDER BY stream_id",
            SUBSCRIPTION_COLUMNS
        );
        self.query_all(&sql, params![user_id], row_to_subscription)
            .await
    }

    async fn subscriber_ids(&mut self, stream_id: i64) -> Result<Vec<i64>, DomainError> {
        self.query_all(
            "SELECT user_id FROM subscriptions WHERE stream_id = ?1 AND active = 1 ORDER BY user_id",
            params![stream_id],
            |row| row.get::<i64>(0).map_err(db_err),
        )
        .await
    }

    async fn upsert_subscription(&mut self, sub: &Subscription) -> Result<(), DomainError> {
        self.conn
            .execute(
                r#"
                INSERT INTO subscriptions (
                    user_id, stream_id, active, color, is_muted, pin_to_top,
                    desktop_notifications, audible_notifications, push_notifications,
                    email_notifications, wildcard_mentions_notify, joined_after_message_id
                ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT (user_id, stream_id) DO UPDATE SET
                    active = 1,
                    joined_after_message_id = excluded.joined_after_message_id
                "#,
                params![
                    sub.user_id,
                    sub.stream_id,
                    sub.color.as_str(),
                    i64::from(sub.is_muted),
                    i64::from(sub.pin_to_top),
                    opt_bool(sub.desktop_notifications),
                    opt_bool(sub.audible_notifications),
                    opt_bool(sub.push_notifications),
                    opt_bool(sub.email_notifications),
                    opt_bool(sub.wildcard_mentions_notify),
                    sub.joined_after_message_id
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn deactivate_subscription(
        &mut self,
        user_id: i64,
        stream_id: i64,
    ) -> Result<(), DomainError> {
        self.conn
            .execute(
                "UPDATE subscriptions SET active = 0 WHERE user_id = ?1 AND stream_id = ?2",
                params![user_id, stream_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_subscription(&mut self, sub: &Subscription) -> Result<(), DomainError> {
        self.conn
            .execute(
                r#"
                UPDATE subscriptions SET
                    color = ?3, is_muted = ?4, pin_to_top = ?5, desktop_notifications = ?6,
                    audible_notifications = ?7, push_notifications = ?8,
                    email_notifications = ?9, wildcard_mentions_notify = ?10
                WHERE user_id = ?1 AND stream_id = ?2
                "#,
                params![
                    sub.user_id,
                    sub.stream_id,
                    sub.color.as_str(),
                    i64::from(sub.is_muted),
                    i64::from(sub.pin_to_top),
                    opt_bool(sub.desktop_notifications),
                    opt_bool(sub.audible_notifications),
                    opt_bool(sub.push_notifications),
                    opt_bool(sub.email_notifications),
                    opt_bool(sub.wildcard_mentions_notify)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn default_stream_ids(&mut self) -> Result<Vec<i64>, DomainError> {
        self.query_all(
            "SELECT stream_id FROM default_streams ORDER BY stream_id",
            (),
            |row| row.get::<i64>(0).map_err(db_err),
        )
        .await
    }

    async fn add_default_stream(&mut self, stream_id: i64) -> Result<(), DomainError> {
        self.conn
            .execute(
                "INSERT INTO default_streams (stream_id) VALUES (?1) ON CONFLICT DO NOTHING",
                params![stream_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove_default_stream(&mut self, stream_id: i64) -> Result<(), DomainError> {
        self.conn
            .execute(
                "DELETE FROM default_streams WHERE stream_id = ?1",
                params![stream_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn default_stream_groups(&mut self) -> Result<Vec<DefaultStreamGroup>, DomainError> {
        let headers = self
            .query_all(
                "SELECT id, name, description FROM default_stream_groups ORDER BY id",
                (),
                row_to_group_header,
            )
            .await?;
        self.with_streams(headers).await
    }

    async fn default_stream_group(
        &mut self,
        id: i64,
    ) -> Result<Option<DefaultStreamGroup>, DomainError> {
        let headers = self
            .query_all(
                "SELECT id, name, description FROM default_stream_groups WHERE id = ?1",
                params![id],
                row_to_group_header,
            )
            .await?;
        Ok(self.with_streams(headers).await?.pop())
    }

    async fn default_stream_group_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<DefaultStreamGroup>, DomainError> {
        let headers = self
            .query_all(
                "SELECT id, name, description FROM default_stream_groups WHERE name = ?1",
                params![name],
                row_to_group_header,
            )
            .await?;
        Ok(self.with_streams(headers).await?.pop())
    }

    async fn insert_default_stream_group(
        &mut self,
        name: &str,
        description: &str,
        stream_ids: &[i64],
    ) -> Result<DefaultStreamGroup, DomainError> {
        self.conn
            .execute(
                "INSERT INTO default_stream_groups (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .await
            .map_err(db_err)?;
        let group = DefaultStreamGroup {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            stream_ids: stream_ids.to_vec(),
        };
        self.update_default_stream_group(&group).await?;
        Ok(group)
    }

    async fn update_default_stream_group(
        &mut self,
        group: &DefaultStreamGroup,
    ) -> Result<(), DomainError> {
        self.conn
            .execute(
                "UPDATE default_stream_groups SET name = ?2, description = ?3 WHERE id = ?1",
                params![group.id, group.name.as_str(), group.description.as_str()],
            )
            .await
            .map_err(db_err)?;
        self.conn
            .execute(
                "DELETE FROM default_stream_group_streams WHERE group_id = ?1",
                params![group.id],
            )
            .await
            .map_err(db_err)?;
        for stream_id in &group.stream_ids {
            self.conn
                .execute(
                    r#"
                    INSERT INTO default_stream_group_streams (group_id, stream_id)
                    VALUES (?1, ?2) ON CONFLICT DO NOTHING
                    "#,
                    params![group.id, *stream_id],
                )
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn delete_default_stream_group(&mut self, id: i64) -> Result<(), DomainError> {
        self.conn
            .execute(
                "DELETE FROM default_stream_group_streams WHERE group_id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;
        self.conn
            .execute("DELETE FROM default_stream_groups WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_message(&mut self, message: &OutgoingMessage) -> Result<i64, DomainError> {
        let (stream_id, topic, recipient_user_id) = match &message.recipient {
            Recipient::Stream { stream_id, topic } => (Some(*stream_id), Some(topic.as_str()), None),
            Recipient::Direct { user_id } => (None, None, Some(*user_id)),
        };
        let topic_key = topic.map(str::to_lowercase);
        self.conn
            .execute(
                r#"
                INSERT INTO messages (sender_id, stream_id, topic, topic_key, recipient_user_id, content, date_sent)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    message.sender_id,
                    stream_id,
                    topic,
                    topic_key,
                    recipient_user_id,
                    message.content.as_str(),
                    chrono::Utc::now().timestamp()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn max_message_id(&mut self) -> Result<i64, DomainError> {
        let max = self
            .query_one("SELECT COALESCE(MAX(id), 0) FROM messages", (), |row| {
                row.get::<i64>(0).map_err(db_err)
            })
            .await?;
        Ok(max.unwrap_or(0))
    }

    async fn topics(
        &mut self,
        stream_id: i64,
        min_id: i64,
    ) -> Result<Vec<TopicSummary>, DomainError> {
        // Bare `topic` takes its value from the row holding MAX(id).
        self.query_all(
            r#"
            SELECT topic, MAX(id) AS max_id FROM messages
            WHERE stream_id = ?1 AND id > ?2
            GROUP BY topic_key
            ORDER BY max_id DESC
            "#,
            params![stream_id, min_id],
            |row| {
                Ok(TopicSummary {
                    name: row.get::<Option<String>>(0).map_err(db_err)?.unwrap_or_default(),
                    max_id: row.get(1).map_err(db_err)?,
                })
            },
        )
        .await
    }

    async fn topic_message_ids(
        &mut self,
        stream_id: i64,
        topic: &str,
        min_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>, DomainError> {
        self.query_all(
            r#"
            SELECT id FROM messages
            WHERE stream_id = ?1 AND topic_key = ?2 AND id > ?3
            ORDER BY id DESC
            LIMIT ?4
            "#,
            params![stream_id, topic.to_lowercase(), min_id, limit as i64],
            |row| row.get::<i64>(0).map_err(db_err),
        )
        .await
    }

    async fn delete_messages(&mut self, ids: &[i64]) -> Result<(), DomainError> {
        for id in ids {
            self.conn
                .execute("DELETE FROM messages WHERE id = ?1", params![*id])
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn stream_messages(&mut self, stream_id: i64) -> Result<Vec<Message>, DomainError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE stream_id = ?1 ORDER BY id",
            MESSAGE_COLUMNS
        );
        self.query_all(&sql, params![stream_id], row_to_message).await
    }

    async fn direct_messages_to(&mut self, user_id: i64) -> Result<Vec<Message>, DomainError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE recipient_user_id = ?1 ORDER BY id",
            MESSAGE_COLUMNS
        );
        self.query_all(&sql, params![user_id], row_to_message).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.conn.execute("COMMIT", ()).await.map_err(db_err)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.conn.execute("ROLLBACK", ()).await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path()).await.unwrap();
        (dir, store)
    }

    fn new_stream(name: &str) -> NewStream {
        NewStream {
            name: name.to_string(),
            description: String::new(),
            invite_only: false,
            is_web_public: false,
            history_public_to_subscribers: true,
            stream_post_policy: StreamPostPolicy::Everyone,
            message_retention_days: None,
            can_administer_channel_group: SystemGroup::Administrators,
            can_remove_subscribers_group: SystemGroup::Administrators,
            creator_id: None,
        }
    }

    fn subscription(user_id: i64, stream_id: i64, color: &str) -> Subscription {
        Subscription {
            user_id,
            stream_id,
            active: true,
            color: color.to_string(),
            is_muted: false,
            pin_to_top: false,
            desktop_notifications: None,
            audible_notifications: None,
            push_notifications: None,
            email_notifications: None,
            wildcard_mentions_notify: None,
            joined_after_message_id: 0,
        }
    }

    #[tokio::test]
    async fn test_stream_lookup_is_case_insensitive() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let created = tx.insert_stream(&new_stream("Design")).await.unwrap();
        let found = tx.stream_by_name("design").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(tx.insert_stream(&new_stream("DESIGN")).await.is_err());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (_dir, store) = store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_stream(&new_stream("ephemeral")).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.stream_by_name("ephemeral").await.unwrap().is_none());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_reactivates_and_keeps_properties() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let stream = tx.insert_stream(&new_stream("ops")).await.unwrap();
        let mut sub = subscription(7, stream.id, "#76ce90");
        tx.upsert_subscription(&sub).await.unwrap();
        sub.is_muted = true;
        tx.update_subscription(&sub).await.unwrap();
        tx.deactivate_subscription(7, stream.id).await.unwrap();
        assert!(tx.subscriber_ids(stream.id).await.unwrap().is_empty());

        tx.upsert_subscription(&subscription(7, stream.id, "#000000"))
            .await
            .unwrap();
        let row = tx.subscription(7, stream.id).await.unwrap().unwrap();
        assert!(row.active);
        assert!(row.is_muted);
        assert_eq!(row.color, "#76ce90");
        assert_eq!(tx.subscriber_ids(stream.id).await.unwrap(), vec![7]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_topics_grouped_case_insensitively() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let stream = tx.insert_stream(&new_stream("general")).await.unwrap();
        for topic in ["lunch", "Lunch", "deploys"] {
            tx.insert_message(&OutgoingMessage {
                sender_id: 1,
                recipient: Recipient::Stream {
                    stream_id: stream.id,
                    topic: topic.to_string(),
                },
                content: "hi".to_string(),
            })
            .await
            .unwrap();
        }
        let topics = tx.topics(stream.id, 0).await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "deploys");
        assert_eq!(topics[1].name, "Lunch");
        assert_eq!(topics[1].max_id, 2);

        let ids = tx
            .topic_message_ids(stream.id, "LUNCH", 0, 10)
            .await
            .unwrap();
        assert_eq!(ids, vec![2, 1]);
        assert!(tx.topics(stream.id, 3).await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_ascii_topics_fold_together() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let stream = tx.insert_stream(&new_stream("general")).await.unwrap();
        for topic in ["Ärger", "ärger", "ÄRGER"] {
            tx.insert_message(&OutgoingMessage {
                sender_id: 1,
                recipient: Recipient::Stream {
                    stream_id: stream.id,
                    topic: topic.to_string(),
                },
                content: "hi".to_string(),
            })
            .await
            .unwrap();
        }
        let topics = tx.topics(stream.id, 0).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "ÄRGER");

        let ids = tx
            .topic_message_ids(stream.id, "ärger", 0, 10)
            .await
            .unwrap();
        assert_eq!(ids, vec![3, 2, 1]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_stream_groups_round_trip() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let a = tx.insert_stream(&new_stream("a")).await.unwrap();
        let b = tx.insert_stream(&new_stream("b")).await.unwrap();
        let mut group = tx
            .insert_default_stream_group("Engineering", "eng", &[a.id])
            .await
            .unwrap();
        group.stream_ids.push(b.id);
        group.name = "Eng".to_string();
        tx.update_default_stream_group(&group).await.unwrap();

        let loaded = tx.default_stream_group_by_name("eng").await.unwrap().unwrap();
        assert_eq!(loaded.stream_ids, vec![a.id, b.id]);
        tx.delete_default_stream_group(group.id).await.unwrap();
        assert!(tx.default_stream_groups().await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_realm_defaults_until_saved() {
        let (_dir, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.realm().await.unwrap().name, "Chat");
        let realm = Realm {
            name: "Zephyr".into(),
            legacy_mirror_realm: true,
            ..Realm::default()
        };
        tx.save_realm(&realm).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.realm().await.unwrap().legacy_mirror_realm);
        tx.rollback().await.unwrap();
    }
}
