// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::Database;
use rusqlite::{params, OptionalExtension};

pub const AUTO_LOGIN: &str = "auto_login";
pub const SAVED_USERNAME: &str = "user_id";
pub const SAVED_PASSWORD: &str = "al_pwd";
pub const USER_CREDENTIALS: &str = "user_credentials";
pub const LOWER_DATE_BOUND: &str = "lower_date_bound";
pub const UPPER_DATE_BOUND: &str = "upper_date_bound";
/// Id of the user whose stored bills the terminal commands show.
pub const LAST_USER: &str = "last_user";

/// Upper date bound value meaning "follow the newest bill".
pub const LATEST_UPPER_BOUND: &str = "latest";

/// Preference store backed by the `settings` table.
#[derive(Clone)]
pub struct Prefs {
    db: Database,
}

impl Prefs {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key=?1",
                params![key],
                |r| r.get(0),
            )
            .optional()
        })
    }

    pub fn get_or(&self, key: &str, default: &str) -> rusqlite::Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings(key, value) VALUES(?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn auto_login(&self) -> rusqlite::Result<bool> {
        Ok(self.get(AUTO_LOGIN)?.as_deref() == Some("true"))
    }

    pub fn set_auto_login(&self, enabled: bool) -> rusqlite::Result<()> {
        self.set(AUTO_LOGIN, if enabled { "true" } else { "false" })
    }

    pub fn lower_date_bound(&self) -> rusqlite::Result<String> {
        self.get_or(LOWER_DATE_BOUND, "")
    }

    pub fn upper_date_bound(&self) -> rusqlite::Result<String> {
        self.get_or(UPPER_DATE_BOUND, "")
    }

    pub fn all(&self) -> rusqlite::Result<Vec<(String, String)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
            let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
            let out: rusqlite::Result<Vec<(String, String)>> = rows.collect();
            out
        })
    }
}
