// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! SQLite persistence of users, bills and session cookies.

use crate::db::Database;
use crate::models::{Article, Bill, BillEntry, User};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// Money is kept as TEXT with two decimal places, so equal amounts always
/// map to the same `articles` row.
fn money_text(d: Decimal) -> String {
    let mut d = d.round_dp(2);
    d.rescale(2);
    d.to_string()
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn load_user(db: &Database, id: Uuid) -> rusqlite::Result<Option<User>> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT id, username, full_name, institution, level, balance FROM users WHERE id=?1",
            params![id.to_string()],
            |r| {
                Ok(User {
                    id: uuid_col(r, 0)?,
                    username: r.get(1)?,
                    full_name: r.get(2)?,
                    institution: r.get(3)?,
                    level: r.get(4)?,
                    balance: decimal_col(r, 5)?,
                })
            },
        )
        .optional()
    })
}

/// All bills of a user with their entries, oldest first.
pub fn load_bills(db: &Database, user_id: Uuid) -> rusqlite::Result<Vec<Bill>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT b.id, b.date_time, b.source, a.name, a.price, e.amount, e.subsidy
             FROM bills b
             LEFT JOIN bill_entries e ON e.bill_id=b.id
             LEFT JOIN articles a ON a.id=e.article_id
             WHERE b.user_id=?1
             ORDER BY b.date_time, b.id, e.id",
        )?;
        let mut rows = stmt.query(params![user_id.to_string()])?;
        let mut bills: Vec<Bill> = Vec::new();
        let mut last_id: Option<i64> = None;
        while let Some(r) = rows.next()? {
            let bill_id: i64 = r.get(0)?;
            if last_id != Some(bill_id) {
                let date_time: NaiveDateTime = r.get(1)?;
                bills.push(Bill {
                    date_time,
                    source: r.get(2)?,
                    user_id,
                    entries: Vec::new(),
                });
                last_id = Some(bill_id);
            }
            let name: Option<String> = r.get(3)?;
            if let (Some(name), Some(bill)) = (name, bills.last_mut()) {
                let amount: u32 = r.get(5)?;
                bill.entries.push(BillEntry::new(
                    Article::new(name, decimal_col(r, 4)?),
                    amount,
                    decimal_col(r, 6)?,
                ));
            }
        }
        Ok(bills)
    })
}

fn upsert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users(id, username, full_name, institution, level, balance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            username=excluded.username,
            full_name=excluded.full_name,
            institution=excluded.institution,
            level=excluded.level,
            balance=excluded.balance",
        params![
            user.id.to_string(),
            user.username,
            user.full_name,
            user.institution,
            user.level,
            money_text(user.balance)
        ],
    )?;
    Ok(())
}

fn insert_bill(conn: &Connection, user_id: Uuid, bill: &Bill) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bills(date_time, source, user_id) VALUES (?1, ?2, ?3)",
        params![bill.date_time, bill.source, user_id.to_string()],
    )?;
    let bill_id = conn.last_insert_rowid();
    for entry in &bill.entries {
        let price = money_text(entry.article.price);
        conn.execute(
            "INSERT OR IGNORE INTO articles(name, price) VALUES (?1, ?2)",
            params![entry.article.name, price],
        )?;
        let article_id: i64 = conn.query_row(
            "SELECT id FROM articles WHERE name=?1 AND price=?2",
            params![entry.article.name, price],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT INTO bill_entries(bill_id, article_id, amount, subsidy) VALUES (?1, ?2, ?3, ?4)",
            params![bill_id, article_id, entry.amount, money_text(entry.subsidy)],
        )?;
    }
    Ok(())
}

/// Saves the user and appends `bills` to them, all or nothing.
pub fn persist(db: &Database, user: &User, bills: &[Bill]) -> rusqlite::Result<()> {
    log::debug!("Saving data...");
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        upsert_user(&tx, user)?;
        for bill in bills {
            insert_bill(&tx, user.id, bill)?;
        }
        tx.commit()
    })?;
    log::debug!("Saved {} new bills.", bills.len());
    Ok(())
}

pub fn load_cookie_blobs(db: &Database) -> rusqlite::Result<Vec<Vec<u8>>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT content FROM cookies ORDER BY id")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        let out: rusqlite::Result<Vec<Vec<u8>>> = rows.collect();
        out
    })
}

pub fn replace_cookie_blobs(db: &Database, blobs: &[Vec<u8>]) -> rusqlite::Result<()> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cookies", [])?;
        for blob in blobs {
            tx.execute("INSERT INTO cookies(content) VALUES (?1)", params![blob])?;
        }
        tx.commit()
    })
}
