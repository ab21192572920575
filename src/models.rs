// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Username under which offline sample data is shown.
pub const SAMPLE_USERNAME: &str = "<SAMPLE_USER>";

const USER_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// Stable user id derived from the portal username.
pub fn user_id_for(username: &str) -> Uuid {
    Uuid::new_v3(&USER_NAMESPACE, username.as_bytes())
}

pub fn sample_user_id() -> Uuid {
    user_id_for(SAMPLE_USERNAME)
}

/// The identity believed to be logged on the portal in the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLogon {
    pub username: String,
}

impl UserLogon {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        user_id_for(&self.username)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginDetails {
    pub username: String,
    pub password: String,
}

impl LoginDetails {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginDetails")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub institution: String,
    pub level: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Article {
    pub name: String,
    pub price: Decimal,
}

impl Article {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillEntry {
    pub article: Article,
    pub amount: u32,
    pub subsidy: Decimal,
}

impl BillEntry {
    pub fn new(article: Article, amount: u32, subsidy: Decimal) -> Self {
        Self {
            article,
            amount,
            subsidy,
        }
    }

    pub fn total_value(&self) -> Decimal {
        self.article.price * Decimal::from(self.amount)
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_value() - self.subsidy
    }
}

/// A receipt-like record of one meal purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub date_time: NaiveDateTime,
    pub source: String,
    #[serde(skip, default = "sample_user_id")]
    pub user_id: Uuid,
    pub entries: Vec<BillEntry>,
}

impl Bill {
    pub fn date(&self) -> NaiveDate {
        self.date_time.date()
    }

    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.entries.iter().map(|e| &e.article)
    }

    pub fn article_count(&self) -> u32 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.entries.iter().map(BillEntry::total_value).sum()
    }

    pub fn total_subsidy(&self) -> Decimal {
        self.entries.iter().map(|e| e.subsidy).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.entries.iter().map(BillEntry::total_cost).sum()
    }

    /// Equality by content, ignoring the owning user.
    pub fn content_eq(&self, other: &Bill) -> bool {
        self.date_time == other.date_time
            && self.source == other.source
            && entries_match(&self.entries, &other.entries)
    }
}

/// Order-independent comparison of two entry lists. Repeated lines count.
pub fn entries_match(a: &[BillEntry], b: &[BillEntry]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&BillEntry, usize> = HashMap::new();
    for e in a {
        *counts.entry(e).or_default() += 1;
    }
    for e in b {
        match counts.get_mut(e) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return false,
        }
    }
    true
}

/// Bills from `incoming` that have no content-equal counterpart in `existing`.
pub fn new_by_content(existing: &[Bill], incoming: Vec<Bill>) -> Vec<Bill> {
    incoming
        .into_iter()
        .filter(|new| !existing.iter().any(|old| new.content_eq(old)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub bills: usize,
    pub articles: u32,
    pub value: Decimal,
    pub subsidy: Decimal,
    pub cost: Decimal,
}

pub fn totals(bills: &[Bill]) -> Totals {
    bills.iter().fold(Totals::default(), |mut t, b| {
        t.bills += 1;
        t.articles += b.article_count();
        t.value += b.total_value();
        t.subsidy += b.total_subsidy();
        t.cost += b.total_cost();
        t
    })
}
