// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Extraction of the few fields the portal's pages carry.

use crate::error::{PortalError, PortalResult};
use crate::html;
use crate::models::{Article, BillEntry};
use crate::utils::{parse_portal_date_time, parse_portal_money};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use rust_decimal::Decimal;

static OIB: Lazy<Regex> = Lazy::new(|| Regex::new(r"OIB:\s*(\d+)").unwrap());

/// Profile fields shown on the student page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub full_name: String,
    pub institution: String,
    pub level: String,
    pub balance: Decimal,
}

/// One row of the bills listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillRow {
    pub source: String,
    pub date_time: NaiveDateTime,
    pub details_href: String,
}

/// Message of the login form's `.error` element, if it says anything.
pub fn parse_login_error(page: &str) -> Option<String> {
    ["div", "p", "span"]
        .iter()
        .filter_map(|tag| html::find_block(page, tag, "class", "error"))
        .map(html::text)
        .find(|t| !t.is_empty())
}

/// The national identification number printed on the student page.
pub fn parse_oib(page: &str) -> Option<String> {
    let text = html::normalize_ws(&html::normalize_entities(&html::strip_tags(page)));
    OIB.captures(&text).map(|c| c[1].to_string())
}

pub fn parse_profile(page: &str) -> PortalResult<ProfileFields> {
    let content = html::find_block(page, "div", "id", "mainDivContent")
        .ok_or_else(|| PortalError::Parse("profile content not found".into()))?;
    let info = html::find_block(content, "div", "class", "col-7")
        .ok_or_else(|| PortalError::Parse("profile info block not found".into()))?;

    let full_name = html::blocks(info, "h2")
        .first()
        .map(|h| html::text(h))
        .ok_or_else(|| PortalError::Parse("profile name not found".into()))?;

    // institution, then label/value pairs for level and balance
    let paragraphs: Vec<String> = html::all_blocks(info, "p").into_iter().map(html::text).collect();
    if paragraphs.len() < 5 {
        return Err(PortalError::Parse(format!(
            "expected at least 5 profile paragraphs, found {}",
            paragraphs.len()
        )));
    }
    let institution = match paragraphs[0].split_once(": ") {
        Some((_, after)) => after.to_string(),
        None => paragraphs[0].clone(),
    };
    let balance_text = paragraphs[4].split(' ').next().unwrap_or_default();

    Ok(ProfileFields {
        full_name,
        institution,
        level: paragraphs[2].clone(),
        balance: parse_portal_money(balance_text)?,
    })
}

/// The `?…` query that selects the user's bills listing, taken from the
/// profile page's link to it.
pub fn parse_bills_identifier(page: &str, bills_base_url: &str) -> Option<String> {
    let target = Url::parse(bills_base_url)
        .ok()
        .and_then(|u| u.path_segments()?.filter(|s| !s.is_empty()).last().map(str::to_string))?;
    let target = html::to_lowercase_fast(&target);
    html::blocks(page, "a")
        .into_iter()
        .filter_map(|a| html::attr(a, "href"))
        .filter(|href| html::to_lowercase_fast(href).contains(&target))
        .find_map(|href| href.split_once('?').map(|(_, query)| format!("?{}", query)))
}

fn first_table(page: &str) -> PortalResult<&str> {
    html::blocks(page, "table")
        .into_iter()
        .next()
        .ok_or_else(|| PortalError::Parse("no table on the page".into()))
}

fn cells(row: &str) -> Vec<String> {
    html::blocks(row, "td").into_iter().map(html::text).collect()
}

/// Rows of the bills listing in page order, header skipped.
pub fn parse_bill_rows(page: &str) -> PortalResult<Vec<BillRow>> {
    let table = first_table(page)?;
    html::blocks(table, "tr")
        .into_iter()
        .skip(1)
        .map(|row| {
            let c = cells(row);
            if c.len() < 3 {
                return Err(PortalError::Parse(format!("bill row has {} cells", c.len())));
            }
            let details_href = html::blocks(row, "a")
                .first()
                .and_then(|a| html::attr(a, "href"))
                .ok_or_else(|| PortalError::Parse("bill row has no details link".into()))?;
            Ok(BillRow {
                source: c[0].clone(),
                date_time: parse_portal_date_time(&c[1], &c[2])?,
                details_href,
            })
        })
        .collect()
}

/// Line items of a bill details page. The first row is the header and the
/// last one holds the totals.
pub fn parse_bill_entries(page: &str) -> PortalResult<Vec<BillEntry>> {
    let table = first_table(page)?;
    let rows = html::blocks(table, "tr");
    if rows.len() < 2 {
        return Ok(Vec::new());
    }
    rows[1..rows.len() - 1]
        .iter()
        .map(|row| {
            let c = cells(row);
            if c.len() < 5 {
                return Err(PortalError::Parse(format!("bill entry row has {} cells", c.len())));
            }
            let amount = c[1]
                .parse::<u32>()
                .map_err(|_| PortalError::Parse(format!("invalid amount '{}'", c[1])))?;
            Ok(BillEntry::new(
                Article::new(c[0].clone(), parse_portal_money(&c[2])?),
                amount,
                parse_portal_money(&c[4])?,
            ))
        })
        .collect()
}
