// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{PortalError, PortalResult};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::time::Duration;

const UA: &str = concat!(
    "mealbills/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/mealbills)"
);

/// Date-time layout used by the portal, `d.M.yyyy. H:mm`.
pub const PORTAL_DATE_TIME_FORMAT: &str = "%d.%m.%Y. %H:%M";

static THOUSANDS_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\d{3})").unwrap());

/// The redirect policy is `none`: the browser follows redirects itself so it can
/// collect cookies on every hop.
pub fn http_client(timeout: Duration) -> PortalResult<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(UA)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(c)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Parses a portal number such as `12,50` or `1.234,50`.
pub fn parse_portal_decimal(s: &str) -> PortalResult<Decimal> {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    let normalized = if compact.contains(',') {
        THOUSANDS_DOT.replace_all(&compact, "$1").replace(',', ".")
    } else {
        compact
    };
    normalized
        .parse::<Decimal>()
        .map_err(|_| PortalError::Parse(format!("invalid decimal '{}'", s)))
}

/// Like [`parse_portal_decimal`], fixed to two decimal places.
pub fn parse_portal_money(s: &str) -> PortalResult<Decimal> {
    let mut d = parse_portal_decimal(s)?.round_dp(2);
    d.rescale(2);
    Ok(d)
}

pub fn parse_portal_date_time(date: &str, time: &str) -> PortalResult<NaiveDateTime> {
    let joined = format!("{}. {}", date.trim().trim_end_matches('.'), time.trim());
    NaiveDateTime::parse_from_str(&joined, PORTAL_DATE_TIME_FORMAT)
        .map_err(|_| PortalError::Parse(format!("invalid date-time '{}'", joined)))
}

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_decimal_is_normalized() {
        assert_eq!(parse_portal_decimal("12,50").unwrap(), Decimal::new(1250, 2));
        assert_eq!(parse_portal_decimal(" 0,5 ").unwrap(), Decimal::new(5, 1));
        assert_eq!(
            parse_portal_decimal("1.234,50").unwrap(),
            Decimal::new(123450, 2)
        );
        assert_eq!(parse_portal_decimal("3.75").unwrap(), Decimal::new(375, 2));
        assert!(parse_portal_decimal("n/a").is_err());
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(parse_portal_money("2").unwrap().to_string(), "2.00");
        assert_eq!(parse_portal_money("1,5").unwrap().to_string(), "1.50");
    }

    #[test]
    fn portal_date_time_accepts_unpadded_fields() {
        let dt = parse_portal_date_time("2.1.2024", "9:05").unwrap();
        assert_eq!(dt.to_string(), "2024-01-02 09:05:00");
        let dt = parse_portal_date_time("15.11.2023.", "13:40").unwrap();
        assert_eq!(dt.to_string(), "2023-11-15 13:40:00");
        assert!(parse_portal_date_time("yesterday", "noon").is_err());
    }
}
