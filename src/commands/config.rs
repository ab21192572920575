// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::Database;
use crate::prefs::{self, Prefs};
use crate::utils::pretty_table;
use crate::web::{self, PortalConfig};
use anyhow::{bail, Context, Result};
use reqwest::Url;

const SECRET_KEYS: [&str; 3] = [prefs::SAVED_USERNAME, prefs::SAVED_PASSWORD, prefs::USER_CREDENTIALS];

pub fn handle(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    let prefs = Prefs::new(db.clone());
    match m.subcommand() {
        Some(("set-url", sub)) => set_url(&prefs, sub)?,
        _ => show(&prefs)?,
    }
    Ok(())
}

fn url_key(name: &str) -> Option<&'static str> {
    match name {
        "base" => Some(web::URL_BASE),
        "login" => Some(web::URL_LOGIN_BASE),
        "logout" => Some(web::URL_LOGOUT),
        "student" => Some(web::URL_STUDENT),
        "bills" => Some(web::URL_BILLS_BASE),
        _ => None,
    }
}

fn set_url(prefs: &Prefs, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("key").map(String::as_str).unwrap_or_default();
    let Some(key) = url_key(name) else {
        bail!("Unknown URL key '{}'", name);
    };
    let value = sub.get_one::<String>("value").map(|s| s.trim()).unwrap_or_default();
    Url::parse(value).with_context(|| format!("Invalid URL '{}'", value))?;
    prefs.set(key, value)?;
    println!("{} = {}", key, value);
    Ok(())
}

fn show(prefs: &Prefs) -> Result<()> {
    let config = PortalConfig::from_prefs(prefs)?;
    let mut rows = vec![
        vec![web::URL_BASE.to_string(), config.base_url],
        vec![web::URL_LOGIN_BASE.to_string(), config.login_base_url],
        vec![web::URL_LOGOUT.to_string(), config.logout_url],
        vec![web::URL_STUDENT.to_string(), config.profile_url],
        vec![web::URL_BILLS_BASE.to_string(), config.bills_base_url],
    ];
    for (key, value) in prefs.all()? {
        if web::URL_KEYS.contains(&key.as_str()) {
            continue;
        }
        let shown = if SECRET_KEYS.contains(&key.as_str()) && !value.is_empty() {
            "<stored>".to_string()
        } else {
            value
        };
        rows.push(vec![key, shown]);
    }
    println!("{}", pretty_table(&["Setting", "Value"], rows));
    Ok(())
}
