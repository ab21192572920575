// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::open_repository;
use crate::data::exporter;
use crate::db::Database;
use anyhow::{bail, Result};
use std::path::Path;

pub fn export(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    let fmt = m
        .get_one::<String>("format")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "json".to_string());
    let Some(out) = m.get_one::<String>("out") else {
        bail!("--out is required");
    };
    let repo = open_repository(db, false)?;
    let bills = repo.bills();
    match fmt.as_str() {
        "csv" => exporter::write_bills_csv(bills, Path::new(out))?,
        "json" => exporter::write_bills_json(bills, Path::new(out))?,
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    println!("Exported {} bills to {}", bills.len(), out);
    Ok(())
}

pub fn import(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    let Some(path) = m.get_one::<String>("path") else {
        bail!("--path is required");
    };
    let bills = exporter::read_bills_json(Path::new(path.trim()))?;
    let mut repo = open_repository(db, false)?;
    if repo.user().is_none() {
        bail!("No stored user to import bills for; run `mealbills refresh` first");
    }
    let added = repo.import_bills(bills)?;
    println!("Imported {} new bills.", added);
    Ok(())
}
