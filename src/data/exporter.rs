// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Bill;
use crate::utils::fmt_money;
use anyhow::{Context, Result};
use std::path::Path;

/// Writes bills in the format the offline source reads back.
pub fn write_bills_json(bills: &[Bill], path: &Path) -> Result<()> {
    log::info!("Exporting {} bills to {}.", bills.len(), path.display());
    let json = serde_json::to_string_pretty(bills)?;
    std::fs::write(path, json).with_context(|| format!("Write {}", path.display()))?;
    Ok(())
}

pub fn read_bills_json(path: &Path) -> Result<Vec<Bill>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Open {}", path.display()))?;
    let bills: Vec<Bill> =
        serde_json::from_str(&json).with_context(|| format!("Parse bills from {}", path.display()))?;
    Ok(bills)
}

/// One row per bill entry.
pub fn write_bills_csv(bills: &[Bill], path: &Path) -> Result<()> {
    log::info!("Exporting {} bills to {} as CSV.", bills.len(), path.display());
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("Create {}", path.display()))?;
    wtr.write_record([
        "date_time", "source", "article", "price", "amount", "subsidy", "cost",
    ])?;
    for bill in bills {
        let date_time = bill.date_time.format("%Y-%m-%d %H:%M").to_string();
        for entry in &bill.entries {
            wtr.write_record([
                date_time.clone(),
                bill.source.clone(),
                entry.article.name.clone(),
                fmt_money(&entry.article.price),
                entry.amount.to_string(),
                fmt_money(&entry.subsidy),
                fmt_money(&entry.total_cost()),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}
