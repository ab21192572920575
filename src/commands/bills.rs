// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::open_repository;
use crate::data::filter::{BillFilter, UpperBound};
use crate::db::Database;
use crate::models::{totals, Bill};
use crate::utils::{fmt_money, maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub fn handle(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(db, sub)?,
        Some(("summary", sub)) => summary(db, sub)?,
        Some(("range", sub)) => range(db, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
pub struct BillRow {
    pub date_time: String,
    pub source: String,
    pub articles: u32,
    pub value: String,
    pub subsidy: String,
    pub cost: String,
}

impl From<&Bill> for BillRow {
    fn from(b: &Bill) -> Self {
        Self {
            date_time: b.date_time.format("%Y-%m-%d %H:%M").to_string(),
            source: b.source.clone(),
            articles: b.article_count(),
            value: fmt_money(&b.total_value()),
            subsidy: fmt_money(&b.total_subsidy()),
            cost: fmt_money(&b.total_cost()),
        }
    }
}

/// The saved range, with `--from`/`--to` taking precedence when given.
fn effective_filter(saved: BillFilter, sub: &clap::ArgMatches) -> Result<BillFilter> {
    let mut f = saved;
    if let Some(from) = sub.get_one::<String>("from") {
        f.lower = Some(parse_date(from)?);
    }
    if let Some(to) = sub.get_one::<String>("to") {
        f.upper = UpperBound::Date(parse_date(to)?);
    }
    Ok(f)
}

pub fn query_rows(db: &Database, sub: &clap::ArgMatches) -> Result<Vec<BillRow>> {
    let repo = open_repository(db, false)?;
    let filter = effective_filter(repo.filter(), sub)?;
    Ok(filter.apply(repo.bills()).into_iter().map(BillRow::from).collect())
}

fn list(db: &Database, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(db, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date_time.clone(),
                    r.source.clone(),
                    r.articles.to_string(),
                    r.value.clone(),
                    r.subsidy.clone(),
                    r.cost.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Source", "Articles", "Value", "Subsidy", "Cost"], rows)
        );
    }
    Ok(())
}

fn summary(db: &Database, sub: &clap::ArgMatches) -> Result<()> {
    let repo = open_repository(db, false)?;
    let filtered: Vec<Bill> = repo.filtered_bills().into_iter().cloned().collect();
    let t = totals(&filtered);
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &t)? {
        let range = match (repo.earliest_filtered_bill_date(), repo.latest_filtered_bill_date()) {
            (Some(a), Some(b)) => format!("{} .. {}", a, b),
            _ => "-".to_string(),
        };
        let rows = vec![
            vec!["Dates".into(), range],
            vec!["Bills".into(), t.bills.to_string()],
            vec!["Articles".into(), t.articles.to_string()],
            vec!["Value".into(), fmt_money(&t.value)],
            vec!["Subsidy".into(), fmt_money(&t.subsidy)],
            vec!["Cost".into(), fmt_money(&t.cost)],
        ];
        println!("{}", pretty_table(&["Metric", "Value"], rows));
    }
    Ok(())
}

fn range(db: &Database, sub: &clap::ArgMatches) -> Result<()> {
    let mut repo = open_repository(db, false)?;
    let lower = sub.get_one::<String>("from").map(|s| parse_date(s)).transpose()?;
    let upper = sub.get_one::<String>("to").map(|s| parse_date(s)).transpose()?;
    repo.set_date_range(lower, upper)?;
    let f = repo.filter();
    let from = f.lower.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    let to = match f.upper {
        UpperBound::Open => "-".to_string(),
        UpperBound::Latest => "newest bill".to_string(),
        UpperBound::Date(d) => d.to_string(),
    };
    println!("Date range saved: {} .. {}", from, to);
    Ok(())
}

#[derive(Serialize)]
pub struct ArticleRow {
    pub name: String,
    pub price: String,
    pub bought: u32,
}

pub fn articles(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    let repo = open_repository(db, false)?;
    let mut bought: HashMap<(String, Decimal), u32> = HashMap::new();
    for bill in repo.filtered_bills() {
        for e in &bill.entries {
            *bought.entry((e.article.name.clone(), e.article.price)).or_default() += e.amount;
        }
    }
    let data: Vec<ArticleRow> = repo
        .articles()
        .into_iter()
        .map(|a| ArticleRow {
            bought: bought.get(&(a.name.clone(), a.price)).copied().unwrap_or(0),
            price: fmt_money(&a.price),
            name: a.name,
        })
        .collect();
    if !maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|a| vec![a.name.clone(), a.price.clone(), a.bought.to_string()])
            .collect();
        println!("{}", pretty_table(&["Article", "Price", "Bought"], rows));
    }
    Ok(())
}
