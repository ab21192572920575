// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use mealbills::{cli, commands, db};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let db = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("refresh", sub)) => commands::refresh::handle(&db, sub)?,
        Some(("bills", sub)) => commands::bills::handle(&db, sub)?,
        Some(("articles", sub)) => commands::bills::articles(&db, sub)?,
        Some(("export", sub)) => commands::transfer::export(&db, sub)?,
        Some(("import", sub)) => commands::transfer::import(&db, sub)?,
        Some(("logout", _)) => commands::session::logout(&db)?,
        Some(("config", sub)) => commands::config::handle(&db, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
