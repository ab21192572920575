// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::open_repository;
use crate::db::Database;
use crate::prefs::{self, Prefs};
use anyhow::{Context, Result};

/// Logs out of the portal and forgets the stored credentials and user.
pub fn logout(db: &Database) -> Result<()> {
    let mut repo = open_repository(db, false)?;
    Prefs::new(db.clone()).set(prefs::LAST_USER, "")?;
    repo.forget().context("Local data was cleared but the portal logout failed")?;
    println!("Logged out.");
    Ok(())
}
