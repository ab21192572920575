// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::exporter;
use super::DataSource;
use crate::error::{Flow, Interrupt, PortalResult};
use crate::models::{sample_user_id, Bill, User, SAMPLE_USERNAME};
use crate::progress::{report, Progress, ProgressMonitor};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Picks an exported bills file to open.
pub trait BillFileChooser: Send {
    /// `None` means the user gave up.
    fn choose_bills_file(&mut self) -> Option<PathBuf>;

    fn report_error(&mut self, message: &str) {
        log::error!("{}", message);
    }
}

/// Offline source: bills come from a file the user picks, shown under the
/// sample user.
pub struct LocalDataSource {
    chooser: Box<dyn BillFileChooser>,
}

impl LocalDataSource {
    pub fn new(chooser: Box<dyn BillFileChooser>) -> Self {
        Self { chooser }
    }

    pub fn sample_user() -> User {
        User {
            id: sample_user_id(),
            username: SAMPLE_USERNAME.to_string(),
            full_name: "(demo)".to_string(),
            institution: "---".to_string(),
            level: "---".to_string(),
            balance: Decimal::ZERO,
        }
    }
}

impl DataSource for LocalDataSource {
    fn start(&mut self) -> PortalResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> PortalResult<()> {
        Ok(())
    }

    fn fetch_profile(
        &mut self,
        _monitor: Option<&dyn ProgressMonitor>,
        _cancel: &CancellationToken,
    ) -> PortalResult<Flow<User>> {
        Ok(Flow::Done(Self::sample_user()))
    }

    fn fetch_bills(
        &mut self,
        _existing: &[Bill],
        monitor: Option<&dyn ProgressMonitor>,
        _cancel: &CancellationToken,
    ) -> PortalResult<Flow<Vec<Bill>>> {
        loop {
            if let Some(m) = monitor {
                m.hide();
            }
            let Some(path) = self.chooser.choose_bills_file() else {
                log::info!("No bills file chosen.");
                return Ok(Flow::Interrupted(Interrupt::Cancelled));
            };
            report(monitor, "Loading bills...", Progress::Indeterminate);
            if let Some(m) = monitor {
                m.show();
            }
            match exporter::read_bills_json(&path) {
                Ok(bills) => {
                    log::info!("Loaded {} bills from {}", bills.len(), path.display());
                    return Ok(Flow::Done(bills));
                }
                Err(e) => {
                    self.chooser
                        .report_error(&format!("Could not import bills from {}: {:#}", path.display(), e));
                }
            }
        }
    }

    fn revoke_authorization(&mut self) -> PortalResult<()> {
        Ok(())
    }
}
