// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::filter::{BillFilter, UpperBound};
use super::store;
use super::DataSource;
use crate::db::Database;
use crate::error::{BackgroundTaskFault, Flow, Interrupt, PortalError, PortalResult};
use crate::models::{new_by_content, Article, Bill, User};
use crate::prefs::Prefs;
use crate::proceed;
use crate::progress::ProgressMonitor;
use crate::task::check_cancelled;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_MODE_SWITCHES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub new_bills: usize,
    pub total_bills: usize,
}

/// How a [`Repository::sync`] call ended, for the front end to act on.
#[derive(Debug)]
pub enum SyncOutcome {
    Refreshed(RefreshSummary),
    /// The user cancelled the running refresh.
    Cancelled,
    /// The user dismissed the login prompt; the application should close.
    Exit,
    /// A login was needed but the user could not be asked.
    NotLoggedIn,
    /// The portal could not be reached. The front end may offer a retry.
    TransportFailed(PortalError),
}

/// Owns the user and their bills and keeps them in sync with the active
/// data source. Online data is persisted; offline data lives in memory only.
pub struct Repository {
    db: Database,
    prefs: Prefs,
    online: Box<dyn DataSource>,
    offline: Box<dyn DataSource>,
    mode: Mode,
    user: Option<User>,
    bills: Vec<Bill>,
    filter: BillFilter,
    max_mode_switches: usize,
}

impl Repository {
    pub fn new(db: Database, online: Box<dyn DataSource>, offline: Box<dyn DataSource>) -> Self {
        Self {
            prefs: Prefs::new(db.clone()),
            db,
            online,
            offline,
            mode: Mode::Online,
            user: None,
            bills: Vec::new(),
            filter: BillFilter::default(),
            max_mode_switches: DEFAULT_MAX_MODE_SWITCHES,
        }
    }

    pub fn with_max_mode_switches(mut self, n: usize) -> Self {
        self.max_mode_switches = n;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            log::info!("Switching to {:?} mode.", mode);
            self.mode = mode;
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// All bills of the current user, oldest first.
    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    fn active(&mut self) -> &mut dyn DataSource {
        match self.mode {
            Mode::Online => self.online.as_mut(),
            Mode::Offline => self.offline.as_mut(),
        }
    }

    pub fn start(&mut self) -> PortalResult<()> {
        self.online.start()?;
        self.offline.start()?;
        self.load_filter()
    }

    /// Reads the saved date range.
    pub fn load_filter(&mut self) -> PortalResult<()> {
        self.filter = BillFilter::from_prefs(&self.prefs)?;
        Ok(())
    }

    /// Forgets the user unless auto-login keeps them, then stops the sources.
    pub fn stop(&mut self) -> PortalResult<()> {
        if self.user.is_some() && !self.prefs.auto_login()? {
            if let Err(e) = self.forget() {
                log::warn!("Could not forget the user on shutdown: {}", e);
            }
        }
        self.online.stop()?;
        self.offline.stop()
    }

    /// Pulls the profile and any new bills from the active source.
    pub fn refresh(
        &mut self,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<RefreshSummary>> {
        log::info!("Refreshing user data...");
        let user = proceed!(self.active().fetch_profile(monitor, cancel)?);
        proceed!(check_cancelled(cancel));

        let existing = store::load_bills(&self.db, user.id)?;
        let new_bills = proceed!(self.active().fetch_bills(&existing, monitor, cancel)?);
        proceed!(check_cancelled(cancel));

        let new_count = new_bills.len();
        match self.mode {
            Mode::Offline => self.set_data(Some(user), new_bills),
            Mode::Online => {
                store::persist(&self.db, &user, &new_bills)?;
                self.reload(user.id)?;
            }
        }

        if self.filter.lower.is_none() {
            if let Some(earliest) = self.earliest_bill_date() {
                self.filter.lower = Some(earliest);
                self.filter.store(&self.prefs)?;
            }
        }

        log::info!("Data refresh finished.");
        Ok(Flow::Done(RefreshSummary {
            new_bills: new_count,
            total_bills: self.bills.len(),
        }))
    }

    /// Runs [`Repository::refresh`] until it settles, switching between
    /// online and offline mode as the user asks. Each attempt gets its own
    /// cancellation token, wired to the monitor's cancel control; cancelling
    /// `cancel` itself stops everything.
    pub fn sync(
        &mut self,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, BackgroundTaskFault> {
        let mut switches = 0usize;
        loop {
            let attempt = cancel.child_token();
            if let Some(m) = monitor {
                let token = attempt.clone();
                m.set_on_cancel(Some(Arc::new(move || token.cancel())));
            }
            let result = self.refresh(monitor, &attempt);
            if let Some(m) = monitor {
                m.set_on_cancel(None);
            }

            match result {
                Ok(Flow::Done(summary)) => return Ok(SyncOutcome::Refreshed(summary)),
                Ok(Flow::Interrupted(Interrupt::SwitchOffline)) => {
                    self.switch_mode(Mode::Offline, &mut switches)?;
                }
                Ok(Flow::Interrupted(Interrupt::Cancelled)) => {
                    if self.mode == Mode::Offline && !cancel.is_cancelled() {
                        self.switch_mode(Mode::Online, &mut switches)?;
                    } else {
                        log::info!("Refresh cancelled.");
                        return Ok(SyncOutcome::Cancelled);
                    }
                }
                Ok(Flow::Interrupted(Interrupt::InputCancelled)) => return Ok(SyncOutcome::Exit),
                Ok(Flow::Interrupted(Interrupt::NotLoggedIn)) => return Ok(SyncOutcome::NotLoggedIn),
                Err(e @ PortalError::Transport(_)) => {
                    log::warn!("Refresh failed: {}", e);
                    return Ok(SyncOutcome::TransportFailed(e));
                }
                Err(cause) => {
                    log::error!("Refresh failed: {}", cause);
                    return Err(self.fault(cause));
                }
            }
        }
    }

    fn fault(&self, cause: PortalError) -> BackgroundTaskFault {
        BackgroundTaskFault {
            cause,
            should_exit: self.user.is_none(),
        }
    }

    fn switch_mode(&mut self, mode: Mode, switches: &mut usize) -> Result<(), BackgroundTaskFault> {
        if *switches >= self.max_mode_switches {
            return Err(self.fault(PortalError::ModeSwitchLimit(*switches)));
        }
        *switches += 1;
        self.set_mode(mode);
        Ok(())
    }

    /// Drops all user data, logs out and resets the date range.
    pub fn forget(&mut self) -> PortalResult<()> {
        log::info!("Forgetting user data.");
        self.set_data(None, Vec::new());
        self.filter = BillFilter::default();
        self.filter.store(&self.prefs)?;
        self.active().revoke_authorization()
    }

    /// Adds the bills that are not already present by content. Returns how
    /// many were added.
    pub fn import_bills(&mut self, incoming: Vec<Bill>) -> PortalResult<usize> {
        let mut valid = new_by_content(&self.bills, incoming);
        let added = valid.len();
        match self.mode {
            Mode::Offline => {
                self.bills.append(&mut valid);
                self.bills.sort_by_key(|b| b.date_time);
            }
            Mode::Online => {
                let user = self
                    .user
                    .clone()
                    .ok_or_else(|| PortalError::Precondition("Cannot import bills without a user.".into()))?;
                for bill in &mut valid {
                    bill.user_id = user.id;
                }
                store::persist(&self.db, &user, &valid)?;
                self.reload(user.id)?;
            }
        }
        log::info!("Imported {} bills.", added);
        Ok(added)
    }

    /// Replaces the in-memory state with what storage holds for `user_id`.
    pub fn reload(&mut self, user_id: uuid::Uuid) -> PortalResult<()> {
        let user = store::load_user(&self.db, user_id)?;
        let bills = match &user {
            Some(u) => store::load_bills(&self.db, u.id)?,
            None => Vec::new(),
        };
        self.set_data(user, bills);
        Ok(())
    }

    fn set_data(&mut self, user: Option<User>, mut bills: Vec<Bill>) {
        if user.is_none() {
            bills.clear();
        }
        bills.sort_by_key(|b| b.date_time);
        self.user = user;
        self.bills = bills;
    }

    pub fn filter(&self) -> BillFilter {
        self.filter
    }

    /// Sets and persists the date range. An upper date equal to the newest
    /// bill's date keeps following the newest bill.
    pub fn set_date_range(&mut self, lower: Option<NaiveDate>, upper: Option<NaiveDate>) -> PortalResult<()> {
        let latest = self.latest_bill_date();
        self.filter = BillFilter {
            lower,
            upper: UpperBound::Open,
        }
        .with_upper(upper, latest);
        self.filter.store(&self.prefs)?;
        Ok(())
    }

    pub fn filtered_bills(&self) -> Vec<&Bill> {
        self.filter.apply(&self.bills)
    }

    pub fn earliest_bill_date(&self) -> Option<NaiveDate> {
        self.bills.iter().map(Bill::date).min()
    }

    pub fn latest_bill_date(&self) -> Option<NaiveDate> {
        self.bills.iter().map(Bill::date).max()
    }

    pub fn earliest_filtered_bill_date(&self) -> Option<NaiveDate> {
        self.filtered_bills().into_iter().map(Bill::date).min()
    }

    pub fn latest_filtered_bill_date(&self) -> Option<NaiveDate> {
        self.filtered_bills().into_iter().map(Bill::date).max()
    }

    /// Distinct articles of the filtered bills, in first-seen order.
    pub fn articles(&self) -> Vec<Article> {
        let mut seen = HashSet::new();
        self.filtered_bills()
            .into_iter()
            .flat_map(|b| b.articles())
            .filter(|a| seen.insert((*a).clone()))
            .cloned()
            .collect()
    }
}
