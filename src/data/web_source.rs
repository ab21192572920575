// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::DataSource;
use crate::error::{Flow, PortalError, PortalResult};
use crate::models::{entries_match, Bill, BillEntry, User};
use crate::proceed;
use crate::progress::{report, Progress, ProgressMonitor};
use crate::task::check_cancelled;
use crate::web::auth::AuthWebGateway;
use crate::web::browser::Page;
use crate::web::pages::{self, BillRow};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Reads the user's profile and bills off the portal. Requires a logged-in
/// user, which [`AuthWebGateway`] takes care of.
pub struct WebDataSource {
    web: AuthWebGateway,
    /// Query part of the bills listing URL, found on the profile page.
    bills_identifier: Option<String>,
}

impl WebDataSource {
    pub fn new(web: AuthWebGateway) -> Self {
        Self {
            web,
            bills_identifier: None,
        }
    }

    fn logged_user_id(&self) -> PortalResult<Uuid> {
        self.web
            .user_id()
            .ok_or_else(|| PortalError::Precondition("No user is logged on the portal.".into()))
    }

    fn remember_bills_identifier(&mut self, profile: &Page) -> PortalResult<String> {
        let identifier = pages::parse_bills_identifier(&profile.html, &self.web.config().bills_base_url)
            .ok_or_else(|| PortalError::UnexpectedResponse("No link to the bills page on the student page.".into()))?;
        self.bills_identifier = Some(identifier.clone());
        Ok(identifier)
    }

    fn bills_identifier(
        &mut self,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<String>> {
        if let Some(identifier) = &self.bills_identifier {
            return Ok(Flow::Done(identifier.clone()));
        }
        log::info!("Finding bill page location...");
        let url = self.web.config().profile_url.clone();
        let page = proceed!(self.web.fetch_authorized(&url, monitor, false, cancel)?);
        check_expected(&page, &url)?;
        Ok(Flow::Done(self.remember_bills_identifier(&page)?))
    }

    fn fetch_entries(
        &mut self,
        row: &BillRow,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<Vec<BillEntry>>> {
        let page = proceed!(self.web.fetch_authorized(&row.details_href, monitor, false, cancel)?);
        Ok(Flow::Done(pages::parse_bill_entries(&page.html)?))
    }
}

fn check_expected(page: &Page, expected_url: &str) -> PortalResult<()> {
    if page.url.starts_with(expected_url) {
        Ok(())
    } else {
        Err(PortalError::UnexpectedResponse(format!(
            "Unexpected server response to data fetch. Received: {} Expected: {}",
            page.url, expected_url
        )))
    }
}

impl DataSource for WebDataSource {
    fn start(&mut self) -> PortalResult<()> {
        self.web.start()
    }

    fn stop(&mut self) -> PortalResult<()> {
        self.web.stop()
    }

    fn fetch_profile(
        &mut self,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<User>> {
        log::debug!("Fetching general data...");
        report(monitor, "Fetching general data...", Progress::Indeterminate);

        let url = self.web.config().profile_url.clone();
        let page = proceed!(self.web.fetch_authorized(&url, monitor, true, cancel)?);
        check_expected(&page, &url)?;

        let fields = pages::parse_profile(&page.html)?;
        let logon = self
            .web
            .current_user()
            .cloned()
            .ok_or_else(|| PortalError::Precondition("No user is logged on the portal.".into()))?;
        self.remember_bills_identifier(&page)?;

        Ok(Flow::Done(User {
            id: logon.id(),
            username: logon.username,
            full_name: fields.full_name,
            institution: fields.institution,
            level: fields.level,
            balance: fields.balance,
        }))
    }

    fn fetch_bills(
        &mut self,
        existing: &[Bill],
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<Vec<Bill>>> {
        log::debug!("Fetching bills...");
        report(monitor, "Fetching bills...", Progress::Indeterminate);

        let identifier = proceed!(self.bills_identifier(monitor, cancel)?);
        let bills_url = format!("{}{}", self.web.config().bills_base_url, identifier);
        let page = proceed!(self.web.fetch_authorized(&bills_url, monitor, false, cancel)?);
        check_expected(&page, &bills_url)?;

        // the listing is not always in order; newest first is assumed below
        let mut rows = pages::parse_bill_rows(&page.html)?;
        rows.sort_by(|a, b| b.date_time.cmp(&a.date_time));

        // Detail pages fetched while looking for the first known bill. A row
        // that turns out to be new reuses them instead of loading them twice.
        let mut fetched: HashMap<usize, Vec<BillEntry>> = HashMap::new();
        let mut new_count = rows.len();
        for (index, row) in rows.iter().enumerate() {
            let candidates: Vec<&Bill> = existing
                .iter()
                .filter(|b| b.date_time == row.date_time && b.source == row.source)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            proceed!(check_cancelled(cancel));
            log::debug!("Checking if new bills ended.");
            let entries = proceed!(self.fetch_entries(row, monitor, cancel)?);
            if candidates.iter().any(|b| entries_match(&b.entries, &entries)) {
                new_count = index;
                break;
            }
            fetched.insert(index, entries);
        }

        let user_id = self.logged_user_id()?;
        let mut bills = Vec::with_capacity(new_count);
        for (index, row) in rows.iter().take(new_count).enumerate() {
            proceed!(check_cancelled(cancel));
            log::debug!("Fetching bill {}/{}", index + 1, new_count);
            let entries = match fetched.remove(&index) {
                Some(entries) => entries,
                None => proceed!(self.fetch_entries(row, monitor, cancel)?),
            };
            bills.push(Bill {
                date_time: row.date_time,
                source: row.source.clone(),
                user_id,
                entries,
            });
            report(
                monitor,
                &format!("Downloaded bills: {}/{}", index + 1, new_count),
                Progress::Fraction((index + 1) as f64 / new_count as f64),
            );
        }

        bills.reverse();
        log::info!("{} new bills found.", bills.len());
        Ok(Flow::Done(bills))
    }

    fn revoke_authorization(&mut self) -> PortalResult<()> {
        self.bills_identifier = None;
        self.web.logout()
    }
}
