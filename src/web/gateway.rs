// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::browser::{Browser, Cookie, Page};
use super::PortalConfig;
use crate::data::store;
use crate::db::Database;
use crate::error::PortalResult;
use crate::models::LoginDetails;
use chrono::Utc;
use reqwest::Url;
use std::time::Duration;

/// Name of the portal's login form.
const LOGIN_FORM: &str = "f";

/// Raw page access to the portal. Owns the session (cookie jar and last page).
pub struct WebGateway {
    browser: Box<dyn Browser>,
    db: Database,
    base_url: String,
    script_timeout: Duration,
    last_page: Option<Page>,
}

impl WebGateway {
    pub fn new(browser: Box<dyn Browser>, db: Database, config: &PortalConfig) -> Self {
        Self {
            browser,
            db,
            base_url: config.base_url.clone(),
            script_timeout: config.script_timeout,
            last_page: None,
        }
    }

    /// Fetches a page. Relative URLs are resolved against the portal base.
    pub fn fetch(&mut self, url: &str) -> PortalResult<Page> {
        let full_url = self.resolve(url);
        log::debug!("Connecting to: {} ...", full_url);
        let page = self.browser.load(&full_url)?;
        self.settle();
        log::debug!("Connection response: {}", page.url);
        self.last_page = Some(page.clone());
        Ok(page)
    }

    /// Fills in and submits the portal's login form found on `login_page`.
    pub fn submit_login(&mut self, login_page: &Page, details: &LoginDetails) -> PortalResult<Page> {
        log::debug!("Submitting login form on {}", login_page.url);
        let page = self.browser.submit_form(
            login_page,
            LOGIN_FORM,
            &[
                ("username", details.username.as_str()),
                ("password", details.password.as_str()),
            ],
        )?;
        self.settle();
        log::debug!("Login response: {}", page.url);
        self.last_page = Some(page.clone());
        Ok(page)
    }

    pub fn last_page(&self) -> Option<&Page> {
        self.last_page.as_ref()
    }

    fn settle(&mut self) {
        let still_running = self.browser.wait_for_scripts(self.script_timeout);
        if still_running > 0 {
            log::warn!(
                "Background javascript still executing after timeout! ({} jobs)",
                still_running
            );
        }
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http") {
            return url.to_string();
        }
        match Url::parse(&self.base_url).and_then(|base| base.join(url)) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{}{}", self.base_url, url),
        }
    }

    /// Restores persisted cookies. A failure leaves the session empty.
    pub fn load_session(&mut self) {
        log::info!("Loading cookies.");
        let blobs = match store::load_cookie_blobs(&self.db) {
            Ok(blobs) => blobs,
            Err(e) => {
                log::error!("Could not load cookies: {}", e);
                return;
            }
        };
        let now = Utc::now();
        for blob in blobs {
            match serde_json::from_slice::<Cookie>(&blob) {
                Ok(cookie) if cookie.is_expired(now) => {
                    log::debug!("Dropping expired cookie {}.", cookie.name);
                }
                Ok(cookie) => self.browser.add_cookie(cookie),
                Err(e) => log::error!("Could not load cookie: {}", e),
            }
        }
    }

    pub fn save_session(&self) {
        log::info!("Saving cookies.");
        let blobs: Result<Vec<Vec<u8>>, _> =
            self.browser.cookies().iter().map(serde_json::to_vec).collect();
        let result = match blobs {
            Ok(blobs) => store::replace_cookie_blobs(&self.db, &blobs).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            log::error!("Could not save cookies: {}", e);
        }
    }

    pub fn clear_session(&mut self) {
        log::info!("Clearing cookies.");
        self.browser.clear_cookies();
        if let Err(e) = store::replace_cookie_blobs(&self.db, &[]) {
            log::error!("Could not delete stored cookies: {}", e);
        }
    }
}
