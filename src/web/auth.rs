// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::browser::Page;
use super::gateway::WebGateway;
use super::login::{GENERIC_LOGIN_ERROR, LoginOrchestrator};
use super::pages;
use super::PortalConfig;
use crate::crypt::{deobfuscate, obfuscate};
use crate::error::{Flow, PortalError, PortalResult};
use crate::models::{LoginDetails, UserLogon};
use crate::prefs::{self, Prefs};
use crate::proceed;
use crate::progress::{Progress, ProgressMonitor};
use crate::task::check_cancelled;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginOutcome {
    Accepted,
    Rejected(String),
}

/// Authorized access to the portal. Logs the user in whenever the portal
/// answers with its login page, and makes sure a resumed session belongs to
/// the user the application knows about.
pub struct AuthWebGateway {
    web: WebGateway,
    login: LoginOrchestrator,
    prefs: Prefs,
    config: PortalConfig,
    current_user: Option<UserLogon>,
}

impl AuthWebGateway {
    pub fn new(web: WebGateway, login: LoginOrchestrator, prefs: Prefs, config: PortalConfig) -> Self {
        Self {
            web,
            login,
            prefs,
            config,
            current_user: None,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// The user considered logged on the portal, if any.
    pub fn current_user(&self) -> Option<&UserLogon> {
        self.current_user.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.current_user.as_ref().map(UserLogon::id)
    }

    pub fn start(&mut self) -> PortalResult<()> {
        if self.prefs.auto_login()? {
            self.web.load_session();
        }
        Ok(())
    }

    pub fn stop(&mut self) -> PortalResult<()> {
        if self.prefs.auto_login()? {
            self.web.save_session();
        }
        Ok(())
    }

    fn is_login_page(&self, page: &Page) -> bool {
        self.config.is_login_url(&page.url)
    }

    fn is_profile_page(&self, page: &Page) -> bool {
        page.url.starts_with(&self.config.profile_url)
    }

    /// Fetches `url`, logging in first if the portal asks for it.
    pub fn fetch_authorized(
        &mut self,
        url: &str,
        monitor: Option<&dyn ProgressMonitor>,
        can_prompt_login: bool,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<Page>> {
        if self.config.is_login_url(url) {
            return Err(PortalError::Precondition(
                "A privileged connection cannot be made to the login page.".into(),
            ));
        }
        let page = self.web.fetch(url)?;
        proceed!(check_cancelled(cancel));
        if !self.is_login_page(&page) && self.is_user_verified()? {
            return Ok(Flow::Done(page));
        }
        self.authenticate(url, page, monitor, can_prompt_login, cancel)
    }

    fn authenticate(
        &mut self,
        url: &str,
        page: Page,
        monitor: Option<&dyn ProgressMonitor>,
        can_prompt_login: bool,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<Page>> {
        let mut login_page = page;
        if !self.is_login_page(&login_page) {
            log::info!("Session cannot be attributed to a known user; starting a fresh one.");
            self.web.clear_session();
            login_page = self.web.fetch(url)?;
            if !self.is_login_page(&login_page) {
                return Err(PortalError::UnexpectedResponse(format!(
                    "Expected the login page, received {}",
                    login_page.url
                )));
            }
        }
        log::info!("Portal requested authentication.");

        let mut last_error: Option<String> = None;
        let mut attempt = 0;
        loop {
            if attempt >= self.config.max_login_attempts {
                return Err(PortalError::LoginFailed {
                    message: last_error.unwrap_or_else(|| GENERIC_LOGIN_ERROR.to_string()),
                });
            }
            attempt += 1;

            let details = proceed!(self.login.obtain(can_prompt_login, last_error.as_deref(), monitor)?);

            let saved_state = monitor.map(|m| m.export_state());
            if let Some(m) = monitor {
                m.set_message("Logging in...");
                m.set_progress(Progress::Indeterminate);
                m.set_on_cancel(None);
            }
            let outcome = self.submit_credentials(&details, &login_page);
            if let (Some(m), Some(state)) = (monitor, saved_state) {
                m.import_state(state);
            }

            match outcome? {
                LoginOutcome::Accepted => break,
                LoginOutcome::Rejected(message) => {
                    log::debug!("Login attempt {} rejected.", attempt);
                    last_error = Some(message);
                    let profile_url = self.config.profile_url.clone();
                    let fresh = self.web.fetch(&profile_url)?;
                    if !self.is_login_page(&fresh) {
                        return Err(PortalError::UnexpectedResponse(
                            "Did not receive the login page during a login attempt.".into(),
                        ));
                    }
                    login_page = fresh;
                }
            }
        }

        proceed!(check_cancelled(cancel));
        let page = self.web.fetch(url)?;
        if self.is_login_page(&page) {
            return Err(PortalError::UnexpectedResponse(
                "Received the login page after a privileged connection.".into(),
            ));
        }
        Ok(Flow::Done(page))
    }

    fn submit_credentials(&mut self, details: &LoginDetails, login_page: &Page) -> PortalResult<LoginOutcome> {
        if !self.is_login_page(login_page) {
            return Err(PortalError::Precondition(format!(
                "The page does not appear to be the portal's login page. URL: {}",
                login_page.url
            )));
        }
        log::info!("Logging on the portal...");
        let response = self.web.submit_login(login_page, details)?;

        if self.is_login_page(&response) {
            let message = pages::parse_login_error(&response.html);
            log::info!("Login failed: {:?}", message);
            self.login.disable_auto_login()?;
            return Ok(LoginOutcome::Rejected(
                message.unwrap_or_else(|| GENERIC_LOGIN_ERROR.to_string()),
            ));
        }

        if self.login.auto_login_enabled()? {
            self.store_fingerprint(&details.username, response)?;
        }
        self.current_user = Some(UserLogon::new(details.username.clone()));
        log::info!("Login successful.");
        Ok(LoginOutcome::Accepted)
    }

    /// Stores `username|oib` so that a resumed session can be attributed later.
    fn store_fingerprint(&mut self, username: &str, page: Page) -> PortalResult<()> {
        log::info!("Storing user credentials.");
        let profile = self.ensure_profile_page(Some(page))?;
        let oib = pages::parse_oib(&profile.html)
            .ok_or_else(|| PortalError::UnexpectedResponse("No OIB on the student page.".into()))?;
        self.prefs
            .set(prefs::USER_CREDENTIALS, &obfuscate(&format!("{}|{}", username, oib)))?;
        Ok(())
    }

    fn is_user_verified(&mut self) -> PortalResult<bool> {
        if self.current_user.is_none() {
            self.verify_user()?;
        }
        Ok(self.current_user.is_some())
    }

    /// Attributes the session to the stored fingerprint. Leaves the identity
    /// unset when there is nothing to compare against.
    fn verify_user(&mut self) -> PortalResult<()> {
        log::info!("Verifying user credentials.");
        let stored = self.prefs.get_or(prefs::USER_CREDENTIALS, "")?;
        if stored.is_empty() {
            return Ok(());
        }
        let fingerprint = match deobfuscate(&stored) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Stored user credentials are unreadable: {}", e);
                return Ok(());
            }
        };
        let Some((username, expected_oib)) = fingerprint.split_once('|') else {
            log::warn!("Stored user credentials are malformed.");
            return Ok(());
        };

        let last = self.web.last_page().cloned();
        let profile = self.ensure_profile_page(last)?;
        let actual_oib = pages::parse_oib(&profile.html).unwrap_or_default();

        if actual_oib != expected_oib {
            log::warn!("Portal session belongs to a different user.");
            if let Err(e) = self.logout() {
                log::error!("Logout after failed verification did not complete: {}", e);
            }
            return Err(PortalError::Inconsistent);
        }
        self.current_user = Some(UserLogon::new(username));
        Ok(())
    }

    /// The bills listing lives under the profile URL too, so a page only
    /// counts as the profile when it shows an OIB.
    fn ensure_profile_page(&mut self, page: Option<Page>) -> PortalResult<Page> {
        if let Some(p) = page.filter(|p| self.is_profile_page(p) && pages::parse_oib(&p.html).is_some()) {
            return Ok(p);
        }
        let profile_url = self.config.profile_url.clone();
        let fetched = self.web.fetch(&profile_url)?;
        if self.is_profile_page(&fetched) {
            Ok(fetched)
        } else {
            Err(PortalError::UnexpectedResponse("Could not obtain student page.".into()))
        }
    }

    /// Logs out of the portal and forgets the session, identity and any
    /// stored credentials. Local cleanup happens even if the portal is
    /// unreachable.
    pub fn logout(&mut self) -> PortalResult<()> {
        log::info!("Logging off the portal...");
        let logout_url = self.config.logout_url.clone();
        let fetched = self.web.fetch(&logout_url);
        self.web.clear_session();
        self.current_user = None;
        self.login.disable_auto_login()?;
        log::info!("Logoff finished.");
        fetched.map(|_| ())
    }
}
