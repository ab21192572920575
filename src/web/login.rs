// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::crypt::{deobfuscate, obfuscate};
use crate::error::{Flow, Interrupt, PortalResult};
use crate::models::LoginDetails;
use crate::prefs::{self, Prefs};
use crate::progress::ProgressMonitor;

/// Shown when the portal rejects a login without saying why.
pub const GENERIC_LOGIN_ERROR: &str = "An error occurred.";

/// What the user answered on the credential prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginPromptResult {
    pub cancelled: bool,
    pub switch_to_offline: bool,
    pub username: String,
    pub password: String,
    pub remember: bool,
}

impl LoginPromptResult {
    pub fn accept(username: impl Into<String>, password: impl Into<String>, remember: bool) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember,
            ..Self::default()
        }
    }

    pub fn cancel() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            switch_to_offline: true,
            ..Self::default()
        }
    }
}

/// Interactive credential input. May be invoked repeatedly; `error_message`
/// carries the reason the previous attempt was rejected.
pub trait CredentialPrompt: Send {
    fn prompt_login(&mut self, error_message: Option<&str>) -> LoginPromptResult;
}

/// Decides where credentials come from and keeps the auto-login preferences.
pub struct LoginOrchestrator {
    prefs: Prefs,
    prompt: Option<Box<dyn CredentialPrompt>>,
}

impl LoginOrchestrator {
    pub fn new(prefs: Prefs, prompt: Option<Box<dyn CredentialPrompt>>) -> Self {
        Self { prefs, prompt }
    }

    /// Stored auto-login credentials first, then the prompt if allowed.
    pub fn obtain(
        &mut self,
        can_prompt: bool,
        error_message: Option<&str>,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> PortalResult<Flow<LoginDetails>> {
        if self.prefs.auto_login()? {
            match self.saved_details()? {
                Some(details) => {
                    log::info!("Using stored auto-login credentials.");
                    return Ok(Flow::Done(details));
                }
                None => {
                    log::warn!("Stored auto-login credentials are unreadable.");
                    self.disable_auto_login()?;
                }
            }
        }

        let prompt = match self.prompt.as_mut() {
            Some(prompt) if can_prompt => prompt,
            _ => {
                log::info!("Login required but the user cannot be prompted.");
                return Ok(Flow::Interrupted(Interrupt::NotLoggedIn));
            }
        };

        if let Some(m) = monitor {
            m.hide();
        }
        let input = prompt.prompt_login(error_message);
        if let Some(m) = monitor {
            m.show();
        }

        if input.cancelled {
            log::info!("Login prompt cancelled.");
            return Ok(Flow::Interrupted(Interrupt::InputCancelled));
        }
        if input.switch_to_offline {
            log::info!("User chose to open sample data.");
            return Ok(Flow::Interrupted(Interrupt::SwitchOffline));
        }

        let details = LoginDetails::new(input.username, input.password);
        if input.remember {
            self.enable_auto_login(&details)?;
        }
        Ok(Flow::Done(details))
    }

    fn saved_details(&self) -> PortalResult<Option<LoginDetails>> {
        let username = self.prefs.get_or(prefs::SAVED_USERNAME, "")?;
        let password = self.prefs.get_or(prefs::SAVED_PASSWORD, "")?;
        match (deobfuscate(&username), deobfuscate(&password)) {
            (Ok(u), Ok(p)) if !u.is_empty() => Ok(Some(LoginDetails::new(u, p))),
            _ => Ok(None),
        }
    }

    pub fn auto_login_enabled(&self) -> PortalResult<bool> {
        Ok(self.prefs.auto_login()?)
    }

    pub fn enable_auto_login(&self, details: &LoginDetails) -> PortalResult<()> {
        log::info!("Enabling auto-login.");
        self.prefs
            .set(prefs::SAVED_USERNAME, &obfuscate(&details.username))?;
        self.prefs
            .set(prefs::SAVED_PASSWORD, &obfuscate(&details.password))?;
        self.prefs.set_auto_login(true)?;
        Ok(())
    }

    /// Erases stored credentials and the identity fingerprint.
    pub fn disable_auto_login(&self) -> PortalResult<()> {
        if !self.prefs.auto_login()? {
            return Ok(());
        }
        log::info!("Disabling auto-login.");
        self.prefs.set(prefs::USER_CREDENTIALS, "")?;
        self.prefs.set(prefs::SAVED_USERNAME, "")?;
        self.prefs.set(prefs::SAVED_PASSWORD, "")?;
        self.prefs.set_auto_login(false)?;
        Ok(())
    }
}
