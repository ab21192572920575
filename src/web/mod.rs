// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod auth;
pub mod browser;
pub mod gateway;
pub mod login;
pub mod pages;

use crate::prefs::Prefs;
use std::time::Duration;

pub const URL_BASE: &str = "url_base";
pub const URL_LOGIN_BASE: &str = "url_login_base";
pub const URL_LOGOUT: &str = "url_logout";
pub const URL_STUDENT: &str = "url_student";
pub const URL_BILLS_BASE: &str = "url_bills_base";

/// Preference keys that may override portal locations.
pub const URL_KEYS: [&str; 5] = [URL_BASE, URL_LOGIN_BASE, URL_LOGOUT, URL_STUDENT, URL_BILLS_BASE];

/// Locations and limits of the portal conversation.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    /// Any page whose URL starts with this is the login page.
    pub login_base_url: String,
    pub logout_url: String,
    /// The student profile page.
    pub profile_url: String,
    /// The bills listing; needs the query identifier found on the profile page.
    pub bills_base_url: String,
    pub script_timeout: Duration,
    pub request_timeout: Duration,
    pub max_login_attempts: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://issp.srce.hr".into(),
            login_base_url: "https://login.aaiedu.hr/sso/module.php/core/loginuserpass.php".into(),
            logout_url: "https://issp.srce.hr/Account/Odjava".into(),
            profile_url: "https://issp.srce.hr/Student".into(),
            bills_base_url: "https://issp.srce.hr/Student/StudentRacuni".into(),
            script_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            max_login_attempts: 5,
        }
    }
}

impl PortalConfig {
    /// Defaults, with any URL overridden in the preference store.
    pub fn from_prefs(prefs: &Prefs) -> rusqlite::Result<Self> {
        let d = Self::default();
        Ok(Self {
            base_url: prefs.get_or(URL_BASE, &d.base_url)?,
            login_base_url: prefs.get_or(URL_LOGIN_BASE, &d.login_base_url)?,
            logout_url: prefs.get_or(URL_LOGOUT, &d.logout_url)?,
            profile_url: prefs.get_or(URL_STUDENT, &d.profile_url)?,
            bills_base_url: prefs.get_or(URL_BILLS_BASE, &d.bills_base_url)?,
            ..d
        })
    }

    pub fn is_login_url(&self, url: &str) -> bool {
        url.starts_with(&self.login_base_url)
    }
}
