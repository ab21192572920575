// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod bills;
pub mod config;
pub mod refresh;
pub mod session;
pub mod transfer;

use crate::data::local_source::LocalDataSource;
use crate::data::repository::Repository;
use crate::data::web_source::WebDataSource;
use crate::db::Database;
use crate::prefs::{self, Prefs};
use crate::term::{TerminalFileChooser, TerminalPrompt};
use crate::web::auth::AuthWebGateway;
use crate::web::browser::HttpBrowser;
use crate::web::gateway::WebGateway;
use crate::web::login::{CredentialPrompt, LoginOrchestrator};
use crate::web::PortalConfig;
use anyhow::Result;
use uuid::Uuid;

/// The user whose stored bills the read-only commands show.
pub fn last_user(prefs: &Prefs) -> Result<Option<Uuid>> {
    let raw = prefs.get_or(prefs::LAST_USER, "")?;
    if raw.is_empty() {
        return Ok(None);
    }
    match Uuid::parse_str(&raw) {
        Ok(id) => Ok(Some(id)),
        Err(e) => {
            log::warn!("Ignoring malformed last user id '{}': {}", raw, e);
            Ok(None)
        }
    }
}

/// Wires the portal pipeline to the terminal and loads what is stored for
/// the last refreshed user. `interactive` allows asking for credentials.
pub fn open_repository(db: &Database, interactive: bool) -> Result<Repository> {
    let prefs = Prefs::new(db.clone());
    let config = PortalConfig::from_prefs(&prefs)?;

    let browser = HttpBrowser::new(config.request_timeout)?;
    let web = WebGateway::new(Box::new(browser), db.clone(), &config);
    let prompt: Option<Box<dyn CredentialPrompt>> = if interactive {
        Some(Box::new(TerminalPrompt::stdio()))
    } else {
        None
    };
    let login = LoginOrchestrator::new(prefs.clone(), prompt);
    let auth = AuthWebGateway::new(web, login, prefs.clone(), config);

    let online = WebDataSource::new(auth);
    let offline = LocalDataSource::new(Box::new(TerminalFileChooser::stdio()));
    let mut repo = Repository::new(db.clone(), Box::new(online), Box::new(offline));
    repo.load_filter()?;
    if let Some(id) = last_user(&prefs)? {
        repo.reload(id)?;
    }
    Ok(repo)
}
