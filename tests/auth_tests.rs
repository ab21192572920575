// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::*;
use mealbills::crypt::{deobfuscate, obfuscate};
use mealbills::error::{Flow, Interrupt, PortalError};
use mealbills::prefs;
use mealbills::progress::{CancelCallback, Progress, ProgressMonitor, StateMonitor};
use mealbills::web::login::{LoginOrchestrator, LoginPromptResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn remember() -> Box<ScriptedPrompt> {
    Box::new(ScriptedPrompt::new(vec![LoginPromptResult::accept("ana", "secret", true)]))
}

fn wrong(times: usize) -> Vec<LoginPromptResult> {
    (0..times)
        .map(|_| LoginPromptResult::accept("ana", "nope", false))
        .collect()
}

fn submissions(h: &Harness) -> usize {
    h.portal.lock().unwrap().login_submissions
}

#[test]
fn prompted_login_reaches_the_requested_page() {
    let h = harness();
    let mut auth = h.auth(Some(accept()));

    let page = auth
        .fetch_authorized(PROFILE, None, true, &CancellationToken::new())
        .unwrap()
        .done()
        .unwrap();

    assert!(page.url.starts_with(PROFILE));
    assert!(page.html.contains("OIB: 12345678901"));
    assert_eq!(auth.current_user().unwrap().username, "ana");
    assert_eq!(submissions(&h), 1);
    // not remembered
    assert!(!h.prefs.auto_login().unwrap());
    assert_eq!(h.prefs.get_or(prefs::USER_CREDENTIALS, "").unwrap(), "");
}

#[test]
fn rejected_password_prompts_again_with_the_portal_message() {
    let h = harness();
    let mut answers = wrong(1);
    answers.push(LoginPromptResult::accept("ana", "secret", false));
    let prompt = ScriptedPrompt::new(answers);
    let seen = prompt.seen.clone();
    let mut auth = h.auth(Some(Box::new(prompt)));

    let outcome = auth
        .fetch_authorized(PROFILE, None, true, &CancellationToken::new())
        .unwrap();

    assert!(outcome.done().is_some());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some(BAD_LOGIN_MESSAGE.to_string())]
    );
    assert_eq!(submissions(&h), 2);
}

#[test]
fn attempts_are_capped() {
    let h = harness();
    let prompt = ScriptedPrompt::new(wrong(10));
    let seen = prompt.seen.clone();
    let mut auth = h.auth(Some(Box::new(prompt)));

    let err = auth
        .fetch_authorized(PROFILE, None, true, &CancellationToken::new())
        .unwrap_err();

    match err {
        PortalError::LoginFailed { message } => assert_eq!(message, BAD_LOGIN_MESSAGE),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(seen.lock().unwrap().len(), 5);
    assert_eq!(submissions(&h), 5);
}

#[test]
fn cancelled_prompt_and_offline_choice_interrupt() {
    let h = harness();
    let cancel = CancellationToken::new();

    let mut auth = h.auth(Some(Box::new(ScriptedPrompt::new(vec![LoginPromptResult::cancel()]))));
    let outcome = auth.fetch_authorized(PROFILE, None, true, &cancel).unwrap();
    assert_eq!(outcome.interrupt(), Some(Interrupt::InputCancelled));

    let mut auth = h.auth(Some(Box::new(ScriptedPrompt::new(vec![LoginPromptResult::offline()]))));
    let outcome = auth.fetch_authorized(PROFILE, None, true, &cancel).unwrap();
    assert_eq!(outcome.interrupt(), Some(Interrupt::SwitchOffline));

    assert_eq!(submissions(&h), 0);
}

#[test]
fn login_without_prompting_is_not_logged_in() {
    let h = harness();
    let mut auth = h.auth(Some(accept()));

    let outcome = auth
        .fetch_authorized(PROFILE, None, false, &CancellationToken::new())
        .unwrap();

    assert_eq!(outcome.interrupt(), Some(Interrupt::NotLoggedIn));
}

#[test]
fn rejected_auto_login_disables_it() {
    let h = harness();
    let login = LoginOrchestrator::new(h.prefs.clone(), None);
    login
        .enable_auto_login(&mealbills::models::LoginDetails::new("ana", "stale"))
        .unwrap();
    let mut auth = h.auth(None);

    let outcome = auth
        .fetch_authorized(PROFILE, None, false, &CancellationToken::new())
        .unwrap();

    assert_eq!(outcome.interrupt(), Some(Interrupt::NotLoggedIn));
    assert_eq!(submissions(&h), 1);
    assert!(!h.prefs.auto_login().unwrap());
    assert_eq!(h.prefs.get_or(prefs::SAVED_PASSWORD, "").unwrap(), "");
}

#[test]
fn the_login_page_cannot_be_requested_directly() {
    let h = harness();
    let mut auth = h.auth(Some(accept()));

    let err = auth
        .fetch_authorized(&format!("{}?x=1", LOGIN), None, true, &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, PortalError::Precondition(_)));
    assert!(h.portal.lock().unwrap().loads.is_empty());
}

#[test]
fn remembered_login_stores_credentials_and_fingerprint() {
    let h = harness();
    let mut auth = h.auth(Some(remember()));

    let _ = auth
        .fetch_authorized(PROFILE, None, true, &CancellationToken::new())
        .unwrap()
        .done()
        .unwrap();

    assert!(h.prefs.auto_login().unwrap());
    let username = h.prefs.get_or(prefs::SAVED_USERNAME, "").unwrap();
    assert_eq!(deobfuscate(&username).unwrap(), "ana");
    let fingerprint = h.prefs.get_or(prefs::USER_CREDENTIALS, "").unwrap();
    assert_eq!(deobfuscate(&fingerprint).unwrap(), "ana|12345678901");
}

#[test]
fn resumed_session_is_attributed_without_logging_in_again() {
    let h = harness();
    let cancel = CancellationToken::new();
    let mut first = h.auth(Some(remember()));
    first.start().unwrap();
    let _ = first.fetch_authorized(PROFILE, None, true, &cancel).unwrap();
    first.stop().unwrap();
    assert_eq!(submissions(&h), 1);

    let mut second = h.auth(None);
    second.start().unwrap();
    let page = second
        .fetch_authorized(BILLS, None, false, &cancel)
        .unwrap()
        .done()
        .unwrap();

    assert!(page.url.starts_with(BILLS));
    assert_eq!(second.current_user().unwrap().username, "ana");
    assert_eq!(submissions(&h), 1);
}

#[test]
fn session_of_another_user_is_inconsistent() {
    let h = harness();
    let cancel = CancellationToken::new();
    let mut first = h.auth(Some(remember()));
    first.start().unwrap();
    let _ = first.fetch_authorized(PROFILE, None, true, &cancel).unwrap();
    first.stop().unwrap();
    h.prefs
        .set(prefs::USER_CREDENTIALS, &obfuscate("ana|99999999999"))
        .unwrap();

    let mut second = h.auth(None);
    second.start().unwrap();
    let err = second.fetch_authorized(PROFILE, None, false, &cancel).unwrap_err();

    assert!(matches!(err, PortalError::Inconsistent));
    assert!(second.current_user().is_none());
    assert!(!h.prefs.auto_login().unwrap());
    assert_eq!(h.portal.lock().unwrap().loads_of(LOGOUT), 1);
}

#[test]
fn cancelled_token_interrupts_after_the_fetch() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut auth = h.auth(Some(accept()));

    let outcome = auth.fetch_authorized(PROFILE, None, true, &cancel).unwrap();

    assert!(matches!(outcome, Flow::Interrupted(Interrupt::Cancelled)));
    assert_eq!(submissions(&h), 0);
}

#[test]
fn monitor_state_is_restored_after_logging_in() {
    let h = harness();
    let monitor = StateMonitor::new();
    monitor.set_message("Fetching general data...");
    monitor.set_progress(Progress::Fraction(0.5));
    let callback: CancelCallback = Arc::new(|| {});
    monitor.set_on_cancel(Some(callback));
    monitor.show();
    let mut auth = h.auth(Some(accept()));

    let _ = auth
        .fetch_authorized(PROFILE, Some(&monitor), true, &CancellationToken::new())
        .unwrap();

    let state = monitor.export_state();
    assert_eq!(state.message, "Fetching general data...");
    assert_eq!(state.progress, Progress::Fraction(0.5));
    assert!(state.on_cancel.is_some());
    assert!(monitor.is_visible());
    assert!(monitor.messages().contains(&"Logging in...".to_string()));
}

#[test]
fn logout_forgets_session_identity_and_credentials() {
    let h = harness();
    let cancel = CancellationToken::new();
    let mut auth = h.auth(Some(remember()));
    let _ = auth.fetch_authorized(PROFILE, None, true, &cancel).unwrap();
    auth.stop().unwrap();

    auth.logout().unwrap();

    assert!(auth.current_user().is_none());
    assert!(!h.prefs.auto_login().unwrap());
    assert_eq!(h.prefs.get_or(prefs::USER_CREDENTIALS, "").unwrap(), "");
    assert!(h.portal.lock().unwrap().sessions.is_empty());
    let outcome = auth.fetch_authorized(PROFILE, None, false, &cancel).unwrap();
    assert_eq!(outcome.interrupt(), Some(Interrupt::NotLoggedIn));
}
