// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

//! A scripted portal behind the `Browser` seam, plus helpers that wire the
//! real pipeline to it.

use chrono::NaiveDateTime;
use mealbills::data::local_source::{BillFileChooser, LocalDataSource};
use mealbills::data::repository::Repository;
use mealbills::data::web_source::WebDataSource;
use mealbills::db::{self, Database};
use mealbills::error::{PortalError, PortalResult};
use mealbills::models::{sample_user_id, Article, Bill, BillEntry};
use mealbills::prefs::Prefs;
use mealbills::web::auth::AuthWebGateway;
use mealbills::web::browser::{Browser, Cookie, Page};
use mealbills::web::gateway::WebGateway;
use mealbills::web::login::{CredentialPrompt, LoginOrchestrator, LoginPromptResult};
use mealbills::web::PortalConfig;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "https://portal.test";
pub const LOGIN: &str = "https://login.test/sso/login";
pub const PROFILE: &str = "https://portal.test/Student";
pub const BILLS: &str = "https://portal.test/Student/Bills";
pub const LOGOUT: &str = "https://portal.test/Account/Logout";
pub const SESSION_COOKIE: &str = "sid";
pub const BAD_LOGIN_MESSAGE: &str = "Wrong username or password";

pub fn config() -> PortalConfig {
    PortalConfig {
        base_url: BASE.into(),
        login_base_url: LOGIN.into(),
        logout_url: LOGOUT.into(),
        profile_url: PROFILE.into(),
        bills_base_url: BILLS.into(),
        script_timeout: Duration::from_millis(1),
        request_timeout: Duration::from_secs(1),
        max_login_attempts: 5,
    }
}

pub struct Account {
    pub username: String,
    pub password: String,
    pub oib: String,
    pub full_name: String,
}

pub type LoadHook = Box<dyn FnMut(&str) + Send>;

/// Server side of the fake portal.
#[derive(Default)]
pub struct PortalState {
    pub accounts: Vec<Account>,
    /// session id -> username
    pub sessions: HashMap<String, String>,
    next_session: usize,
    /// The bills listing, in the order the portal serves it.
    pub bills: Vec<Bill>,
    pub loads: Vec<String>,
    pub detail_fetches: usize,
    pub login_submissions: usize,
    pub transport_down: bool,
    pub profile_redirect: Option<String>,
    pub on_load: Option<LoadHook>,
}

impl PortalState {
    pub fn with_account(username: &str, password: &str, oib: &str) -> Self {
        Self {
            accounts: vec![Account {
                username: username.into(),
                password: password.into(),
                oib: oib.into(),
                full_name: format!("{} Student", username),
            }],
            ..Self::default()
        }
    }

    pub fn loads_of(&self, prefix: &str) -> usize {
        self.loads.iter().filter(|u| u.starts_with(prefix)).count()
    }
}

pub type SharedPortal = Arc<Mutex<PortalState>>;

/// Client side: cookie jar and the page to return to after login.
pub struct FakeBrowser {
    portal: SharedPortal,
    jar: Vec<Cookie>,
    return_to: Option<String>,
}

impl FakeBrowser {
    pub fn new(portal: SharedPortal) -> Self {
        Self {
            portal,
            jar: Vec::new(),
            return_to: None,
        }
    }

    fn session_user(&self, state: &PortalState) -> Option<String> {
        self.jar
            .iter()
            .find(|c| c.name == SESSION_COOKIE)
            .and_then(|c| state.sessions.get(&c.value).cloned())
    }

    fn login_page(error: Option<&str>) -> Page {
        let error = error
            .map(|e| format!("<div class=\"error\">{}</div>", e))
            .unwrap_or_default();
        Page::new(
            format!("{}?AuthState=xyz", LOGIN),
            format!(
                "<html><body>{}<form name=\"f\" method=\"post\" action=\"{}\">\
                 <input type=\"hidden\" name=\"AuthState\" value=\"xyz\">\
                 <input type=\"text\" name=\"username\"><input type=\"password\" name=\"password\">\
                 <button type=\"submit\" name=\"Submit\">Login</button></form></body></html>",
                error, LOGIN
            ),
        )
    }

    fn serve(&mut self, url: &str) -> PortalResult<Page> {
        let mut guard = self.portal.lock().unwrap();
        let state = &mut *guard;
        state.loads.push(url.to_string());
        if let Some(hook) = state.on_load.as_mut() {
            hook(url);
        }
        if state.transport_down {
            return Err(PortalError::transport("connection refused"));
        }
        if url.starts_with(LOGIN) {
            return Ok(Self::login_page(None));
        }
        if url.starts_with(LOGOUT) {
            if let Some(c) = self.jar.iter().find(|c| c.name == SESSION_COOKIE) {
                state.sessions.remove(&c.value);
            }
            return Ok(Page::new(BASE, "<html>bye</html>"));
        }
        let Some(username) = self.session_user(state) else {
            self.return_to = Some(url.to_string());
            return Ok(Self::login_page(None));
        };
        let account = state
            .accounts
            .iter()
            .find(|a| a.username == username)
            .ok_or_else(|| PortalError::transport("unknown account"))?;

        if url.starts_with(BILLS) {
            return Ok(Page::new(url, listing_html(&state.bills)));
        }
        if url.starts_with(&format!("{}/Bill?i=", BASE)) {
            state.detail_fetches += 1;
            let index: usize = url.rsplit('=').next().and_then(|i| i.parse().ok()).unwrap_or(usize::MAX);
            let bill = state
                .bills
                .get(index)
                .ok_or_else(|| PortalError::transport("no such bill"))?;
            return Ok(Page::new(url, details_html(bill)));
        }
        if url.starts_with(PROFILE) {
            if let Some(target) = &state.profile_redirect {
                return Ok(Page::new(target.clone(), "<html>maintenance</html>"));
            }
            return Ok(Page::new(url, profile_html(account)));
        }
        Ok(Page::new(url, "<html>home</html>"))
    }
}

impl Browser for FakeBrowser {
    fn load(&mut self, url: &str) -> PortalResult<Page> {
        self.serve(url)
    }

    fn submit_form(&mut self, page: &Page, form_name: &str, fields: &[(&str, &str)]) -> PortalResult<Page> {
        assert!(page.url.starts_with(LOGIN), "login form submitted from {}", page.url);
        assert_eq!(form_name, "f");
        let field = |name: &str| {
            fields
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        };
        let (username, password) = (field("username"), field("password"));
        let session = {
            let mut state = self.portal.lock().unwrap();
            state.login_submissions += 1;
            let ok = state
                .accounts
                .iter()
                .any(|a| a.username == username && a.password == password);
            if !ok {
                return Ok(Self::login_page(Some(BAD_LOGIN_MESSAGE)));
            }
            state.next_session += 1;
            let sid = format!("s{}", state.next_session);
            state.sessions.insert(sid.clone(), username);
            sid
        };
        self.add_cookie(Cookie {
            name: SESSION_COOKIE.into(),
            value: session,
            domain: "portal.test".into(),
            path: "/".into(),
            expires: None,
        });
        let target = self.return_to.take().unwrap_or_else(|| PROFILE.to_string());
        self.serve(&target)
    }

    fn wait_for_scripts(&mut self, _timeout: Duration) -> usize {
        0
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.jar.clone()
    }

    fn add_cookie(&mut self, cookie: Cookie) {
        self.jar.retain(|c| c.name != cookie.name);
        self.jar.push(cookie);
    }

    fn clear_cookies(&mut self) {
        self.jar.clear();
    }
}

fn profile_html(a: &Account) -> String {
    format!(
        r#"<html><body>
        <section><div class="row"><h1>Student</h1></div>
          <div class="row"><div class="col">OIB: {oib}<br>JMBAG: 1</div></div></section>
        <div id="mainDivContent"><div class="row"><div class="col-7">
          <h2>{name}</h2>
          <p>Institution: Faculty of Engineering</p>
          <div><div><p>Level</p><p>Level 2</p></div><div><p>Balance</p><p>12,50 EUR</p></div></div>
        </div><div class="col-5"><a href="/Student/Bills?id=42">Bills</a></div></div></div>
        </body></html>"#,
        oib = a.oib,
        name = a.full_name
    )
}

fn listing_html(bills: &[Bill]) -> String {
    let mut rows = String::from("<tr><th>Source</th><th>Date</th><th>Time</th><th></th></tr>");
    for (i, b) in bills.iter().enumerate() {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><a href=\"/Bill?i={}\">Details</a></td></tr>",
            b.source,
            b.date_time.format("%-d.%-m.%Y."),
            b.date_time.format("%-H:%M"),
            i
        ));
    }
    format!("<html><body><table>{}</table></body></html>", rows)
}

fn comma(d: Decimal) -> String {
    format!("{:.2}", d).replace('.', ",")
}

fn details_html(bill: &Bill) -> String {
    let mut rows = String::from("<tr><th>Article</th><th>Qty</th><th>Price</th><th>Value</th><th>Subsidy</th></tr>");
    for e in &bill.entries {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            e.article.name,
            e.amount,
            comma(e.article.price),
            comma(e.total_value()),
            comma(e.subsidy)
        ));
    }
    rows.push_str(&format!(
        "<tr><td>Total</td><td></td><td></td><td>{}</td><td>{}</td></tr>",
        comma(bill.total_value()),
        comma(bill.total_subsidy())
    ));
    format!("<html><body><table>{}</table></body></html>", rows)
}

pub fn entry(name: &str, amount: u32, price_cents: i64, subsidy_cents: i64) -> BillEntry {
    BillEntry::new(
        Article::new(name, Decimal::new(price_cents, 2)),
        amount,
        Decimal::new(subsidy_cents, 2),
    )
}

pub fn bill(source: &str, date_time: &str, entries: Vec<BillEntry>) -> Bill {
    Bill {
        date_time: NaiveDateTime::parse_from_str(date_time, "%Y-%m-%d %H:%M").unwrap(),
        source: source.into(),
        user_id: sample_user_id(),
        entries,
    }
}

/// Answers login prompts from a script and records the error messages shown.
pub struct ScriptedPrompt {
    answers: VecDeque<LoginPromptResult>,
    pub seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<LoginPromptResult>) -> Self {
        Self {
            answers: answers.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CredentialPrompt for ScriptedPrompt {
    fn prompt_login(&mut self, error_message: Option<&str>) -> LoginPromptResult {
        self.seen.lock().unwrap().push(error_message.map(str::to_string));
        self.answers.pop_front().unwrap_or_else(LoginPromptResult::cancel)
    }
}

pub struct ScriptedChooser {
    answers: VecDeque<Option<PathBuf>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChooser {
    pub fn new(answers: Vec<Option<PathBuf>>) -> Self {
        Self {
            answers: answers.into(),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl BillFileChooser for ScriptedChooser {
    fn choose_bills_file(&mut self) -> Option<PathBuf> {
        self.answers.pop_front().flatten()
    }

    fn report_error(&mut self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Database plus a portal with one account (`ana` / `secret`).
pub struct Harness {
    pub db: Database,
    pub prefs: Prefs,
    pub portal: SharedPortal,
}

pub fn harness() -> Harness {
    let db = db::open_in_memory().unwrap();
    Harness {
        prefs: Prefs::new(db.clone()),
        portal: Arc::new(Mutex::new(PortalState::with_account("ana", "secret", "12345678901"))),
        db,
    }
}

impl Harness {
    pub fn gateway(&self) -> WebGateway {
        WebGateway::new(Box::new(FakeBrowser::new(self.portal.clone())), self.db.clone(), &config())
    }

    pub fn auth(&self, prompt: Option<Box<dyn CredentialPrompt>>) -> AuthWebGateway {
        let login = LoginOrchestrator::new(self.prefs.clone(), prompt);
        AuthWebGateway::new(self.gateway(), login, self.prefs.clone(), config())
    }

    pub fn web_source(&self, prompt: Option<Box<dyn CredentialPrompt>>) -> WebDataSource {
        WebDataSource::new(self.auth(prompt))
    }

    pub fn repository(&self, prompt: Option<Box<dyn CredentialPrompt>>, chooser: ScriptedChooser) -> Repository {
        Repository::new(
            self.db.clone(),
            Box::new(self.web_source(prompt)),
            Box::new(LocalDataSource::new(Box::new(chooser))),
        )
    }

    pub fn set_bills(&self, bills: Vec<Bill>) {
        self.portal.lock().unwrap().bills = bills;
    }

    pub fn detail_fetches(&self) -> usize {
        self.portal.lock().unwrap().detail_fetches
    }

    pub fn reset_counters(&self) {
        let mut state = self.portal.lock().unwrap();
        state.detail_fetches = 0;
        state.loads.clear();
    }
}

pub fn accept() -> Box<dyn CredentialPrompt> {
    Box::new(ScriptedPrompt::new(vec![LoginPromptResult::accept("ana", "secret", false)]))
}
