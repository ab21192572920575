// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{PortalError, PortalResult};
use crate::html;
use crate::utils::http_client;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::blocking::Client;
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;
const MAX_AUTO_POSTS: usize = 3;

/// `Expires` layouts seen in the wild besides RFC 2822.
const COOKIE_DATE_FORMATS: &[&str] = &[
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

/// A fetched document and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub html: String,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// `None` for session cookies.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        let domain = self.domain.trim_start_matches('.');
        let host_ok = host == domain || host.ends_with(&format!(".{}", domain));
        host_ok && url.path().starts_with(&self.path)
    }
}

/// Browser-emulation seam. Implementations own the cookie jar.
pub trait Browser: Send {
    fn load(&mut self, url: &str) -> PortalResult<Page>;

    /// Submits the form named `form_name` on `page`, keeping its pre-filled
    /// inputs and overriding those listed in `fields`.
    fn submit_form(
        &mut self,
        page: &Page,
        form_name: &str,
        fields: &[(&str, &str)],
    ) -> PortalResult<Page>;

    /// Waits up to `timeout` for background scripts; returns how many are
    /// still running.
    fn wait_for_scripts(&mut self, timeout: Duration) -> usize;

    fn cookies(&self) -> Vec<Cookie>;
    fn add_cookie(&mut self, cookie: Cookie);
    fn clear_cookies(&mut self);
}

/// [`Browser`] over a blocking `reqwest` client. Redirects are followed by hand
/// so that cookies set on intermediate hops (SSO) land in the jar.
pub struct HttpBrowser {
    client: Client,
    jar: Vec<Cookie>,
}

impl HttpBrowser {
    pub fn new(timeout: Duration) -> PortalResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            jar: Vec::new(),
        })
    }

    fn send(&mut self, method: Method, url: Url, form: Option<Vec<(String, String)>>) -> PortalResult<Page> {
        let mut method = method;
        let mut url = url;
        let mut form = form;
        for _ in 0..=MAX_REDIRECTS {
            let mut req = self.client.request(method.clone(), url.clone());
            let cookie_header = self.cookie_header(&url);
            if !cookie_header.is_empty() {
                req = req.header(COOKIE, cookie_header);
            }
            if let Some(fields) = &form {
                req = req.form(fields);
            }
            let resp = req.send()?;
            self.absorb_cookies(&url, resp.headers().get_all(SET_COOKIE).iter());

            if resp.status().is_redirection() {
                if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                    let next = url
                        .join(location)
                        .map_err(|e| PortalError::UnexpectedResponse(format!("bad redirect '{}': {}", location, e)))?;
                    log::debug!("Redirected to {}", next);
                    if resp.status().as_u16() != 307 && resp.status().as_u16() != 308 {
                        method = Method::GET;
                        form = None;
                    }
                    url = next;
                    continue;
                }
            }
            if !resp.status().is_success() {
                log::debug!("Portal answered {} for {}", resp.status(), url);
            }
            let html = resp.text()?;
            return Ok(Page::new(url.as_str(), html));
        }
        Err(PortalError::UnexpectedResponse(format!(
            "too many redirects starting at {}",
            url
        )))
    }

    fn cookie_header(&self, url: &Url) -> String {
        let now = Utc::now();
        self.jar
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn absorb_cookies<'a>(
        &mut self,
        url: &Url,
        headers: impl Iterator<Item = &'a reqwest::header::HeaderValue>,
    ) {
        let now = Utc::now();
        self.jar.retain(|c| !c.is_expired(now));
        for raw in headers.filter_map(|h| h.to_str().ok()) {
            if let Some(cookie) = parse_set_cookie(raw, url, now) {
                self.jar
                    .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
                if cookie.is_expired(now) {
                    log::debug!("Cookie {} removed by the server.", cookie.name);
                } else {
                    self.jar.push(cookie);
                }
            }
        }
    }

    /// The SSO hands its assertion back through a form that a script submits on
    /// load. Without a script engine, post it here.
    fn follow_auto_post(&mut self, mut page: Page) -> PortalResult<Page> {
        for _ in 0..MAX_AUTO_POSTS {
            let Some(form) = html::blocks(&page.html, "form")
                .into_iter()
                .find(|f| html::to_lowercase_fast(f).contains("name=\"samlresponse\""))
            else {
                break;
            };
            log::debug!("Submitting SSO assertion form from {}", page.url);
            let parsed = parse_form(form, &page.url)?;
            page = self.send(parsed.method, parsed.action, Some(parsed.inputs))?;
        }
        Ok(page)
    }
}

impl Browser for HttpBrowser {
    fn load(&mut self, url: &str) -> PortalResult<Page> {
        let url = Url::parse(url)
            .map_err(|e| PortalError::Precondition(format!("invalid URL '{}': {}", url, e)))?;
        let page = self.send(Method::GET, url, None)?;
        self.follow_auto_post(page)
    }

    fn submit_form(
        &mut self,
        page: &Page,
        form_name: &str,
        fields: &[(&str, &str)],
    ) -> PortalResult<Page> {
        let form = html::find_block(&page.html, "form", "name", form_name).ok_or_else(|| {
            PortalError::UnexpectedResponse(format!("form '{}' not found on {}", form_name, page.url))
        })?;
        let mut parsed = parse_form(form, &page.url)?;
        for (name, value) in fields {
            match parsed.inputs.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => parsed.inputs.push((name.to_string(), value.to_string())),
            }
        }
        let response = self.send(parsed.method, parsed.action, Some(parsed.inputs))?;
        self.follow_auto_post(response)
    }

    fn wait_for_scripts(&mut self, _timeout: Duration) -> usize {
        // a plain HTTP client never runs page scripts
        0
    }

    fn cookies(&self) -> Vec<Cookie> {
        let now = Utc::now();
        self.jar.iter().filter(|c| !c.is_expired(now)).cloned().collect()
    }

    fn add_cookie(&mut self, cookie: Cookie) {
        self.jar
            .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
        self.jar.push(cookie);
    }

    fn clear_cookies(&mut self) {
        self.jar.clear();
    }
}

struct ParsedForm {
    method: Method,
    action: Url,
    inputs: Vec<(String, String)>,
}

fn parse_form(form: &str, page_url: &str) -> PortalResult<ParsedForm> {
    let base = Url::parse(page_url)
        .map_err(|e| PortalError::UnexpectedResponse(format!("invalid page URL '{}': {}", page_url, e)))?;
    let action = match html::attr(form, "action").filter(|a| !a.is_empty()) {
        Some(a) => base
            .join(&a)
            .map_err(|e| PortalError::UnexpectedResponse(format!("bad form action '{}': {}", a, e)))?,
        None => base,
    };
    let method = match html::attr(form, "method").map(|m| m.to_ascii_uppercase()) {
        Some(m) if m == "GET" => Method::GET,
        _ => Method::POST,
    };
    let mut inputs = Vec::new();
    for input in html::open_tags(form, "input") {
        let Some(name) = html::attr(input, "name") else {
            continue;
        };
        let kind = html::attr(input, "type").unwrap_or_default().to_ascii_lowercase();
        let checked = html::to_lowercase_fast(input).contains(" checked");
        match kind.as_str() {
            "submit" | "button" | "image" | "reset" | "file" => continue,
            "checkbox" | "radio" if !checked => continue,
            _ => {}
        }
        inputs.push((name, html::attr(input, "value").unwrap_or_default()));
    }
    for button in html::blocks(form, "button") {
        if let (Some(name), Some(value)) = (html::attr(button, "name"), html::attr(button, "value")) {
            inputs.push((name, value));
        }
    }
    Ok(ParsedForm {
        method,
        action,
        inputs,
    })
}

/// Parses a `Set-Cookie` header. `Max-Age` wins over `Expires`; a cookie that
/// is already expired asks for its deletion.
fn parse_set_cookie(raw: &str, url: &Url, now: DateTime<Utc>) -> Option<Cookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    if name.is_empty() {
        return None;
    }
    let mut cookie = Cookie {
        name: name.trim().to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: url.host_str().unwrap_or_default().to_string(),
        path: "/".to_string(),
        expires: None,
    };
    let mut max_age = None;
    for attr in parts {
        let (key, val) = attr.trim().split_once('=').unwrap_or((attr.trim(), ""));
        let val = val.trim();
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => cookie.domain = val.trim_start_matches('.').to_string(),
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "max-age" => match val.parse::<i64>() {
                Ok(seconds) if seconds <= 0 => max_age = Some(now),
                Ok(seconds) => {
                    max_age = TimeDelta::try_seconds(seconds).and_then(|d| now.checked_add_signed(d))
                }
                Err(_) => log::debug!("Ignoring cookie Max-Age '{}'", val),
            },
            "expires" => match parse_cookie_date(val) {
                Some(at) => cookie.expires = Some(at),
                None => log::debug!("Ignoring cookie Expires '{}'", val),
            },
            _ => {}
        }
    }
    if max_age.is_some() {
        cookie.expires = max_age;
    }
    Some(cookie)
}

fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(at.with_timezone(&Utc));
    }
    COOKIE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn set_cookie_attributes() {
        let url = Url::parse("https://issp.srce.hr/Student").unwrap();
        let now = Utc::now();
        let c = parse_set_cookie("ASP.NET_SessionId=abc; path=/; HttpOnly; SameSite=Lax", &url, now).unwrap();
        assert_eq!(c.name, "ASP.NET_SessionId");
        assert_eq!(c.value, "abc");
        assert_eq!(c.domain, "issp.srce.hr");
        assert_eq!(c.expires, None);
        assert!(!c.is_expired(now));

        let c = parse_set_cookie("auth=; Max-Age=0; Domain=.srce.hr", &url, now).unwrap();
        assert!(c.is_expired(now));
    }

    #[test]
    fn past_expiry_dates_delete_the_cookie() {
        let url = Url::parse("https://issp.srce.hr/Student").unwrap();
        let now = at("2024-06-01T12:00:00Z");

        let c = parse_set_cookie(".ASPXAUTH=; expires=Mon, 11-Oct-1999 22:00:00 GMT; path=/", &url, now).unwrap();
        assert_eq!(c.expires, Some(at("1999-10-11T22:00:00Z")));
        assert!(c.is_expired(now));

        let c = parse_set_cookie("sid=abc; Expires=Wed, 21 Oct 2015 07:28:00 GMT", &url, now).unwrap();
        assert_eq!(c.expires, Some(at("2015-10-21T07:28:00Z")));
        assert!(c.is_expired(now));

        let c = parse_set_cookie("sid=abc; Expires=Sun, 21 Oct 2035 07:28:00 GMT", &url, now).unwrap();
        assert!(!c.is_expired(now));
    }

    #[test]
    fn max_age_wins_over_expires() {
        let url = Url::parse("https://issp.srce.hr/Student").unwrap();
        let now = at("2024-06-01T12:00:00Z");

        let c = parse_set_cookie("sid=abc; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=60", &url, now).unwrap();
        assert_eq!(c.expires, Some(at("2024-06-01T12:01:00Z")));
        assert!(!c.is_expired(now));
        assert!(c.is_expired(at("2024-06-01T12:01:00Z")));

        let c = parse_set_cookie("sid=abc; Max-Age=soon; Expires=bogus", &url, now).unwrap();
        assert_eq!(c.expires, None);
    }

    #[test]
    fn cookies_match_subdomains_and_paths() {
        let c = Cookie {
            name: "s".into(),
            value: "1".into(),
            domain: "srce.hr".into(),
            path: "/Student".into(),
            expires: None,
        };
        assert!(c.matches(&Url::parse("https://issp.srce.hr/Student/StudentRacuni").unwrap()));
        assert!(!c.matches(&Url::parse("https://issp.srce.hr/Account").unwrap()));
        assert!(!c.matches(&Url::parse("https://evilsrce.hr/Student").unwrap()));
    }

    #[test]
    fn form_keeps_hidden_inputs_and_resolves_action() {
        let form = r#"<form name="f" method="post" action="loginuserpass.php?x=1">
            <input type="hidden" name="AuthState" value="st&amp;1">
            <input type="text" name="username" value="">
            <input type="password" name="password">
            <input type="checkbox" name="remember">
            <button type="submit" name="Submit" value="Prijava">Prijava</button>
        </form>"#;
        let parsed = parse_form(form, "https://login.aaiedu.hr/sso/module.php/core/loginuserpass.php").unwrap();
        assert_eq!(parsed.method, Method::POST);
        assert_eq!(
            parsed.action.as_str(),
            "https://login.aaiedu.hr/sso/module.php/core/loginuserpass.php?x=1"
        );
        let names: Vec<&str> = parsed.inputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["AuthState", "username", "password", "Submit"]);
        assert_eq!(parsed.inputs[0].1, "st&1");
    }
}
