// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Terminal implementations of the interactive collaborators.

use crate::data::local_source::BillFileChooser;
use crate::progress::{CancelCallback, Progress, ProgressMonitor, ProgressState, StateMonitor};
use crate::web::login::{CredentialPrompt, LoginPromptResult};
use std::io::{self, BufRead, Stderr, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Typed at the username prompt to open sample data instead.
pub const OFFLINE_KEYWORD: &str = ":offline";

fn read_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Line-oriented answers typed by the user.
pub trait LineInput: Send {
    fn read_line(&mut self) -> Option<String>;

    /// Reads a line that must not be echoed.
    fn read_secret(&mut self) -> Option<String>;
}

/// The process stdin. Every handle reads through the one buffer std keeps,
/// so prompts never steal lines from each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

impl LineInput for StdinInput {
    fn read_line(&mut self) -> Option<String> {
        read_line(&mut io::stdin().lock())
    }

    fn read_secret(&mut self) -> Option<String> {
        match rpassword::read_password() {
            Ok(secret) => Some(secret),
            Err(e) => {
                log::warn!("No terminal for hidden input ({}); reading the password from stdin.", e);
                read_line(&mut io::stdin().lock())
            }
        }
    }
}

/// Answers from an in-memory or piped reader. A secret without a trailing
/// newline counts as no answer.
pub struct ReaderInput<R>(pub R);

impl<R: BufRead + Send> LineInput for ReaderInput<R> {
    fn read_line(&mut self) -> Option<String> {
        read_line(&mut self.0)
    }

    fn read_secret(&mut self) -> Option<String> {
        rpassword::read_password_from_bufread(&mut self.0).ok()
    }
}

impl<L: LineInput + ?Sized> LineInput for &mut L {
    fn read_line(&mut self) -> Option<String> {
        (**self).read_line()
    }

    fn read_secret(&mut self) -> Option<String> {
        (**self).read_secret()
    }
}

fn ask<I: LineInput, W: Write>(input: &mut I, output: &mut W, question: &str) -> Option<String> {
    let _ = write!(output, "{}", question);
    let _ = output.flush();
    input.read_line()
}

/// Asks a yes/no question; anything but `y` is a no.
pub fn confirm<I: LineInput, W: Write>(input: &mut I, output: &mut W, question: &str) -> bool {
    ask(input, output, &format!("{} [y/N]: ", question))
        .map(|a| a.trim().eq_ignore_ascii_case("y"))
        .unwrap_or(false)
}

pub struct TerminalPrompt<I, W> {
    input: I,
    output: W,
}

impl<I: LineInput, W: Write + Send> TerminalPrompt<I, W> {
    pub fn new(input: I, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalPrompt<StdinInput, Stderr> {
    pub fn stdio() -> Self {
        Self::new(StdinInput, io::stderr())
    }
}

impl<I: LineInput, W: Write + Send> CredentialPrompt for TerminalPrompt<I, W> {
    fn prompt_login(&mut self, error_message: Option<&str>) -> LoginPromptResult {
        if let Some(message) = error_message {
            let _ = writeln!(self.output, "Login failed: {}", message);
        }
        let question = format!("Username (empty to cancel, {} for sample data): ", OFFLINE_KEYWORD);
        let username = match ask(&mut self.input, &mut self.output, &question) {
            None => return LoginPromptResult::cancel(),
            Some(u) if u.trim().is_empty() => return LoginPromptResult::cancel(),
            Some(u) if u.trim() == OFFLINE_KEYWORD => return LoginPromptResult::offline(),
            Some(u) => u.trim().to_string(),
        };
        let _ = write!(self.output, "Password: ");
        let _ = self.output.flush();
        let Some(password) = self.input.read_secret() else {
            return LoginPromptResult::cancel();
        };
        let remember = confirm(&mut self.input, &mut self.output, "Remember me?");
        LoginPromptResult::accept(username, password, remember)
    }
}

pub struct TerminalFileChooser<I, W> {
    input: I,
    output: W,
}

impl<I: LineInput, W: Write + Send> TerminalFileChooser<I, W> {
    pub fn new(input: I, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalFileChooser<StdinInput, Stderr> {
    pub fn stdio() -> Self {
        Self::new(StdinInput, io::stderr())
    }
}

impl<I: LineInput, W: Write + Send> BillFileChooser for TerminalFileChooser<I, W> {
    fn choose_bills_file(&mut self) -> Option<PathBuf> {
        ask(
            &mut self.input,
            &mut self.output,
            "Path to an exported bills file (empty to cancel): ",
        )
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
    }

    fn report_error(&mut self, message: &str) {
        log::error!("{}", message);
        let _ = writeln!(self.output, "{}", message);
    }
}

/// Prints each new message to stderr while visible.
pub struct TerminalProgress<W> {
    state: StateMonitor,
    output: Mutex<W>,
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(output: W) -> Self {
        Self {
            state: StateMonitor::new(),
            output: Mutex::new(output),
        }
    }

    /// Triggers whatever cancel action is currently registered.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    fn print(&self) {
        if !self.state.is_visible() {
            return;
        }
        let snapshot = self.state.export_state();
        let line = match snapshot.progress {
            Progress::Indeterminate => snapshot.message,
            Progress::Fraction(f) => format!("{} ({:.0}%)", snapshot.message, f * 100.0),
        };
        let mut out = match self.output.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(out, "{}", line);
    }
}

impl TerminalProgress<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ProgressMonitor for TerminalProgress<W> {
    fn set_message(&self, message: &str) {
        self.state.set_message(message);
    }

    fn set_progress(&self, progress: Progress) {
        self.state.set_progress(progress);
        self.print();
    }

    fn set_on_cancel(&self, callback: Option<CancelCallback>) {
        self.state.set_on_cancel(callback);
    }

    fn show(&self) {
        self.state.show();
    }

    fn hide(&self) {
        self.state.hide();
    }

    fn export_state(&self) -> ProgressState {
        self.state.export_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_reads_credentials_and_remember_flag() {
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new("ana\nsecret\ny\n")), Vec::new());
        let r = p.prompt_login(Some("Wrong password"));
        assert_eq!(r, LoginPromptResult::accept("ana", "secret", true));
        assert!(String::from_utf8(p.output).unwrap().contains("Wrong password"));
    }

    #[test]
    fn prompt_cancel_and_offline() {
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new("\n")), Vec::new());
        assert!(p.prompt_login(None).cancelled);
        let offline = format!("{}\n", OFFLINE_KEYWORD);
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new(offline)), Vec::new());
        assert!(p.prompt_login(None).switch_to_offline);
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new("")), Vec::new());
        assert!(p.prompt_login(None).cancelled);
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new("ana\n")), Vec::new());
        assert!(p.prompt_login(None).cancelled);
    }

    #[test]
    fn password_is_not_echoed_back() {
        let mut p = TerminalPrompt::new(ReaderInput(Cursor::new("ana\nsecret\r\nn\n")), Vec::new());
        let r = p.prompt_login(None);
        assert_eq!(r, LoginPromptResult::accept("ana", "secret", false));
        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("Password: "));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn prompts_sharing_one_input_read_in_turn() {
        let mut input = ReaderInput(Cursor::new("ana\nsecret\nn\nbills.csv\ny\n"));
        let mut p = TerminalPrompt::new(&mut input, Vec::new());
        assert_eq!(p.prompt_login(None), LoginPromptResult::accept("ana", "secret", false));
        let mut chooser = TerminalFileChooser::new(&mut input, Vec::new());
        assert_eq!(chooser.choose_bills_file(), Some(PathBuf::from("bills.csv")));
        let mut out = Vec::new();
        assert!(confirm(&mut input, &mut out, "Retry?"));
        assert_eq!(String::from_utf8(out).unwrap(), "Retry? [y/N]: ");
        assert!(!confirm(&mut input, &mut Vec::new(), "Retry?"));
    }

    #[test]
    fn progress_prints_only_when_visible() {
        let monitor = TerminalProgress::new(Vec::new());
        monitor.set_message("hidden");
        monitor.set_progress(Progress::Indeterminate);
        monitor.show();
        monitor.set_message("Downloaded bills: 1/4");
        monitor.set_progress(Progress::Fraction(0.25));
        let out = monitor.output.lock().unwrap().clone();
        assert_eq!(String::from_utf8(out).unwrap(), "Downloaded bills: 1/4 (25%)\n");
    }
}
