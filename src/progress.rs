// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Progress reporting for long-running fetches. Front ends implement
//! [`ProgressMonitor`]; the pipeline receives it as an `Option` and behaves the
//! same whether or not one is supplied.

use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Progress {
    #[default]
    Indeterminate,
    /// Completed share in `0.0..=1.0`.
    Fraction(f64),
}

pub type CancelCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct ProgressState {
    pub message: String,
    pub progress: Progress,
    pub on_cancel: Option<CancelCallback>,
}

impl fmt::Debug for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressState")
            .field("message", &self.message)
            .field("progress", &self.progress)
            .field("cancellable", &self.on_cancel.is_some())
            .finish()
    }
}

pub trait ProgressMonitor: Send + Sync {
    fn set_message(&self, message: &str);
    fn set_progress(&self, progress: Progress);
    /// Registers what the front end's cancel control should trigger.
    fn set_on_cancel(&self, callback: Option<CancelCallback>);
    fn show(&self);
    fn hide(&self);
    fn export_state(&self) -> ProgressState;

    fn import_state(&self, state: ProgressState) {
        self.set_message(&state.message);
        self.set_progress(state.progress);
        self.set_on_cancel(state.on_cancel);
    }
}

/// Sets message and progress in one go when a monitor is present.
pub fn report(monitor: Option<&dyn ProgressMonitor>, message: &str, progress: Progress) {
    if let Some(m) = monitor {
        m.set_message(message);
        m.set_progress(progress);
    }
}

/// In-memory monitor that only keeps the latest state. Useful on its own for
/// headless runs and as the state holder of richer front ends.
#[derive(Default)]
pub struct StateMonitor {
    state: Mutex<ProgressState>,
    visible: Mutex<bool>,
    history: Mutex<Vec<String>>,
}

impl StateMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        *lock(&self.visible)
    }

    /// Every message set so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    /// Invokes the registered cancel callback, as a cancel button would.
    pub fn cancel(&self) {
        let callback = lock(&self.state).on_cancel.clone();
        if let Some(cb) = callback {
            cb();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ProgressMonitor for StateMonitor {
    fn set_message(&self, message: &str) {
        lock(&self.state).message = message.to_string();
        lock(&self.history).push(message.to_string());
    }

    fn set_progress(&self, progress: Progress) {
        lock(&self.state).progress = progress;
    }

    fn set_on_cancel(&self, callback: Option<CancelCallback>) {
        lock(&self.state).on_cancel = callback;
    }

    fn show(&self) {
        *lock(&self.visible) = true;
    }

    fn hide(&self) {
        *lock(&self.visible) = false;
    }

    fn export_state(&self) -> ProgressState {
        lock(&self.state).clone()
    }
}
