// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Faults raised by the scraping pipeline. Control flow outcomes such as a
/// cancelled prompt are not errors; they travel as [`Flow::Interrupted`].
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("communication with the portal failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("unexpected portal response: {0}")]
    UnexpectedResponse(String),

    #[error("login failed: {message}")]
    LoginFailed { message: String },

    #[error("the user logged on the portal does not have the expected credentials")]
    Inconsistent,

    #[error("{0}")]
    Precondition(String),

    #[error("could not parse portal data: {0}")]
    Parse(String),

    #[error("data source mode switched {0} times without a successful refresh")]
    ModeSwitchLimit(usize),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<reqwest::Error> for PortalError {
    fn from(e: reqwest::Error) -> Self {
        PortalError::Transport(Box::new(e))
    }
}

impl PortalError {
    pub fn transport(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        PortalError::Transport(msg.into())
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

/// Why an operation stopped before producing its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The user dismissed the credential prompt.
    InputCancelled,
    /// The user asked for sample/offline data instead of logging in.
    SwitchOffline,
    /// A login was required but auto-login is off and prompting was not allowed.
    NotLoggedIn,
    /// The cancellation token was triggered at a checkpoint.
    Cancelled,
}

#[derive(Debug)]
#[must_use]
pub enum Flow<T> {
    Done(T),
    Interrupted(Interrupt),
}

impl<T> Flow<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Flow::Done(v) => Some(v),
            Flow::Interrupted(_) => None,
        }
    }

    pub fn interrupt(&self) -> Option<Interrupt> {
        match self {
            Flow::Done(_) => None,
            Flow::Interrupted(i) => Some(*i),
        }
    }
}

/// Unwraps a [`Flow::Done`] value, or returns `Ok(Flow::Interrupted(..))`
/// from the enclosing function.
#[macro_export]
macro_rules! proceed {
    ($flow:expr) => {
        match $flow {
            $crate::error::Flow::Done(v) => v,
            $crate::error::Flow::Interrupted(i) => {
                return Ok($crate::error::Flow::Interrupted(i));
            }
        }
    };
}

/// Catch-all for a failure inside a background task, carrying whether the
/// front end should exit after reporting it.
#[derive(Debug, Error)]
#[error("background task failed: {cause}")]
pub struct BackgroundTaskFault {
    #[source]
    pub cause: PortalError,
    pub should_exit: bool,
}
