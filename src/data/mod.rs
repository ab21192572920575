// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod exporter;
pub mod filter;
pub mod local_source;
pub mod repository;
pub mod store;
pub mod web_source;

use crate::error::{Flow, PortalResult};
use crate::models::{Bill, User};
use crate::progress::ProgressMonitor;
use tokio_util::sync::CancellationToken;

/// Where a refresh gets its user and bills from.
pub trait DataSource: Send {
    fn start(&mut self) -> PortalResult<()>;
    fn stop(&mut self) -> PortalResult<()>;

    fn fetch_profile(
        &mut self,
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<User>>;

    /// Bills not yet in `existing`, oldest first.
    fn fetch_bills(
        &mut self,
        existing: &[Bill],
        monitor: Option<&dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> PortalResult<Flow<Vec<Bill>>>;

    fn revoke_authorization(&mut self) -> PortalResult<()>;
}
