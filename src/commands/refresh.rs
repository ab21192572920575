// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::open_repository;
use crate::data::repository::{Mode, Repository, SyncOutcome};
use crate::db::Database;
use crate::error::{BackgroundTaskFault, PortalError};
use crate::prefs::{self, Prefs};
use crate::progress::ProgressMonitor;
use crate::task::{self, Worker};
use crate::term::{self, StdinInput, TerminalProgress};
use anyhow::{Context, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn handle(db: &Database, m: &clap::ArgMatches) -> Result<()> {
    let interactive = !m.get_flag("no-prompt");
    let mut repo = open_repository(db, interactive)?;
    if m.get_flag("offline") {
        repo.set_mode(Mode::Offline);
    }
    repo.start()?;

    let monitor = Arc::new(TerminalProgress::stderr());
    monitor.show();
    let stop = CancellationToken::new();
    let watcher = task::watch_interrupts(stop.clone(), cancel_on_interrupt(monitor.clone()))?;
    let finished = run_on_worker(repo, monitor.clone(), CancellationToken::new(), ask_retry);
    stop.cancel();
    if watcher.join().is_err() {
        log::error!("Interrupt watcher panicked.");
    }
    let (mut repo, outcome) = finished?;
    monitor.hide();

    let result = report(db, &repo, outcome);
    repo.stop()?;
    result
}

/// First Ctrl-C cancels the running step through the monitor, the second quits.
fn cancel_on_interrupt(monitor: Arc<TerminalProgress<io::Stderr>>) -> impl Fn() + Send + 'static {
    let pressed = AtomicBool::new(false);
    move || {
        if pressed.swap(true, Ordering::SeqCst) {
            eprintln!("Interrupted.");
            std::process::exit(130);
        }
        eprintln!("Cancelling... press Ctrl-C again to quit.");
        monitor.cancel();
    }
}

/// Runs the sync on the background worker. While the portal is unreachable
/// `retry` decides whether to try again.
pub fn run_on_worker<M, R>(
    repo: Repository,
    monitor: Arc<M>,
    cancel: CancellationToken,
    mut retry: R,
) -> Result<(Repository, Result<SyncOutcome, BackgroundTaskFault>)>
where
    M: ProgressMonitor + 'static,
    R: FnMut(&PortalError) -> bool,
{
    let worker = Worker::spawn("refresh")?;
    let mut repo = repo;
    loop {
        let job_monitor = monitor.clone();
        let token = cancel.clone();
        let receiver = worker.submit(move || {
            let m: &dyn ProgressMonitor = job_monitor.as_ref();
            let outcome = repo.sync(Some(m), &token);
            (repo, outcome)
        });
        let (returned, outcome) = receiver.recv().context("Refresh worker stopped unexpectedly")?;
        repo = returned;
        match outcome {
            Ok(SyncOutcome::TransportFailed(e)) if retry(&e) => continue,
            other => return Ok((repo, other)),
        }
    }
}

fn ask_retry(e: &PortalError) -> bool {
    eprintln!("Could not reach the portal: {}", e);
    term::confirm(&mut StdinInput, &mut io::stderr(), "Retry?")
}

fn report(db: &Database, repo: &Repository, outcome: Result<SyncOutcome, BackgroundTaskFault>) -> Result<()> {
    match outcome {
        Ok(SyncOutcome::Refreshed(summary)) => {
            let name = repo.user().map(|u| u.full_name.as_str()).unwrap_or("-");
            if repo.mode() == Mode::Online {
                if let Some(user) = repo.user() {
                    Prefs::new(db.clone()).set(prefs::LAST_USER, &user.id.to_string())?;
                }
            }
            println!(
                "{}: {} new bills, {} in total.",
                name, summary.new_bills, summary.total_bills
            );
        }
        Ok(SyncOutcome::Cancelled) => println!("Refresh cancelled."),
        Ok(SyncOutcome::Exit) => log::info!("Login cancelled; exiting."),
        Ok(SyncOutcome::NotLoggedIn) => {
            eprintln!("Not logged in. Run `mealbills refresh` without --no-prompt to log in.");
        }
        Ok(SyncOutcome::TransportFailed(e)) => {
            return Err(anyhow::Error::new(e).context("Could not reach the portal"));
        }
        Err(fault) if fault.should_exit => return Err(fault.into()),
        Err(fault) => eprintln!("{}", fault),
    }
    Ok(())
}
