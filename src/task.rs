// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{Flow, Interrupt};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Cooperative cancellation checkpoint.
pub fn check_cancelled(cancel: &CancellationToken) -> Flow<()> {
    if cancel.is_cancelled() {
        log::debug!("Cancellation requested; stopping at checkpoint.");
        Flow::Interrupted(Interrupt::Cancelled)
    } else {
        Flow::Done(())
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Job),
    Shutdown,
}

/// A single background thread that runs submitted jobs one at a time, in
/// submission order.
pub struct Worker {
    sender: mpsc::Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(command) = receiver.recv() {
                    match command {
                        Command::Run(job) => job(),
                        Command::Shutdown => break,
                    }
                }
                log::debug!("Worker thread finished.");
            })?;
        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queues `f` and returns a receiver for its result. The receiver reports a
    /// disconnect if the job panicked or the worker is gone.
    pub fn submit<T, F>(&self, f: F) -> mpsc::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        if self.sender.send(Command::Run(job)).is_err() {
            log::error!("Worker is no longer running; job dropped.");
        }
        rx
    }
}

/// Calls `on_interrupt` on every Ctrl-C until `stop` is cancelled. The
/// signal is only listened for while the watcher runs.
pub fn watch_interrupts<F>(stop: CancellationToken, on_interrupt: F) -> std::io::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("interrupts".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        signal = tokio::signal::ctrl_c() => match signal {
                            Ok(()) => {
                                log::info!("Interrupt received.");
                                on_interrupt();
                            }
                            Err(err) => {
                                log::warn!("Cannot listen for Ctrl-C: {err}");
                                break;
                            }
                        },
                    }
                }
            });
            log::debug!("Interrupt watcher finished.");
        })
}

impl Drop for Worker {
    fn drop(&mut self) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(Command::Shutdown) {
                log::error!("Failed to send shutdown to worker: {err}");
            }
            if let Err(join_err) = handle.join() {
                log::error!("Failed to join worker: {join_err:?}");
            }
        }
    }
}
