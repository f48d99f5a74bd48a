//! Safety timer for swings that never reach the finish condition.
//!
//! One background thread owns every pending deadline. Each deadline is keyed
//! by the [`SwingAttempt`] it was armed for; the callback receives that
//! attempt and is expected to ignore it when the swing has already moved on.

use super::SwingAttempt;
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum TimerCommand {
    Arm { attempt: SwingAttempt, deadline: Instant },
    Cancel(SwingAttempt),
    Shutdown,
}

/// Background timer firing a callback per expired swing attempt
pub struct TimeoutScheduler {
    tx: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl TimeoutScheduler {
    /// Start the timer thread
    pub fn spawn<F>(on_expire: F) -> std::io::Result<Self>
    where
        F: Fn(SwingAttempt) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<TimerCommand>();

        let worker = thread::Builder::new()
            .name("swing-timeout".to_string())
            .spawn(move || {
                let mut pending: Vec<(Instant, SwingAttempt)> = Vec::new();

                loop {
                    let next_deadline = pending.iter().map(|(deadline, _)| *deadline).min();
                    let command = match next_deadline {
                        Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(TimerCommand::Arm { attempt, deadline }) => {
                            pending.retain(|(_, a)| *a != attempt);
                            pending.push((deadline, attempt));
                        }
                        Ok(TimerCommand::Cancel(attempt)) => pending.retain(|(_, a)| *a != attempt),
                        Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    let now = Instant::now();
                    let (due, waiting): (Vec<_>, Vec<_>) =
                        pending.into_iter().partition(|(deadline, _)| *deadline <= now);
                    pending = waiting;
                    for (_, attempt) in due {
                        debug!("Swing timeout fired for attempt {attempt}");
                        on_expire(attempt);
                    }
                }
            })?;

        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Fire for `attempt` after `delay`, replacing any earlier arming
    pub fn arm(&self, attempt: SwingAttempt, delay: Duration) {
        let Some(deadline) = Instant::now().checked_add(delay) else {
            warn!("Swing timeout {delay:?} is out of range; attempt {attempt} is unguarded");
            return;
        };
        let command = TimerCommand::Arm { attempt, deadline };
        if self.tx.send(command).is_err() {
            warn!("Swing timeout thread has stopped; attempt {attempt} is unguarded");
        }
    }

    /// Drop the pending deadline for `attempt`, if any
    pub fn cancel(&self, attempt: SwingAttempt) {
        let _ = self.tx.send(TimerCommand::Cancel(attempt));
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Swing timeout thread panicked");
            }
        }
    }
}
