//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Driver facade: owns the telescope, the periodic status poll worker and
//! the guide pulse completion timers.
//!

use crate::mount::Direction;
use crate::guiding::PulseOutcome;
use crate::telescope::{AbortSignal, DriverError, Telescope};
use crate::timer::OneShotTimer;
use std::sync::{Arc, Mutex};

pub struct MountDriver {
    telescope: Arc<Mutex<Telescope>>,
    abort_signal: AbortSignal,
    poll_stop: crossbeam::channel::Sender<()>,
    poll_worker: Option<std::thread::JoinHandle<()>>,
    guide_ra_timer: OneShotTimer,
    guide_dec_timer: OneShotTimer
}

impl MountDriver {
    pub fn new(telescope: Telescope, poll_period: std::time::Duration) -> MountDriver {
        let abort_signal = telescope.abort_signal();
        let telescope = Arc::new(Mutex::new(telescope));

        let (poll_stop, stop_receiver) = crossbeam::channel::bounded(1);
        let worker_telescope = Arc::clone(&telescope);
        let poll_worker = std::thread::spawn(move || {
            loop {
                match stop_receiver.recv_timeout(poll_period) {
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                        if let Err(e) = worker_telescope.lock().unwrap().poll() {
                            log::warn!("status poll failed: {}", e);
                        }
                    },
                    _ => break
                }
            }
            log::info!("poll worker: ending");
        });

        MountDriver{
            telescope,
            abort_signal,
            poll_stop,
            poll_worker: Some(poll_worker),
            guide_ra_timer: OneShotTimer::new(),
            guide_dec_timer: OneShotTimer::new()
        }
    }

    /// The telescope itself; most commands go straight through this lock.
    pub fn telescope(&self) -> &Arc<Mutex<Telescope>> {
        &self.telescope
    }

    /// Aborts mount motion. Unlike locking the telescope directly, this also
    /// reaches a slew confirmation loop that currently holds the lock: the
    /// signal is raised first, the loop bails out on its next check, and only
    /// then is the regular abort issued.
    pub fn abort(&self) -> Result<(), DriverError> {
        self.abort_signal.request();
        self.telescope.lock().unwrap().abort()
    }

    /// Fires a guide pulse; completion of a long pulse is delivered by timer.
    pub fn guide(&self, dir: Direction, duration_ms: u32) -> Result<PulseOutcome, DriverError> {
        let outcome = self.telescope.lock().unwrap().guide(dir, duration_ms)?;

        if outcome == PulseOutcome::InFlight {
            let axis = dir.axis();
            let telescope = Arc::clone(&self.telescope);
            let timer = match axis {
                crate::mount::EqAxis::Ra => &self.guide_ra_timer,
                crate::mount::EqAxis::Dec => &self.guide_dec_timer
            };
            timer.run_once(
                std::time::Duration::from_millis(duration_ms as u64),
                move || {
                    telescope.lock().unwrap().complete_guide(axis);
                    log::info!("guide pulse on {:?} axis complete", axis);
                }
            );
        }

        Ok(outcome)
    }

    /// Stops the poll worker; called automatically on drop.
    pub fn stop(&mut self) {
        if let Some(worker) = self.poll_worker.take() {
            let _ = self.poll_stop.send(());
            worker.join().unwrap();
        }
        self.guide_ra_timer.stop();
        self.guide_dec_timer.stop();
    }
}

impl Drop for MountDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
