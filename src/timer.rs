//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Timer.
//!

const INFINITY: std::time::Duration = std::time::Duration::from_secs(9_999_999_999);

enum Message {
    RunAt(std::time::Instant, Box<dyn FnOnce() + Send + 'static>),
    Stop
}

/// Runs a handler once after a delay, on a dedicated thread.
pub struct OneShotTimer {
    sender: std::sync::mpsc::Sender<Message>
}

impl OneShotTimer {
    pub fn new() -> OneShotTimer {
        let (sender, receiver) = std::sync::mpsc::channel::<Message>();

        std::thread::spawn(move || {
            let mut pending: Option<(std::time::Instant, Box<dyn FnOnce() + Send + 'static>)> = None;

            loop {
                let timeout = match &pending {
                    Some((t, _)) => t.saturating_duration_since(std::time::Instant::now()),
                    None => INFINITY
                };

                match receiver.recv_timeout(timeout) {
                    Ok(Message::RunAt(target_time, handler)) => {
                        pending = Some((target_time, handler));
                    },

                    Ok(Message::Stop) => { pending = None; },

                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        if let Some((_, handler)) = pending.take() { handler(); }
                    },

                    _ => break
                }
            }
        });

        OneShotTimer{ sender }
    }

    /// Runs provided `handler` once after `delay`; any previously scheduled runs will be cancelled.
    pub fn run_once<F: FnOnce() + Send + 'static>(&self, delay: std::time::Duration, handler: F) {
        let _ = self.sender.send(Message::RunAt(std::time::Instant::now() + delay, Box::new(handler)));
    }

    pub fn stop(&self) {
        let _ = self.sender.send(Message::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::RecvTimeoutError;

    fn ms(num_millis: u64) -> std::time::Duration {
        std::time::Duration::from_millis(num_millis)
    }

    #[test]
    fn handler_runs_after_the_delay() {
        let timer = OneShotTimer::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let tstart = std::time::Instant::now();
        timer.run_once(ms(100), move || { tx.send(tstart.elapsed()).unwrap(); });

        let elapsed = rx.recv_timeout(ms(1000)).unwrap();
        assert!(elapsed >= ms(90), "ran after {:?}", elapsed);
    }

    #[test]
    fn rescheduling_cancels_the_previous_run() {
        let timer = OneShotTimer::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let tx1 = tx.clone();
        timer.run_once(ms(100), move || { tx1.send(1).unwrap(); });
        std::thread::sleep(ms(50));
        timer.run_once(ms(100), move || { tx.send(2).unwrap(); });

        assert_eq!(2, rx.recv_timeout(ms(1000)).unwrap());
        assert!(matches!(rx.recv_timeout(ms(200)), Err(RecvTimeoutError::Disconnected)));
    }

    #[test]
    fn stop_cancels_the_pending_run() {
        let timer = OneShotTimer::new();
        let (tx, rx) = std::sync::mpsc::channel::<()>();

        timer.run_once(ms(100), move || { tx.send(()).unwrap(); });
        timer.stop();

        assert!(rx.recv_timeout(ms(300)).is_err());
    }
}
