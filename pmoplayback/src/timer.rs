//! Cancellable background timers.
//!
//! Each timer owns a thread waiting on a stop channel alongside a crossbeam
//! `tick`/`after` channel. Cancelling (or dropping) the handle drops the stop
//! sender, which wakes the thread. Cancellation never joins, so it is safe to
//! cancel while holding a lock the callback also takes; a callback that may
//! already be running must re-check its own validity under that lock.

use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, TryRecvError, after, bounded, select, tick};

#[derive(Debug)]
pub struct RepeatingTask {
    stop: Option<Sender<()>>,
}

impl RepeatingTask {
    /// Runs `task` right away, then every `interval` until cancelled.
    pub fn spawn<F>(name: &str, interval: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(interval);

        thread::Builder::new().name(name.to_string()).spawn(move || {
            if let Err(TryRecvError::Disconnected) = stop_rx.try_recv() {
                return;
            }
            task();
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => task(),
                }
            }
        })?;

        Ok(Self {
            stop: Some(stop_tx),
        })
    }

    pub fn cancel(&mut self) {
        self.stop.take();
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug)]
pub struct DelayedTask {
    stop: Option<Sender<()>>,
}

impl DelayedTask {
    /// Runs `task` once after `delay` unless cancelled first.
    pub fn spawn<F>(name: &str, delay: Duration, task: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let deadline = after(delay);

        thread::Builder::new().name(name.to_string()).spawn(move || {
            select! {
                recv(stop_rx) -> _ => {},
                recv(deadline) -> _ => task(),
            }
        })?;

        Ok(Self {
            stop: Some(stop_tx),
        })
    }

    pub fn cancel(&mut self) {
        self.stop.take();
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    #[test]
    fn repeating_task_fires_until_cancelled() {
        let (tx, rx) = unbounded();
        let mut task = RepeatingTask::spawn("test-repeat", Duration::from_millis(10), move || {
            let _ = tx.send(Instant::now());
        })
        .unwrap();

        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        task.cancel();
        task.cancel();

        // At most one in-flight tick may still land after cancellation.
        thread::sleep(Duration::from_millis(50));
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delayed_task_fires_once() {
        let (tx, rx) = unbounded();
        let _task = DelayedTask::spawn("test-delay", Duration::from_millis(10), move || {
            let _ = tx.send(());
        })
        .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn cancelled_delayed_task_never_fires() {
        let (tx, rx) = unbounded::<()>();
        let task = DelayedTask::spawn("test-cancel", Duration::from_millis(30), move || {
            let _ = tx.send(());
        })
        .unwrap();
        drop(task);

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
