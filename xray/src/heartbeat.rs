use crate::client::Operation;
use log::{info, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receives liveness notices while a request is in flight.
pub trait Progress: Send + Sync {
    fn still_working(&self, operation: Operation);
}

#[derive(Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn still_working(&self, operation: Operation) {
        info!("{}", operation.still_working());
    }
}

/// Periodic notifier bound to the scope that created it.
///
/// Dropping the heartbeat stops the notifier thread and waits for it, so no
/// notice is delivered after the owning request has settled, whether it
/// returned, failed or unwound.
pub struct Heartbeat {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start(operation: Operation, interval: Duration, progress: Arc<dyn Progress>) -> Heartbeat {
        let (stop, stopped) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name(format!("{}-heartbeat", operation.name()))
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => progress.still_working(operation),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start progress notifier: {}", e);
                None
            }
        };
        Heartbeat {
            stop: Some(stop),
            handle,
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingProgress;
    use super::*;
    use std::panic;

    #[test]
    fn ticks_until_dropped() {
        let progress = Arc::new(CountingProgress::default());
        let heartbeat = Heartbeat::start(
            Operation::ImportExecutionResults,
            Duration::from_millis(10),
            progress.clone(),
        );
        thread::sleep(Duration::from_millis(100));
        drop(heartbeat);
        let ticks = progress.count();
        assert!(ticks > 0);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(progress.count(), ticks);
    }

    #[test]
    fn stops_on_unwind() {
        let progress = Arc::new(CountingProgress::default());
        let notified = progress.clone();
        let result = panic::catch_unwind(move || {
            let _heartbeat = Heartbeat::start(
                Operation::ExportCucumberTests,
                Duration::from_millis(5),
                notified,
            );
            thread::sleep(Duration::from_millis(30));
            panic!("request blew up");
        });
        assert!(result.is_err());
        let ticks = progress.count();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(progress.count(), ticks);
    }
}
