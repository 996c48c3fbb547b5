//! Notification sink (fire-and-forget side channel).
//!
//! Queue and settlement operations push messages here after their
//! transaction commits. A failing sink never fails the operation.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::StaffRole;

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification worker has stopped")]
    Disconnected,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyTarget {
    Patient { patient_id: String },
    Staff { clinic_id: String, role: StaffRole },
}

impl NotifyTarget {
    pub fn patient(patient_id: impl Into<String>) -> Self {
        NotifyTarget::Patient {
            patient_id: patient_id.into(),
        }
    }

    pub fn staff(clinic_id: impl Into<String>, role: StaffRole) -> Self {
        NotifyTarget::Staff {
            clinic_id: clinic_id.into(),
            role,
        }
    }
}

/// A message handed to a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub target: NotifyTarget,
    pub title: String,
    pub body: String,
}

/// Receiver of queue and settlement notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Send and swallow: failures are logged, never returned.
pub(crate) fn deliver(sink: &dyn NotificationSink, target: NotifyTarget, title: &str, body: String) {
    let notification = Notification {
        target,
        title: title.to_string(),
        body,
    };
    if let Err(e) = sink.notify(notification) {
        warn!("Notification '{}' dropped: {}", title, e);
    }
}

/// Logs every notification at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            "push {:?}: {} - {}",
            notification.target, notification.title, notification.body
        );
        Ok(())
    }
}

type Deliver = Box<dyn Fn(&Notification) -> Result<(), NotifyError> + Send>;

/// Hands notifications to a background thread through a bounded channel.
///
/// `notify` never blocks: a full queue is reported as
/// [`NotifyError::QueueFull`]. Dropping the sink drains the queue and joins
/// the worker.
pub struct QueuedSink {
    sender: Option<SyncSender<Notification>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedSink {
    /// Start a worker that calls `deliver` for each queued notification.
    pub fn spawn<F>(capacity: usize, deliver: F) -> Self
    where
        F: Fn(&Notification) -> Result<(), NotifyError> + Send + 'static,
    {
        let deliver: Deliver = Box::new(deliver);
        let (sender, receiver) = mpsc::sync_channel::<Notification>(capacity.max(1));
        let worker = thread::spawn(move || {
            for notification in receiver {
                match deliver(&notification) {
                    Ok(()) => debug!("Delivered '{}'", notification.title),
                    Err(e) => warn!("Delivery of '{}' failed: {}", notification.title, e),
                }
            }
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }
}

impl NotificationSink for QueuedSink {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let sender = self.sender.as_ref().ok_or(NotifyError::Disconnected)?;
        sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => NotifyError::QueueFull,
            TrySendError::Disconnected(_) => NotifyError::Disconnected,
        })
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Notification worker panicked");
            }
        }
    }
}

/// Keeps notifications in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every notification.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Everything accepted so far.
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Notifications addressed to one patient.
    pub fn sent_to_patient(&self, patient_id: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| matches!(&n.target, NotifyTarget::Patient { patient_id: p } if p == patient_id))
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("sink configured to fail".into()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Delivery("sink lock poisoned".into()))?;
        sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn message(title: &str) -> Notification {
        Notification {
            target: NotifyTarget::patient("patient-1"),
            title: title.into(),
            body: "body".into(),
        }
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        deliver(&sink, NotifyTarget::patient("patient-1"), "Queue", "You are #1".into());
        deliver(&sink, NotifyTarget::staff("clinic-1", StaffRole::Owner), "Day closed", "Total 0".into());

        assert_eq!(sink.sent().len(), 2);
        assert_eq!(sink.sent_to_patient("patient-1").len(), 1);
    }

    #[test]
    fn test_failing_sink_is_swallowed() {
        let sink = RecordingSink::failing();
        assert!(sink.notify(message("x")).is_err());
        // deliver logs and returns normally
        deliver(&sink, NotifyTarget::patient("patient-1"), "Queue", "body".into());
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_queued_sink_delivers_in_background() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&delivered);
        let sink = QueuedSink::spawn(8, move |n| {
            log.lock().unwrap().push(n.title.clone());
            Ok(())
        });

        sink.notify(message("first")).unwrap();
        sink.notify(message("second")).unwrap();
        drop(sink); // drains and joins

        assert_eq!(*delivered.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_queued_sink_reports_full_queue() {
        let gate = Arc::new(Barrier::new(2));
        let worker_gate = Arc::clone(&gate);
        let sink = QueuedSink::spawn(1, move |_| {
            worker_gate.wait();
            Ok(())
        });

        // The worker blocks on the gate for each message it takes, so the
        // single slot fills up quickly.
        let mut accepted = 0;
        let mut full = false;
        for _ in 0..100 {
            match sink.notify(message("queued")) {
                Ok(()) => accepted += 1,
                Err(NotifyError::QueueFull) => {
                    full = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(full);
        assert!(accepted >= 1);

        for _ in 0..accepted {
            gate.wait();
        }
        drop(sink);
    }
}
