//! Injected collaborators shared by the queue, billing and settlement services.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::notify::{LogSink, NotificationSink};
use crate::queue::{AttendingDoctorResolver, FirstClinicDoctor};

/// Configuration, time source, notification sink and doctor strategy.
///
/// Cheap to clone; the server keeps one and hands it to every request.
#[derive(Clone)]
pub struct Collaborators {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn NotificationSink>,
    pub doctors: Arc<dyn AttendingDoctorResolver>,
}

impl Collaborators {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogSink),
            doctors: Arc::new(FirstClinicDoctor),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_doctor_resolver(mut self, doctors: Arc<dyn AttendingDoctorResolver>) -> Self {
        self.doctors = doctors;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
