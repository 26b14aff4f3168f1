//! Capsules that record or fail on purpose.

use lifeline_capsule::{Capsule, CapsuleError, CapsuleResult};

use crate::log::EventLog;

/// Records `start <name>` and `stop <name>` into an [`EventLog`].
#[derive(Debug, Clone)]
pub struct RecordingCapsule {
    name: String,
    log: EventLog,
}

impl RecordingCapsule {
    /// Create a capsule recording into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl Capsule for RecordingCapsule {
    fn start(&self) -> CapsuleResult<()> {
        self.log.push(format!("start {}", self.name));
        Ok(())
    }

    fn stop(&self) -> CapsuleResult<()> {
        self.log.push(format!("stop {}", self.name));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Which half of the lifecycle a [`FailingCapsule`] fails in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `start` fails.
    Start,
    /// `start` succeeds and `stop` fails.
    Stop,
}

/// A capsule that fails in `start` or in `stop`.
#[derive(Debug, Clone)]
pub struct FailingCapsule {
    name: String,
    point: FailurePoint,
    log: Option<EventLog>,
}

impl FailingCapsule {
    /// A capsule whose start fails.
    #[must_use]
    pub fn on_start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            point: FailurePoint::Start,
            log: None,
        }
    }

    /// A capsule whose stop fails.
    #[must_use]
    pub fn on_stop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            point: FailurePoint::Stop,
            log: None,
        }
    }

    /// Also record attempts (`start <name>`, `stop <name>`) into `log`.
    #[must_use]
    pub fn recording(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    fn attempt(&self, point: FailurePoint, verb: &str) -> CapsuleResult<()> {
        if let Some(log) = &self.log {
            log.push(format!("{verb} {}", self.name));
        }
        if self.point == point {
            Err(CapsuleError::msg(format!("capsule '{}' failed to {verb}", self.name)))
        } else {
            Ok(())
        }
    }
}

impl Capsule for FailingCapsule {
    fn start(&self) -> CapsuleResult<()> {
        self.attempt(FailurePoint::Start, "start")
    }

    fn stop(&self) -> CapsuleResult<()> {
        self.attempt(FailurePoint::Stop, "stop")
    }

    fn name(&self) -> &str {
        &self.name
    }
}
