use std::collections::BTreeMap;

use tracing::debug;

use crate::config::FormatterConfig;
use crate::envelope::Envelope;
use crate::error::FormatterResult;
use crate::status::map_status;
use crate::transport::Transport;

/// Lifecycle notifications a test runner delivers to a formatter.
///
/// The runner owns the loop and calls these in order; implementors hold no
/// reference back into it.
pub trait FormatterHooks {
    fn on_feature_start(&mut self, name: &str);
    fn on_scenario_start(&mut self, name: &str);
    fn on_step_finished(&mut self, step: &FinishedStep);
    fn on_run_finished(&mut self);
    /// Release the connection even if the run never finished.
    fn teardown(&mut self);
}

/// Outcome of one executed step as reported by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedStep {
    /// Runner status name (`passed`, `failed`, ...).
    pub status: String,
    /// Elapsed time in seconds, if the runner measured it.
    pub duration: Option<f64>,
}

impl FinishedStep {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            duration: None,
        }
    }

    /// Attach the elapsed time in seconds.
    pub fn with_duration_secs(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Elapsed time in whole nanoseconds; missing, negative, or NaN is zero.
    pub fn duration_nanos(&self) -> u64 {
        let nanos = (self.duration.unwrap_or(0.0) * 1e9).round();
        // Float-to-int casts saturate and map NaN to 0.
        nanos as u64
    }
}

/// Turns runner lifecycle notifications into protocol messages.
///
/// Dropping the emitter runs [`FormatterHooks::teardown`], so the listener
/// always sees a goodbye handshake or a dropped connection.
#[derive(Debug)]
pub struct EventEmitter {
    transport: Transport,
    feature_count: u64,
    scenario_count: u64,
    step_count: u64,
}

impl EventEmitter {
    /// Connect to the listener described by `config`.
    pub fn new(config: &FormatterConfig) -> Self {
        Self {
            transport: Transport::connect(config),
            feature_count: 0,
            scenario_count: 0,
            step_count: 0,
        }
    }

    /// Resolve the port from the environment or runner userdata, then connect.
    pub fn from_env(userdata: &BTreeMap<String, String>) -> FormatterResult<Self> {
        let config = FormatterConfig::from_env(userdata)?;
        Ok(Self::new(&config))
    }

    pub fn feature_count(&self) -> u64 {
        self.feature_count
    }

    pub fn scenario_count(&self) -> u64 {
        self.scenario_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl FormatterHooks for EventEmitter {
    fn on_feature_start(&mut self, name: &str) {
        // Counted only; no feature envelope exists on the wire yet.
        self.feature_count += 1;
        debug!(feature = name, count = self.feature_count, "feature started");
    }

    fn on_scenario_start(&mut self, name: &str) {
        self.scenario_count += 1;
        debug!(scenario = name, count = self.scenario_count, "scenario started");
    }

    fn on_step_finished(&mut self, step: &FinishedStep) {
        self.step_count += 1;
        let envelope = Envelope::step_finished(
            format!("step-{}", self.step_count),
            map_status(&step.status),
            step.duration_nanos(),
        );
        self.transport.send(&envelope);
    }

    fn on_run_finished(&mut self) {
        // Step failures are not folded into the run outcome.
        self.transport.send(&Envelope::run_finished(true));
        self.transport.close();
    }

    fn teardown(&mut self) {
        self.transport.close();
    }
}

impl Drop for EventEmitter {
    fn drop(&mut self) {
        self.teardown();
    }
}
