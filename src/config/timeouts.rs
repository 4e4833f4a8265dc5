// ABOUTME: Wait and timeout configuration for lifecycle runs.
// ABOUTME: Durations are written in humantime form, e.g. 250ms or 10s.

use serde::Deserialize;
use std::time::Duration;

use crate::lifecycle::Timeouts;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsConfig {
    #[serde(default = "default_ready", with = "humantime_serde")]
    pub ready: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_stop", with = "humantime_serde")]
    pub stop: Duration,

    #[serde(default = "default_probe", with = "humantime_serde")]
    pub probe: Duration,

    #[serde(default = "default_probe_retry", with = "humantime_serde")]
    pub probe_retry: Duration,

    /// How long the worker scenario lets its container run.
    #[serde(default = "default_worker_observe", with = "humantime_serde")]
    pub worker_observe: Duration,
}

fn default_ready() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_stop() -> Duration {
    Duration::from_secs(10)
}

fn default_probe() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_retry() -> Duration {
    Duration::from_secs(30)
}

fn default_worker_observe() -> Duration {
    Duration::from_secs(8)
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            ready: default_ready(),
            poll_interval: default_poll_interval(),
            stop: default_stop(),
            probe: default_probe(),
            probe_retry: default_probe_retry(),
            worker_observe: default_worker_observe(),
        }
    }
}

impl TimeoutsConfig {
    /// The bounds a lifecycle run uses.
    pub fn lifecycle(&self) -> Timeouts {
        Timeouts {
            ready: self.ready,
            poll_interval: self.poll_interval,
            stop: self.stop,
            probe: self.probe,
            probe_retry: self.probe_retry,
        }
    }
}
