// ABOUTME: Generic lifecycle struct parameterized by state marker.
// ABOUTME: Carries the plan and everything a run has learned so far.

use crate::probe::ProbeResult;
use crate::runtime::{ContainerHandle, ImageHandle};

use super::plan::RunPlan;
use super::state::{HasContainer, Init};

/// What a run has produced so far, independent of its state.
#[derive(Debug)]
pub struct RunRecord {
    pub plan: RunPlan,
    /// Image pulled or built by this run.
    pub image: Option<ImageHandle>,
    pub build_log: Vec<String>,
    /// Output of an attached container, or the log tail of a detached one.
    pub output: Option<String>,
    pub probe: Option<ProbeResult>,
}

/// One container's trip through the lifecycle, parameterized by its state.
///
/// Transitions consume `self`. Those that can fail after a container exists
/// hand the lifecycle back with the error so it can still be torn down.
#[derive(Debug)]
pub struct Lifecycle<S> {
    pub(crate) record: RunRecord,
    pub(crate) state: S,
}

impl Lifecycle<Init> {
    pub fn new(plan: RunPlan) -> Self {
        Lifecycle {
            record: RunRecord {
                plan,
                image: None,
                build_log: Vec::new(),
                output: None,
                probe: None,
            },
            state: Init,
        }
    }
}

impl<S> Lifecycle<S> {
    pub fn plan(&self) -> &RunPlan {
        &self.record.plan
    }

    /// Drop the state, keeping what the run produced.
    pub fn into_record(self) -> RunRecord {
        self.record
    }
}

impl<S: HasContainer> Lifecycle<S> {
    pub fn handle(&self) -> &ContainerHandle {
        self.state.handle()
    }
}
