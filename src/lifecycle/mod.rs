// ABOUTME: Container lifecycle orchestration using the type state pattern.
// ABOUTME: Exports state markers, run plans, the controller, and run reports.

mod controller;
mod error;
mod machine;
mod plan;
mod report;
mod state;
mod transitions;

pub use controller::LifecycleController;
pub use error::{LifecycleError, LifecycleErrorKind};
pub use machine::{Lifecycle, RunRecord};
pub use plan::{ImageSource, ProbeSpec, RunPlan, Timeouts};
pub use report::{RunReport, RunSummary};
pub use state::{Created, HasContainer, ImageReady, Init, Probed, Removed, Running, Stopped};
pub use transitions::TransitionResult;
