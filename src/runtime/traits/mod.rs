// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, ImageOps, LogOps, RuntimeInfo and the Engine bundle.

mod container;
mod image;
mod logs;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;

pub use container::{ContainerError, ContainerOps};
pub use image::{BuildLog, ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogLines, LogOps, LogOptions, LogStream};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Every capability a lifecycle run needs.
///
/// Implemented automatically for any runtime with all four capabilities.
pub trait Engine: ContainerOps + ImageOps + LogOps + RuntimeInfo {}

impl<T: ContainerOps + ImageOps + LogOps + RuntimeInfo> Engine for T {}
