// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed IDs, image references, and container names.

mod container_name;
mod id;
mod image_ref;

pub use container_name::{ContainerName, ContainerNameError};
pub use id::{ContainerId, Id, ImageId};
pub use image_ref::{ImageRef, ParseImageRefError};
