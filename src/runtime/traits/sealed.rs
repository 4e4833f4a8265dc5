// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only runtimes defined in this crate implement the capability traits.

/// Sealed trait to prevent external implementations.
///
/// New methods can be added to the runtime traits without a breaking change
/// because only types inside this crate implement them.
pub trait Sealed {}
