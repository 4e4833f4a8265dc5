// ABOUTME: Lifecycle state marker types for the type state pattern.
// ABOUTME: States past creation carry the container handle they manage.

use crate::runtime::ContainerHandle;

/// Nothing done yet.
/// Available actions: `prepare_image()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Init;

/// Image present locally (pulled, built, or assumed).
/// Available actions: `create()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageReady;

/// Container created, not started.
/// Available actions: `start()`, `teardown()`
#[derive(Debug)]
pub struct Created {
    pub(crate) handle: ContainerHandle,
}

/// Container started. Attached runs may have exited already.
/// Available actions: `await_exit()`, `wait_ready()`, `observe()`, `probe()`, `teardown()`
#[derive(Debug)]
pub struct Running {
    pub(crate) handle: ContainerHandle,
}

/// Probe done, or none configured.
/// Available actions: `refresh()`, `stop()`, `teardown()`
#[derive(Debug)]
pub struct Probed {
    pub(crate) handle: ContainerHandle,
}

/// Stop requested.
/// Available actions: `remove()`
#[derive(Debug)]
pub struct Stopped {
    pub(crate) handle: ContainerHandle,
}

/// Teardown finished.
/// Available actions: `finish()`
#[derive(Debug)]
pub struct Removed {
    pub(crate) handle: ContainerHandle,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Created {}
    impl Sealed for super::Running {}
    impl Sealed for super::Probed {}
    impl Sealed for super::Stopped {}
    impl Sealed for super::Removed {}
}

/// States that own a container.
pub trait HasContainer: sealed::Sealed + Send {
    fn handle(&self) -> &ContainerHandle;
    fn handle_mut(&mut self) -> &mut ContainerHandle;
    fn into_handle(self) -> ContainerHandle;
}

macro_rules! has_container {
    ($($state:ident),*) => {
        $(
            impl HasContainer for $state {
                fn handle(&self) -> &ContainerHandle {
                    &self.handle
                }

                fn handle_mut(&mut self) -> &mut ContainerHandle {
                    &mut self.handle
                }

                fn into_handle(self) -> ContainerHandle {
                    self.handle
                }
            }
        )*
    };
}

has_container!(Created, Running, Probed, Stopped, Removed);
