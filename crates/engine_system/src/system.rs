//! The two system flavours.

use engine_message::TickMessages;

use crate::context::{DirectContext, SystemEnv};
use crate::descriptor::SystemDescriptor;
use crate::input::InputHandler;

/// A system that runs over packed component arrays.
///
/// Every tick of its pipeline the manager gathers the requested columns of
/// every matching archetype, calls [`run`](Self::run), and writes mutable
/// columns back when the stage completes.
pub trait DirectSystem: Send {
    /// Called once, at registration.
    fn descriptor(&self) -> SystemDescriptor;

    /// Runs once before the first tick.
    fn on_create(&mut self, _env: &mut SystemEnv) {}

    fn run(&mut self, ctx: &mut DirectContext);

    /// Runs once at unregistration or shutdown.
    fn on_destroy(&mut self, _env: &mut SystemEnv) {}

    fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        None
    }
}

/// A system that keeps its own state and consumes message streams.
///
/// [`on_messages`](Self::on_messages) receives only the entities matching
/// the system's requirements and the component types it names. Entities that
/// enter its match set arrive as `RegisterEntity`, entities that leave it as
/// `UnregisterEntity`.
pub trait IndirectSystem: Send {
    /// Called once, at registration.
    fn descriptor(&self) -> SystemDescriptor;

    fn on_create(&mut self, _env: &mut SystemEnv) {}

    /// Runs every tick of the system's pipeline, in its stage.
    fn run(&mut self, _env: &mut SystemEnv) {}

    /// Receives the filtered messages of one applied tick.
    fn on_messages(&mut self, messages: &TickMessages, env: &mut SystemEnv);

    fn on_destroy(&mut self, _env: &mut SystemEnv) {}

    fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        None
    }
}

/// Adapts a closure into a [`DirectSystem`].
pub struct FnDirectSystem<F> {
    descriptor: SystemDescriptor,
    run: F,
}

impl<F> FnDirectSystem<F>
where
    F: FnMut(&mut DirectContext) + Send,
{
    pub fn new(descriptor: SystemDescriptor, run: F) -> Self {
        Self { descriptor, run }
    }
}

impl<F> DirectSystem for FnDirectSystem<F>
where
    F: FnMut(&mut DirectContext) + Send,
{
    fn descriptor(&self) -> SystemDescriptor {
        self.descriptor.clone()
    }

    fn run(&mut self, ctx: &mut DirectContext) {
        (self.run)(ctx);
    }
}

impl<F> std::fmt::Debug for FnDirectSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDirectSystem").field("name", &self.descriptor.name()).finish()
    }
}
