mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler, HandlerReport};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
