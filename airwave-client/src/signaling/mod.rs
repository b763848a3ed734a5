mod signaling_actor;
mod signaling_client;
mod signaling_event;

pub use signaling_client::*;
pub use signaling_event::*;
