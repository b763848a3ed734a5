mod endpoint;
mod room_registry;

pub use endpoint::*;
pub use room_registry::*;
