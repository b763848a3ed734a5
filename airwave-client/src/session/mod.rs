mod call_session;
mod session_event;

pub use call_session::*;
pub use session_event::*;
