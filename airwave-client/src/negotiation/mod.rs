mod negotiation_context;
mod negotiation_state;
mod negotiator;

pub use negotiation_context::*;
pub use negotiation_state::*;
pub use negotiator::*;
