pub use airwave_core::model::{PeerId, RoomSummary};

pub mod model {
    pub use airwave_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use airwave_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use airwave_client::*;
}
