mod capture;
#[cfg(feature = "device-capture")]
mod device_capture;
mod mix_bus;
mod mixer;
mod profile;

pub use capture::*;
#[cfg(feature = "device-capture")]
pub use device_capture::*;
pub use mix_bus::*;
pub use mixer::*;
pub use profile::*;
