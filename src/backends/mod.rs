mod device;
mod host;

pub use device::*;
pub use host::*;
