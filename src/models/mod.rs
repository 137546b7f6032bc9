mod attempt;
mod device;
mod firmware;
mod license;
mod tenant;

pub use attempt::*;
pub use device::*;
pub use firmware::*;
pub use license::*;
pub use tenant::*;
