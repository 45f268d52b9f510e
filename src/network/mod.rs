pub mod bus;
pub mod cluster;

pub use bus::*;
pub use cluster::*;
