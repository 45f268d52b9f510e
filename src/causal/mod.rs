pub mod clock;
pub mod engine;
pub mod error;
pub mod message;

pub use clock::*;
pub use engine::*;
pub use error::*;
pub use message::*;
