pub mod enums;
pub mod extraction;

pub use enums::*;
pub use extraction::*;
