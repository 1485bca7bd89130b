pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
