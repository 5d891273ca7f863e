pub mod fixture;
pub mod types;

pub use fixture::*;
pub use types::*;
