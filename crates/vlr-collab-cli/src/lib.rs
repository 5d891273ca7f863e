pub mod aws;
pub mod creds;
pub mod exec;
pub mod ocm;

pub use aws::*;
pub use creds::*;
pub use ocm::*;
