pub mod classify;
pub mod diff;
pub mod error;
pub mod ids;
pub mod listing;
pub mod pattern;
pub mod record;
pub mod requeue;
pub mod state;

pub use classify::*;
pub use diff::*;
pub use error::*;
pub use ids::*;
pub use listing::*;
pub use pattern::*;
pub use record::*;
pub use requeue::*;
pub use state::*;
