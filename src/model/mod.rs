pub use rating::*;
pub use stats::*;
pub use timestamp::*;
pub use user_key::*;

mod rating;
mod stats;
mod timestamp;
mod user_key;
