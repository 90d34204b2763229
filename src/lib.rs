pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod model;
pub mod service;

pub mod prelude {
    pub use crate::database::{Storage, StorageConfig, StorageError, StorageMode};
    pub use crate::model::*;
    pub use crate::service::{CatMeter, StatsError};

    pub use derive_new::new;
    pub use serde::{Deserialize, Serialize};
    pub use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
}
