use std::path::PathBuf;
use std::time::Duration;

use snafu::{Location, Snafu};

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("data directory `{}` is not writable", path.display()))]
    NotWritable {
        path: PathBuf,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot open the database `{}` at {location}: {source}", path.display()))]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to create the database schema at {location}: {source}"))]
    Schema {
        source: rusqlite::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to query the database at {location}: {source}"))]
    Query {
        source: rusqlite::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage operation `{operation}` did not finish within {timeout:?}"))]
    Timeout {
        operation: &'static str,
        timeout: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("gave up before commit at {location}; the transaction was rolled back"))]
    Abandoned {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage task `{operation}` was aborted: {source}"))]
    Blocking {
        operation: &'static str,
        source: tokio::task::JoinError,
        #[snafu(implicit)]
        location: Location,
    },
}
