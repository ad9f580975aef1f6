use std::path::PathBuf;

/// Failures at the persistence boundary. Everything else in the store is infallible.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encoding snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("bad time value {value:?} for key {key:?} in namespace {namespace:?}: {source}")]
    BadTimestamp {
        namespace: String,
        key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("bad time value for key {key:?} in namespace {namespace:?}: expected a string")]
    BadTimeValue { namespace: String, key: String },

    #[error("bad input value for top-level key {key:?}: expected a timestamp string or an object")]
    BadValue { key: String },
}
