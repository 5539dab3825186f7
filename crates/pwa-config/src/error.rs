use thiserror::Error;

#[derive(Debug, Error)]
pub enum PwaConfigError {
    #[error("invalid url pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("runtime cache rule #{index} has an empty cache name")]
    EmptyCacheName { index: usize },
    #[error("cache `{cache_name}` must allow at least one entry")]
    ZeroMaxEntries { cache_name: String },
    #[error("cache name `{cache_name}` is used by more than one rule")]
    DuplicateCacheName { cache_name: String },
    #[error("booking url has no host: {0}")]
    MissingHost(String),
    #[error("failed to render json: {0}")]
    Render(#[from] serde_json::Error),
}
