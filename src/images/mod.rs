pub mod fetcher;

pub use fetcher::ImageFetcher;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}
