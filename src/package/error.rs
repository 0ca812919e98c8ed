use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageApiError {
    #[error("There was an error during the request: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Received error from the packages api: {0}")]
    ApiError(String),

    #[error("Found invalid header value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("Version '{0}' returned 404 twice in a row; the registry may be in an inconsistent state")]
    RepeatedNotFound(u64),
}
