use thiserror::Error;

use crate::api::error::ApiError;
use crate::package::error::PackageApiError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("There was a registry api error: {0}")]
    Api(#[from] ApiError),

    #[error("There was a packages api error: {0}")]
    Package(#[from] PackageApiError),

    #[error("No target packages resolved from the configured package spec")]
    NoTargetPackages,

    #[error("post-run validation reported {0} warning(s) and failOnWarnings is enabled")]
    ValidationFailed(usize),
}
