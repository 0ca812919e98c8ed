use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Only registry api v2 is supported")]
    UnsupportedRegistry,

    #[error("Found invalid header value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("There was an error during the request: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Received error from registry: '{0}'")]
    RegistryError(String),

    #[error("The manifest body couldn't be parsed: {0}")]
    InvalidManifest(String),

    #[error("The response object is missing the 'mediaType' field")]
    MissingMediaType,

    #[error("The response didn't contain the 'Docker-Content-Digest' header")]
    MissingDigest,

    #[error("The requested manifest doesn't exist")]
    NotFound,

    #[error("Authentication against the registry failed")]
    Unauthorized,

    #[error("The 'WWW-Authenticate' challenge header was missing or malformed")]
    InvalidAuthChallenge,
}
