use crate::api::error::ApiError;
use reqwest::{Response, StatusCode};

/// For an reqwest response check the registry version as well as map errors to `ApiError`s
pub async fn handle_response(response: Response) -> Result<Response, ApiError> {
    validate_registry_version(&response)?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized)
    } else if !status.is_success() {
        let body = response.text().await?;
        Err(ApiError::RegistryError(body.trim().to_string()))
    } else {
        Ok(response)
    }
}

/// Like [`handle_response`] but treats `400`/`404` as a missing manifest
/// rather than a hard error, per the "NotFound" reads are tolerated
/// clause of the error taxonomy.
pub async fn handle_manifest_response(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
        return Err(ApiError::NotFound);
    }
    handle_response(response).await
}

/// Validate the `Docker-Distribution-API-Version` header was present in the response and that it's value
/// is set to use registry v2
pub fn validate_registry_version(response: &Response) -> Result<(), ApiError> {
    if let Some(version) = response.headers().get("Docker-Distribution-API-Version") {
        if let Ok(parsed) = version.to_str() {
            if parsed.ends_with("/2.0") {
                Ok(())
            } else {
                Err(ApiError::UnsupportedRegistry)
            }
        } else {
            Err(ApiError::InvalidHeaderValue(String::from(
                "Docker-Distribution-API-Version",
            )))
        }
    } else {
        Ok(())
    }
}
