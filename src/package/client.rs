use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, StatusCode};

use crate::package::error::PackageApiError;
use crate::package::version::{ApiPackageVersion, PackageVersion};
use crate::pagination::next_page_url;

const PER_PAGE: u32 = 100;

/// Which GitHub packages endpoint family a package belongs to. The
/// endpoint shape (and therefore which base URL to use) differs between
/// a package owned by an organisation, a package owned by another user,
/// and a package owned by the token's own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerKind {
    Organization(String),
    User(String),
    AuthenticatedUser,
}

impl OwnerKind {
    fn versions_url(&self, package: &str) -> String {
        match self {
            OwnerKind::Organization(org) => format!(
                "https://api.github.com/orgs/{org}/packages/container/{package}/versions"
            ),
            OwnerKind::User(user) => format!(
                "https://api.github.com/users/{user}/packages/container/{package}/versions"
            ),
            OwnerKind::AuthenticatedUser => format!(
                "https://api.github.com/user/packages/container/{package}/versions"
            ),
        }
    }

    fn version_url(&self, package: &str, id: u64) -> String {
        format!("{}/{id}", self.versions_url(package))
    }

    fn packages_url(&self) -> String {
        match self {
            OwnerKind::Organization(org) => {
                format!("https://api.github.com/orgs/{org}/packages?package_type=container")
            }
            OwnerKind::User(user) => {
                format!("https://api.github.com/users/{user}/packages?package_type=container")
            }
            OwnerKind::AuthenticatedUser => {
                String::from("https://api.github.com/user/packages?package_type=container")
            }
        }
    }
}

/// Authenticated client to the GitHub packages REST API.
pub struct PackageClient {
    client: Client,
    dry_run: bool,
    last_delete_not_found: bool,
}

impl PackageClient {
    pub fn new(token: &str, dry_run: bool) -> Result<Self, PackageApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| PackageApiError::InvalidHeaderValue(String::from(AUTHORIZATION.as_str())))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = ClientBuilder::new()
            .default_headers(headers)
            .user_agent("ghcr-cleanup-engine")
            .build()?;

        Ok(Self {
            client,
            dry_run,
            last_delete_not_found: false,
        })
    }

    /// List every version of `package`, draining the `Link`-paginated
    /// listing 100 entries at a time.
    pub async fn list_versions(
        &self,
        owner: &OwnerKind,
        package: &str,
    ) -> Result<Vec<PackageVersion>, PackageApiError> {
        let mut versions = Vec::new();
        let mut url = Some(format!("{}?per_page={PER_PAGE}", owner.versions_url(package)));

        while let Some(next) = url {
            let response = self.client.get(&next).send().await?;
            let response = ensure_success(response).await?;
            url = next_page_url(response.headers());
            let page = response.json::<Vec<ApiPackageVersion>>().await?;
            versions.extend(page.into_iter().map(PackageVersion::from));
        }

        Ok(versions)
    }

    /// Delete a version by id. Idempotent: a `404` immediately following
    /// a successful delete earlier in this run is tolerated once; two
    /// consecutive `404`s escalate to an error.
    pub async fn delete_version(
        &mut self,
        owner: &OwnerKind,
        package: &str,
        id: u64,
    ) -> Result<(), PackageApiError> {
        if self.dry_run {
            debug!("Dry run: would delete version '{id}' of package '{package}'");
            return Ok(());
        }

        let url = owner.version_url(package, id);
        let response = self.client.delete(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            if self.last_delete_not_found {
                return Err(PackageApiError::RepeatedNotFound(id));
            }
            warn!("Version '{id}' of package '{package}' returned 404 on delete; treating as already gone");
            self.last_delete_not_found = true;
            return Ok(());
        }

        ensure_success(response).await?;
        self.last_delete_not_found = false;
        Ok(())
    }

    /// List the package names owned by `owner`, used only when a package
    /// name pattern needs expanding against the account's full catalog.
    pub async fn list_packages(&self, owner: &OwnerKind) -> Result<Vec<String>, PackageApiError> {
        let mut names = Vec::new();
        let mut url = Some(format!("{}&per_page={PER_PAGE}", owner.packages_url()));

        while let Some(next) = url {
            let response = self.client.get(&next).send().await?;
            let response = ensure_success(response).await?;
            url = next_page_url(response.headers());
            let page = response.json::<Vec<ApiPackageSummary>>().await?;
            names.extend(page.into_iter().map(|p| p.name));
        }

        Ok(names)
    }
}

#[derive(serde::Deserialize)]
struct ApiPackageSummary {
    name: String,
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PackageApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(PackageApiError::ApiError(format!(
            "{status}: {}",
            body.trim()
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_versions_url_org() {
        let owner = OwnerKind::Organization(String::from("acme"));
        assert_eq!(
            owner.versions_url("widgets"),
            "https://api.github.com/orgs/acme/packages/container/widgets/versions"
        );
    }

    #[test]
    fn test_versions_url_user() {
        let owner = OwnerKind::User(String::from("alice"));
        assert_eq!(
            owner.versions_url("widgets"),
            "https://api.github.com/users/alice/packages/container/widgets/versions"
        );
    }

    #[test]
    fn test_versions_url_authenticated_user() {
        let owner = OwnerKind::AuthenticatedUser;
        assert_eq!(
            owner.versions_url("widgets"),
            "https://api.github.com/user/packages/container/widgets/versions"
        );
    }

    #[test]
    fn test_version_url() {
        let owner = OwnerKind::Organization(String::from("acme"));
        assert_eq!(
            owner.version_url("widgets", 42),
            "https://api.github.com/orgs/acme/packages/container/widgets/versions/42"
        );
    }
}
