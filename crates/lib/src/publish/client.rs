//! HTTP client for the release API.
//!
//! Thin wrapper around `reqwest::Client` speaking a GitHub-style releases
//! API. The base URL is configurable so tests can point it at a local mock
//! server. The authorization token is sent as a bearer header and is never
//! logged or echoed in errors.

use std::fmt;

use serde::Deserialize;

use super::PublishError;

/// A release, as returned by the release API.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
  pub id: u64,
  #[serde(default)]
  pub tag_name: String,
}

/// An asset attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
  pub id: u64,
  pub name: String,
}

/// Client for one repository's releases.
pub struct ReleaseClient {
  http: reqwest::Client,
  api_base: String,
  repo: String,
  token: String,
}

impl ReleaseClient {
  /// Create a client for `repo` (`owner/name`) against `api_base`.
  ///
  /// The base URL is trimmed and stripped of a trailing slash to prevent
  /// double-slash issues when joining endpoint paths.
  pub fn new(api_base: &str, repo: &str, token: String) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_base: api_base.trim().trim_end_matches('/').to_string(),
      repo: repo.trim().trim_matches('/').to_string(),
      token,
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.api_base, path)
  }

  /// Fetch the release identified by a tag.
  pub async fn release_for_tag(&self, tag: &str) -> Result<Release, PublishError> {
    let url = self.url(&format!("/repos/{}/releases/tags/{}", self.repo, tag));
    let resp = self
      .http
      .get(&url)
      .bearer_auth(&self.token)
      .header(reqwest::header::USER_AGENT, "relmatrix")
      .send()
      .await?;

    match resp.status() {
      s if s.is_success() => Ok(resp.json::<Release>().await?),
      reqwest::StatusCode::NOT_FOUND => Err(PublishError::ReleaseNotFound { tag: tag.to_string() }),
      s => Err(PublishError::Api {
        status: s.as_u16(),
        context: format!("fetch release for tag `{tag}`"),
      }),
    }
  }

  /// List the assets currently attached to a release.
  pub async fn assets(&self, release_id: u64) -> Result<Vec<Asset>, PublishError> {
    let url = self.url(&format!("/repos/{}/releases/{}/assets", self.repo, release_id));
    let resp = self
      .http
      .get(&url)
      .bearer_auth(&self.token)
      .header(reqwest::header::USER_AGENT, "relmatrix")
      .send()
      .await?;

    match resp.status() {
      s if s.is_success() => Ok(resp.json::<Vec<Asset>>().await?),
      s => Err(PublishError::Api {
        status: s.as_u16(),
        context: format!("list assets of release {release_id}"),
      }),
    }
  }

  /// Delete an asset. A 404 is treated as success: the asset is already gone.
  pub async fn delete_asset(&self, asset_id: u64) -> Result<(), PublishError> {
    let url = self.url(&format!("/repos/{}/releases/assets/{}", self.repo, asset_id));
    let resp = self
      .http
      .delete(&url)
      .bearer_auth(&self.token)
      .header(reqwest::header::USER_AGENT, "relmatrix")
      .send()
      .await?;

    match resp.status() {
      s if s.is_success() => Ok(()),
      reqwest::StatusCode::NOT_FOUND => Ok(()),
      s => Err(PublishError::Api {
        status: s.as_u16(),
        context: format!("delete asset {asset_id}"),
      }),
    }
  }

  /// Upload bytes as a named asset on a release.
  pub async fn upload_asset(
    &self,
    release_id: u64,
    name: &str,
    bytes: Vec<u8>,
  ) -> Result<(), PublishError> {
    let url = self.url(&format!("/repos/{}/releases/{}/assets", self.repo, release_id));
    let resp = self
      .http
      .post(&url)
      .query(&[("name", name)])
      .bearer_auth(&self.token)
      .header(reqwest::header::USER_AGENT, "relmatrix")
      .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
      .body(bytes)
      .send()
      .await?;

    match resp.status() {
      s if s.is_success() => Ok(()),
      s => Err(PublishError::Api {
        status: s.as_u16(),
        context: format!("upload asset `{name}`"),
      }),
    }
  }
}

// Keep the token out of debug output.
impl fmt::Debug for ReleaseClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReleaseClient")
      .field("api_base", &self.api_base)
      .field("repo", &self.repo)
      .field("token", &"<redacted>")
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalizes_base_url_and_repo() {
    let client = ReleaseClient::new(" https://api.example.test/ ", "/acme/native/", "t".into());
    assert_eq!(
      client.url("/repos/acme/native/releases/tags/v1"),
      "https://api.example.test/repos/acme/native/releases/tags/v1"
    );
    assert_eq!(client.repo, "acme/native");
  }

  #[test]
  fn debug_redacts_token() {
    let client = ReleaseClient::new("https://api.example.test", "acme/native", "s3cret".into());
    let debug = format!("{client:?}");
    assert!(!debug.contains("s3cret"));
    assert!(debug.contains("<redacted>"));
  }
}
