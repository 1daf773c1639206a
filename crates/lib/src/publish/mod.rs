//! Release publishing.
//!
//! Uploads a validated artifact to the release identified by the triggering
//! tag, under the exact asset name the matrix declares. Publishing is
//! idempotent per (tag, asset name): an existing asset with the same name is
//! deleted before re-upload, so a retried run overwrites rather than
//! duplicating or erroring. Transient failures are retried with bounded
//! exponential backoff.

mod client;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use client::{Asset, Release, ReleaseClient};

/// Environment variables consulted for the upload credential, in order.
const TOKEN_ENV_VARS: [&str; 2] = ["RELMATRIX_TOKEN", "GITHUB_TOKEN"];

/// Errors raised while publishing one artifact. Fatal to that target only.
#[derive(Debug, Error)]
pub enum PublishError {
  /// No release exists for the triggering tag.
  #[error("no release found for tag `{tag}`")]
  ReleaseNotFound { tag: String },

  /// Transport-level HTTP failure.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The release API answered with an unexpected status.
  #[error("release api returned status {status} while trying to {context}")]
  Api { status: u16, context: String },

  /// The artifact file could not be read for upload.
  #[error("failed to read artifact {path}: {source}")]
  ReadArtifact {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// All retry attempts were exhausted on transient failures.
  #[error("upload of `{asset}` failed after {attempts} attempts: {reason}")]
  RetriesExhausted {
    asset: String,
    attempts: u32,
    reason: String,
  },
}

/// Bounded retry policy for transient upload failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub attempts: u32,

  /// Delay before the second attempt; doubles per subsequent attempt.
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts: 3,
      base_delay: Duration::from_millis(500),
    }
  }
}

/// Read the upload credential from the environment.
///
/// Checks `RELMATRIX_TOKEN`, then `GITHUB_TOKEN`. The value is handed to the
/// client as-is and never logged.
pub fn token_from_env() -> Option<String> {
  for key in TOKEN_ENV_VARS {
    if let Ok(value) = std::env::var(key)
      && !value.trim().is_empty()
    {
      return Some(value);
    }
  }
  None
}

/// Upload the file at `artifact_path` as `asset_name` on the release for
/// `tag`, retrying transient failures per the policy.
pub async fn publish(
  client: &ReleaseClient,
  artifact_path: &Path,
  asset_name: &str,
  tag: &str,
  retry: &RetryPolicy,
) -> Result<(), PublishError> {
  let bytes = tokio::fs::read(artifact_path)
    .await
    .map_err(|source| PublishError::ReadArtifact {
      path: artifact_path.to_path_buf(),
      source,
    })?;

  let attempts = retry.attempts.max(1);
  let mut last_transient: Option<PublishError> = None;

  for attempt in 1..=attempts {
    if attempt > 1 {
      let delay = retry.base_delay * (1u32 << (attempt - 2).min(16));
      debug!(asset = asset_name, attempt, delay = ?delay, "backing off before retry");
      tokio::time::sleep(delay).await;
    }

    match publish_once(client, &bytes, asset_name, tag).await {
      Ok(()) => {
        info!(asset = asset_name, tag, attempt, "asset published");
        return Ok(());
      }
      Err(err) if is_transient(&err) => {
        warn!(asset = asset_name, attempt, error = %err, "transient publish failure");
        last_transient = Some(err);
      }
      Err(err) => return Err(err),
    }
  }

  Err(PublishError::RetriesExhausted {
    asset: asset_name.to_string(),
    attempts,
    reason: last_transient
      .map(|e| e.to_string())
      .unwrap_or_else(|| "unknown".to_string()),
  })
}

/// One publish pass: resolve the release, remove any same-named asset, then
/// upload. Delete-before-upload is what makes a retried run overwrite instead
/// of duplicating.
async fn publish_once(
  client: &ReleaseClient,
  bytes: &[u8],
  asset_name: &str,
  tag: &str,
) -> Result<(), PublishError> {
  let release = client.release_for_tag(tag).await?;

  for asset in client.assets(release.id).await? {
    if asset.name == asset_name {
      info!(asset = asset_name, asset_id = asset.id, "replacing existing asset");
      client.delete_asset(asset.id).await?;
    }
  }

  client.upload_asset(release.id, asset_name, bytes.to_vec()).await
}

/// Transient failures are worth retrying; anything else is a hard error.
fn is_transient(err: &PublishError) -> bool {
  match err {
    PublishError::Http(e) => e.is_connect() || e.is_timeout(),
    PublishError::Api { status, .. } => *status >= 500 || *status == 429,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
      attempts,
      base_delay: Duration::from_millis(1),
    }
  }

  fn artifact_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"binary-bytes").unwrap();
    path
  }

  #[tokio::test]
  async fn publishes_fresh_asset() {
    let mut server = mockito::Server::new_async().await;
    let release = server
      .mock("GET", "/repos/acme/native/releases/tags/v1.2.3")
      .with_status(200)
      .with_body(r#"{"id": 7, "tag_name": "v1.2.3"}"#)
      .create_async()
      .await;
    let assets = server
      .mock("GET", "/repos/acme/native/releases/7/assets")
      .with_status(200)
      .with_body("[]")
      .create_async()
      .await;
    let upload = server
      .mock("POST", "/repos/acme/native/releases/7/assets")
      .match_query(mockito::Matcher::UrlEncoded("name".into(), "lib.so".into()))
      .with_status(201)
      .create_async()
      .await;

    let dir = TempDir::new().unwrap();
    let path = artifact_file(&dir, "lib.so");
    let client = ReleaseClient::new(&server.url(), "acme/native", "token".into());

    publish(&client, &path, "lib.so", "v1.2.3", &fast_retry(1))
      .await
      .unwrap();

    release.assert_async().await;
    assets.assert_async().await;
    upload.assert_async().await;
  }

  #[tokio::test]
  async fn republish_overwrites_existing_asset() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/repos/acme/native/releases/tags/v1.2.3")
      .with_status(200)
      .with_body(r#"{"id": 7, "tag_name": "v1.2.3"}"#)
      .create_async()
      .await;
    server
      .mock("GET", "/repos/acme/native/releases/7/assets")
      .with_status(200)
      .with_body(r#"[{"id": 41, "name": "other.so"}, {"id": 42, "name": "lib.so"}]"#)
      .create_async()
      .await;
    let delete = server
      .mock("DELETE", "/repos/acme/native/releases/assets/42")
      .with_status(204)
      .create_async()
      .await;
    let upload = server
      .mock("POST", "/repos/acme/native/releases/7/assets")
      .match_query(mockito::Matcher::UrlEncoded("name".into(), "lib.so".into()))
      .with_status(201)
      .create_async()
      .await;

    let dir = TempDir::new().unwrap();
    let path = artifact_file(&dir, "lib.so");
    let client = ReleaseClient::new(&server.url(), "acme/native", "token".into());

    publish(&client, &path, "lib.so", "v1.2.3", &fast_retry(1))
      .await
      .unwrap();

    // The same-named asset was deleted, the unrelated one untouched
    delete.assert_async().await;
    upload.assert_async().await;
  }

  #[tokio::test]
  async fn transient_server_errors_are_retried_until_exhausted() {
    let mut server = mockito::Server::new_async().await;
    let release = server
      .mock("GET", "/repos/acme/native/releases/tags/v1.2.3")
      .with_status(503)
      .expect(3)
      .create_async()
      .await;

    let dir = TempDir::new().unwrap();
    let path = artifact_file(&dir, "lib.so");
    let client = ReleaseClient::new(&server.url(), "acme/native", "token".into());

    let err = publish(&client, &path, "lib.so", "v1.2.3", &fast_retry(3))
      .await
      .unwrap_err();

    release.assert_async().await;
    assert!(matches!(err, PublishError::RetriesExhausted { attempts: 3, .. }));
  }

  #[tokio::test]
  async fn missing_release_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let release = server
      .mock("GET", "/repos/acme/native/releases/tags/v9.9.9")
      .with_status(404)
      .expect(1)
      .create_async()
      .await;

    let dir = TempDir::new().unwrap();
    let path = artifact_file(&dir, "lib.so");
    let client = ReleaseClient::new(&server.url(), "acme/native", "token".into());

    let err = publish(&client, &path, "lib.so", "v9.9.9", &fast_retry(3))
      .await
      .unwrap_err();

    release.assert_async().await;
    assert!(matches!(err, PublishError::ReleaseNotFound { .. }));
  }

  #[tokio::test]
  async fn unreadable_artifact_fails_before_any_request() {
    let server = mockito::Server::new_async().await;
    let client = ReleaseClient::new(&server.url(), "acme/native", "token".into());

    let err = publish(
      &client,
      Path::new("/nonexistent/lib.so"),
      "lib.so",
      "v1.2.3",
      &fast_retry(1),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PublishError::ReadArtifact { .. }));
  }

  #[test]
  fn transient_classification() {
    assert!(is_transient(&PublishError::Api {
      status: 503,
      context: "x".into()
    }));
    assert!(is_transient(&PublishError::Api {
      status: 429,
      context: "x".into()
    }));
    assert!(!is_transient(&PublishError::Api {
      status: 403,
      context: "x".into()
    }));
    assert!(!is_transient(&PublishError::ReleaseNotFound { tag: "v1".into() }));
  }

  #[test]
  #[serial]
  fn token_prefers_relmatrix_var() {
    temp_env::with_vars(
      [
        ("RELMATRIX_TOKEN", Some("primary")),
        ("GITHUB_TOKEN", Some("fallback")),
      ],
      || {
        assert_eq!(token_from_env().as_deref(), Some("primary"));
      },
    );
  }

  #[test]
  #[serial]
  fn token_falls_back_to_github_var() {
    temp_env::with_vars(
      [("RELMATRIX_TOKEN", None), ("GITHUB_TOKEN", Some("fallback"))],
      || {
        assert_eq!(token_from_env().as_deref(), Some("fallback"));
      },
    );
  }

  #[test]
  #[serial]
  fn token_absent_when_unset() {
    temp_env::with_vars(
      [
        ("RELMATRIX_TOKEN", None::<&str>),
        ("GITHUB_TOKEN", None::<&str>),
      ],
      || {
        assert_eq!(token_from_env(), None);
      },
    );
  }
}
