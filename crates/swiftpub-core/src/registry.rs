//! Swift Package Registry client.
//!
//! Thin wrapper over the registry's HTTP API: list releases, fetch release
//! metadata, publish a source archive, and fetch a release's manifest.
//! Every call is a single attempt; retry policy belongs to the caller.
//!
//! Status handling follows the registry's conventions: an unknown package
//! lists as zero releases, and an unknown version is "absent" rather than an
//! error. Anything else outside 2xx surfaces the status code and body.

use std::cmp::Ordering;
use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use swiftpub_schema::release::{ReleaseDocument, ReleaseListing};
use swiftpub_schema::{ARCHIVE_CONTENT_TYPE, MANIFEST_FILE, Release, Sha256Digest};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::ArchiveArtifact;
use crate::cancel::or_cancel;

/// Media type for JSON registry responses.
pub const REGISTRY_JSON: &str = "application/vnd.swift.registry.v1+json";

/// Media type for manifest downloads.
pub const MANIFEST_MEDIA_TYPE: &str = "text/x-swift";

/// Uploads of large archives must not be cut off by a short deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid registry response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Registry request cancelled")]
    Cancelled,
}

impl RegistryError {
    /// HTTP status for [`RegistryError::Status`] errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client for one registry, authenticated with a bearer token.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RegistryClient {
    base_url: String,
    token: String,
    http: Client,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Create a client with a 5 minute timeout and a TLS 1.2 floor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if `base_url` does not parse, or
    /// [`RegistryError::Http`] if the TLS backend cannot be initialized.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(crate::USER_AGENT)
            .build()?;
        Self::with_client(base_url, token, http)
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if `base_url` does not parse as
    /// an absolute URL.
    pub fn with_client(
        base_url: &str,
        token: impl Into<String>,
        http: Client,
    ) -> Result<Self, RegistryError> {
        reqwest::Url::parse(base_url).map_err(|e| RegistryError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List every release of `scope/name`, newest first.
    ///
    /// A 404 means the registry knows no releases and yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Status`] for other non-2xx responses.
    pub async fn list_releases(
        &self,
        scope: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Release>, RegistryError> {
        let url = format!("{}/{scope}/{name}", self.base_url);
        let req = self.authorized(self.http.get(&url)).header(ACCEPT, REGISTRY_JSON);

        let resp = self.send(req, cancel).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%scope, %name, "Package not found; no releases");
            return Ok(Vec::new());
        }
        let body = self.read_success(resp, "List releases", cancel).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let listing: ReleaseListing = serde_json::from_str(&body)?;
        let mut releases: Vec<Release> = listing
            .releases
            .into_iter()
            .filter(|(_, entry)| entry.problem.is_none())
            .map(|(version, _)| Release::with_version(version))
            .collect();
        releases.sort_by(|a, b| compare_versions(&b.version, &a.version));
        Ok(releases)
    }

    /// Fetch metadata for one release; `None` when the registry returns 404.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Status`] for other non-2xx responses.
    pub async fn get_release(
        &self,
        scope: &str,
        name: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Release>, RegistryError> {
        let url = format!("{}/{scope}/{name}/{version}", self.base_url);
        let req = self.authorized(self.http.get(&url)).header(ACCEPT, REGISTRY_JSON);

        let resp = self.send(req, cancel).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = self.read_success(resp, "Get release", cancel).await?;
        if body.trim().is_empty() {
            return Ok(Some(Release::with_version(version)));
        }

        // Any 2xx means the release exists; the body only adds detail.
        match serde_json::from_str::<ReleaseDocument>(&body) {
            Ok(doc) => Ok(Some(doc.into_release(version))),
            Err(e) => {
                debug!(%url, error = %e, "Unreadable release document");
                Ok(Some(Release::with_version(version)))
            }
        }
    }

    /// True iff the registry has `scope/name@version`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`RegistryClient::get_release`].
    pub async fn version_exists(
        &self,
        scope: &str,
        name: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, RegistryError> {
        Ok(self.get_release(scope, name, version, cancel).await?.is_some())
    }

    /// Upload a source archive as `scope/name@version`.
    ///
    /// The file is streamed with an exact `Content-Length` and a
    /// `Digest: sha-256=<hex>` header. Only 200 and 201 count as success.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the archive cannot be opened and
    /// [`RegistryError::Status`] for any other response status.
    pub async fn publish(
        &self,
        scope: &str,
        name: &str,
        version: &str,
        archive: &Path,
        digest: &Sha256Digest,
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError> {
        let url = format!("{}/{scope}/{name}/{version}", self.base_url);

        let file = tokio::fs::File::open(archive).await?;
        let size = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let req = self
            .authorized(self.http.put(&url))
            .header(CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .header(CONTENT_LENGTH, size)
            .header(ACCEPT, REGISTRY_JSON)
            .header("Digest", digest.header_value())
            .body(body);

        info!(%scope, %name, %version, size, "Uploading source archive");
        let resp = self.send(req, cancel).await?;

        let status = resp.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            let body = read_text(resp, cancel).await?;
            return Err(RegistryError::Status {
                operation: "Publish",
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Publish accepted");
        Ok(())
    }

    /// [`RegistryClient::publish`] for a freshly built artifact.
    ///
    /// # Errors
    ///
    /// Same as [`RegistryClient::publish`].
    pub async fn publish_artifact(
        &self,
        scope: &str,
        name: &str,
        version: &str,
        artifact: &ArchiveArtifact,
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError> {
        self.publish(scope, name, version, artifact.path(), artifact.digest(), cancel)
            .await
    }

    /// Download the manifest published with a release.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Status`] for any non-2xx response, including 404.
    pub async fn get_manifest(
        &self,
        scope: &str,
        name: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RegistryError> {
        let url = format!("{}/{scope}/{name}/{version}/{MANIFEST_FILE}", self.base_url);
        let req = self
            .authorized(self.http.get(&url))
            .header(ACCEPT, MANIFEST_MEDIA_TYPE);

        let resp = self.send(req, cancel).await?;
        self.read_success(resp, "Get manifest", cancel).await
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn send(
        &self,
        req: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, RegistryError> {
        match or_cancel(cancel, req.send()).await {
            Some(resp) => Ok(resp?),
            None => Err(RegistryError::Cancelled),
        }
    }

    async fn read_success(
        &self,
        resp: Response,
        operation: &'static str,
        cancel: &CancellationToken,
    ) -> Result<String, RegistryError> {
        let status = resp.status();
        let body = read_text(resp, cancel).await?;
        if !status.is_success() {
            return Err(RegistryError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

async fn read_text(resp: Response, cancel: &CancellationToken) -> Result<String, RegistryError> {
    match or_cancel(cancel, resp.text()).await {
        Some(text) => Ok(text?),
        None => Err(RegistryError::Cancelled),
    }
}

/// Semantic versions first (by precedence), then anything else lexically.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::io::Write;

    const TOKEN: &str = "test-token";

    fn client(server: &Server) -> RegistryClient {
        RegistryClient::new(&server.url(), TOKEN).unwrap()
    }

    fn archive_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[tokio::test]
    async fn list_releases_treats_404_as_empty() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/testorg/TestPackage")
            .match_header("authorization", "Bearer test-token")
            .match_header("accept", REGISTRY_JSON)
            .with_status(404)
            .create_async()
            .await;

        let releases = client(&server)
            .list_releases("testorg", "TestPackage", &CancellationToken::new())
            .await
            .unwrap();

        assert!(releases.is_empty());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn list_releases_parses_and_orders() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage")
            .with_status(200)
            .with_header("content-type", REGISTRY_JSON)
            .with_body(
                r#"{"releases": {
                    "1.0.0": {"url": "https://r/testorg/TestPackage/1.0.0"},
                    "1.10.0": {"url": "https://r/testorg/TestPackage/1.10.0"},
                    "1.2.0": {"url": "https://r/testorg/TestPackage/1.2.0"},
                    "0.9.0": {"url": "https://r/testorg/TestPackage/0.9.0",
                              "problem": {"status": 410, "title": "Gone"}}
                }}"#,
            )
            .create_async()
            .await;

        let releases = client(&server)
            .list_releases("testorg", "TestPackage", &CancellationToken::new())
            .await
            .unwrap();

        let versions: Vec<&str> = releases.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1.10.0", "1.2.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn list_releases_surfaces_server_errors() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client(&server)
            .list_releases("testorg", "TestPackage", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn get_release_404_is_absent() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.0.0")
            .with_status(404)
            .create_async()
            .await;

        let release = client(&server)
            .get_release("testorg", "TestPackage", "1.0.0", &CancellationToken::new())
            .await
            .unwrap();
        assert!(release.is_none());
    }

    #[tokio::test]
    async fn get_release_500_is_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.0.0")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let err = client(&server)
            .get_release("testorg", "TestPackage", "1.0.0", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Status { status: 500, ref body, .. } if body == "internal"
        ));
    }

    #[tokio::test]
    async fn get_release_reads_document() {
        let mut server = Server::new_async().await;
        let checksum = "a2ac54cf25fbc1ad0028f03f0aa4b96833b83bb05a14e510892bb27dea4dc812";
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.1.1")
            .with_status(200)
            .with_body(format!(
                r#"{{"id":"testorg.TestPackage","version":"1.1.1",
                    "resources":[{{"name":"source-archive","type":"application/zip","checksum":"{checksum}"}}],
                    "metadata":{{"author":{{"name":"Mona"}}}}}}"#
            ))
            .create_async()
            .await;

        let release = client(&server)
            .get_release("testorg", "TestPackage", "1.1.1", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.version, "1.1.1");
        assert_eq!(release.checksum.as_deref(), Some(checksum));
        assert!(release.metadata.contains_key("author"));
    }

    #[tokio::test]
    async fn get_release_with_empty_body_is_present() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.0.0")
            .with_status(200)
            .create_async()
            .await;

        let c = client(&server);
        let cancel = CancellationToken::new();
        assert!(c.version_exists("testorg", "TestPackage", "1.0.0", &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn get_release_with_unexpected_body_is_present() {
        let mut server = Server::new_async().await;
        let _plain = server
            .mock("GET", "/testorg/TestPackage/1.0.0")
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;
        let _mistyped = server
            .mock("GET", "/testorg/TestPackage/1.1.0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version": 1}"#)
            .create_async()
            .await;

        let c = client(&server);
        let cancel = CancellationToken::new();
        assert!(c.version_exists("testorg", "TestPackage", "1.0.0", &cancel).await.unwrap());

        let release = c
            .get_release("testorg", "TestPackage", "1.1.0", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release, Release::with_version("1.1.0"));
    }

    #[tokio::test]
    async fn version_exists_false_on_404() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/9.9.9")
            .with_status(404)
            .create_async()
            .await;

        let exists = client(&server)
            .version_exists("testorg", "TestPackage", "9.9.9", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn publish_sends_digest_and_length() {
        let content = b"test archive content";
        let file = archive_file(content);
        let digest = Sha256Digest::compute(content);

        let mut server = Server::new_async().await;
        let m = server
            .mock("PUT", "/testorg/TestPackage/1.0.0")
            .match_header("authorization", "Bearer test-token")
            .match_header("content-type", "application/zip")
            .match_header("content-length", "20")
            .match_header("digest", digest.header_value().as_str())
            .match_body("test archive content")
            .with_status(201)
            .create_async()
            .await;

        client(&server)
            .publish(
                "testorg",
                "TestPackage",
                "1.0.0",
                file.path(),
                &digest,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn publish_accepts_200() {
        let file = archive_file(b"zip");
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/testorg/TestPackage/1.0.0")
            .with_status(200)
            .create_async()
            .await;

        let result = client(&server)
            .publish(
                "testorg",
                "TestPackage",
                "1.0.0",
                file.path(),
                &Sha256Digest::compute(b"zip"),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn publish_conflict_surfaces_status_and_body() {
        let file = archive_file(b"zip");
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/testorg/TestPackage/1.0.0")
            .with_status(409)
            .with_body("version already exists")
            .create_async()
            .await;

        let err = client(&server)
            .publish(
                "testorg",
                "TestPackage",
                "1.0.0",
                file.path(),
                &Sha256Digest::compute(b"zip"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "Publish failed with status 409: version already exists"
        );
    }

    #[tokio::test]
    async fn publish_rejects_other_success_codes() {
        let file = archive_file(b"zip");
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/testorg/TestPackage/1.0.0")
            .with_status(202)
            .create_async()
            .await;

        let err = client(&server)
            .publish(
                "testorg",
                "TestPackage",
                "1.0.0",
                file.path(),
                &Sha256Digest::compute(b"zip"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(202));
    }

    #[tokio::test]
    async fn publish_missing_archive_is_io_error() {
        let server = Server::new_async().await;
        let err = client(&server)
            .publish(
                "testorg",
                "TestPackage",
                "1.0.0",
                Path::new("/nonexistent/archive.zip"),
                &Sha256Digest::compute(b""),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
    }

    #[tokio::test]
    async fn get_manifest_returns_text() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.0.0/Package.swift")
            .match_header("accept", MANIFEST_MEDIA_TYPE)
            .with_status(200)
            .with_body("// swift-tools-version:5.7\n")
            .create_async()
            .await;

        let text = client(&server)
            .get_manifest("testorg", "TestPackage", "1.0.0", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "// swift-tools-version:5.7\n");
    }

    #[tokio::test]
    async fn get_manifest_404_is_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/testorg/TestPackage/1.0.0/Package.swift")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server)
            .get_manifest("testorg", "TestPackage", "1.0.0", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn cancelled_calls_do_not_complete() {
        let server = Server::new_async().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client(&server)
            .get_release("testorg", "TestPackage", "1.0.0", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = RegistryClient::new("://invalid-url", TOKEN).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidUrl { .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed_and_token_hidden() {
        let c = RegistryClient::new("https://swift.pkg.github.com/", TOKEN).unwrap();
        assert_eq!(c.base_url(), "https://swift.pkg.github.com");
        assert!(!format!("{c:?}").contains(TOKEN));
    }

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", "main"), Ordering::Greater);
        assert_eq!(compare_versions("a", "b"), Ordering::Less);
    }
}
