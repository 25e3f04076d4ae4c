//! [`EngineClient`] backed by the Docker Engine HTTP API
//!
//! Talks to a daemon listening on its Unix socket (`unix:///var/run/docker.sock`)
//! or on TCP (`tcp://host:port`, `http://` or `https://`). Registry credentials
//! travel per call in the `X-Registry-Auth` header; the daemon performs the actual
//! registry protocol and streams JSON progress back.

use crate::error::handlers::{EngineErrorHandler, NetworkErrorHandler};
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::auth::AuthToken;
use crate::registry::engine::{ByteStream, EngineClient, ImageSummary};
use crate::registry::reference::split_tag;
use async_trait::async_trait;
use futures::StreamExt;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_util::client::legacy::Client as SocketClient;
use hyper_util::rt::TokioExecutor;
use hyperlocal::UnixConnector;
use reqwest::{Client, Method};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Timeout for short, non-streaming engine calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Base URL used to lay out request paths for socket hosts
const SOCKET_BASE_URL: &str = "http://localhost/";

/// Where an engine host listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHost {
    /// HTTP base URL ending in `/`
    Http(Url),
    /// Path of a Unix domain socket
    Socket(PathBuf),
}

enum Transport {
    Http(Client),
    Socket {
        client: SocketClient<UnixConnector, Empty<Bytes>>,
        path: PathBuf,
    },
}

pub struct DockerEngine {
    transport: Transport,
    base_url: Url,
    endpoint: String,
}

impl DockerEngine {
    /// Create a client for one engine host, without contacting it
    pub fn new(host: &str) -> Result<Self> {
        match Self::parse_host(host)? {
            EngineHost::Http(base_url) => {
                let client = Client::builder()
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| {
                        SyncError::Network(format!("Failed to create engine client: {}", e))
                    })?;

                Ok(Self {
                    endpoint: base_url.to_string(),
                    transport: Transport::Http(client),
                    base_url,
                })
            }
            EngineHost::Socket(path) => {
                let client = SocketClient::builder(TokioExecutor::new()).build(UnixConnector);

                Ok(Self {
                    endpoint: format!("unix://{}", path.display()),
                    transport: Transport::Socket { client, path },
                    base_url: Url::parse(SOCKET_BASE_URL)?,
                })
            }
        }
    }

    /// Try each host in order and keep the first one that answers a ping
    pub async fn connect(hosts: &[String], output: &Logger) -> Result<Self> {
        let mut failures = Vec::new();

        for host in hosts {
            let engine = match Self::new(host) {
                Ok(engine) => engine,
                Err(e) => {
                    output.warning(&format!("Skipping engine host {}: {}", host, e));
                    failures.push(format!("{}: {}", host, e));
                    continue;
                }
            };

            match engine.ping().await {
                Ok(()) => {
                    output.verbose(&format!("Connected to container engine at {}", host));
                    return Ok(engine);
                }
                Err(e) => {
                    output.detail(&format!("Engine host {} did not answer: {}", host, e));
                    failures.push(format!("{}: {}", host, e));
                }
            }
        }

        Err(SyncError::Configuration(format!(
            "No container engine reachable (tried {})",
            if failures.is_empty() {
                "no hosts".to_string()
            } else {
                failures.join("; ")
            }
        )))
    }

    /// Classify an engine host string
    pub fn parse_host(host: &str) -> Result<EngineHost> {
        let host = host.trim();
        if host.is_empty() {
            return Err(SyncError::Validation("Engine host cannot be empty".to_string()));
        }
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(SyncError::Validation(format!(
                    "Socket engine host has no path: {}",
                    host
                )));
            }
            return Ok(EngineHost::Socket(PathBuf::from(path)));
        }
        if host.starts_with("npipe://") {
            return Err(SyncError::Validation(format!(
                "Named pipe engine hosts are not supported: {}",
                host
            )));
        }

        let normalized = if let Some(rest) = host.strip_prefix("tcp://") {
            format!("http://{}", rest)
        } else if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let mut url = Url::parse(&normalized)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(EngineHost::Http(url))
    }

    /// Request URL with each segment percent-encoded on its own
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Validation(format!("Invalid engine host: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// `images/<name>/<action>` for an image name or ID
    fn image_url(&self, name: &str, action: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut segments = vec!["images"];
        segments.extend(image_name_segments(name)?);
        segments.push(action);
        self.url(&segments, query)
    }

    /// Repository and tag query values; untagged references mean `latest`
    fn repository_and_tag(reference: &str) -> (&str, Option<&str>) {
        if reference.contains('@') {
            return (reference, None);
        }
        let (repository, tag) = split_tag(reference);
        (repository, Some(tag.unwrap_or("latest")))
    }

    /// Send a bodyless request and return the response body once the status is a success
    async fn execute(
        &self,
        method: Method,
        url: Url,
        auth: Option<&AuthToken>,
        timeout: Option<Duration>,
        operation: &str,
    ) -> Result<ByteStream> {
        let auth = auth.filter(|token| !token.is_anonymous());

        let (status, body) = match &self.transport {
            Transport::Http(client) => {
                let mut request = client.request(method, url);
                if let Some(timeout) = timeout {
                    request = request.timeout(timeout);
                }
                if let Some(token) = auth {
                    request = request.header(REGISTRY_AUTH_HEADER, token.as_str());
                }

                let response = request.send().await?;
                let status = response.status();
                let body = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(SyncError::from))
                    .boxed();
                (status, body)
            }
            Transport::Socket { client, path } => {
                let target = match url.query() {
                    Some(query) => format!("{}?{}", url.path(), query),
                    None => url.path().to_string(),
                };
                let mut request = hyper::Request::builder()
                    .method(method)
                    .uri(hyperlocal::Uri::new(path, &target));
                if let Some(token) = auth {
                    request = request.header(REGISTRY_AUTH_HEADER, token.as_str());
                }
                let request = request.body(Empty::new()).map_err(|e| {
                    SyncError::Validation(format!("Invalid engine request {}: {}", target, e))
                })?;

                let pending = client.request(request);
                let response = match timeout {
                    Some(timeout) => tokio::time::timeout(timeout, pending)
                        .await
                        .map_err(|_| SyncError::Timeout(format!("{} timeout", operation)))?,
                    None => pending.await,
                }
                .map_err(|e| NetworkErrorHandler::handle_socket_error(&e, operation))?;

                let status = response.status();
                let body = response
                    .into_body()
                    .into_data_stream()
                    .map(|chunk| {
                        chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                            SyncError::Network(format!("Engine socket stream error: {}", e))
                        })
                    })
                    .boxed();
                (status, body)
            }
        };

        if status.is_success() {
            return Ok(body);
        }
        let text = match read_body(body).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(_) => "Failed to read error response".to_string(),
        };
        Err(EngineErrorHandler::handle_engine_error(status, &text, operation))
    }
}

/// Path segments of an image name; empty, `.` and `..` segments are refused
fn image_name_segments(name: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = name.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(SyncError::Validation(format!(
            "Invalid image reference: {:?}",
            name
        )));
    }
    Ok(segments)
}

async fn read_body(mut body: ByteStream) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend(chunk?);
    }
    Ok(bytes)
}

#[async_trait]
impl EngineClient for DockerEngine {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn ping(&self) -> Result<()> {
        let url = self.url(&["_ping"], &[])?;
        self.execute(Method::GET, url, None, Some(REQUEST_TIMEOUT), "ping engine")
            .await?;
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let (repository, tag) = split_tag(target);
        let mut query = vec![("repo", repository)];
        if let Some(tag) = tag {
            query.push(("tag", tag));
        }

        let url = self.image_url(source, "tag", &query)?;
        let operation = format!("tag {} as {}", source, target);
        self.execute(Method::POST, url, None, Some(REQUEST_TIMEOUT), &operation)
            .await?;
        Ok(())
    }

    async fn push(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream> {
        let (repository, tag) = Self::repository_and_tag(reference);
        let query: Vec<(&str, &str)> = tag.map(|tag| ("tag", tag)).into_iter().collect();

        let url = self.image_url(repository, "push", &query)?;
        self.execute(
            Method::POST,
            url,
            Some(auth),
            None,
            &format!("push {}", reference),
        )
        .await
    }

    async fn pull(&self, reference: &str, auth: &AuthToken) -> Result<ByteStream> {
        let (repository, tag) = Self::repository_and_tag(reference);
        let mut query = vec![("fromImage", repository)];
        if let Some(tag) = tag {
            query.push(("tag", tag));
        }

        let url = self.url(&["images", "create"], &query)?;
        self.execute(
            Method::POST,
            url,
            Some(auth),
            None,
            &format!("pull {}", reference),
        )
        .await
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let url = self.url(&["images", "json"], &[])?;
        let body = self
            .execute(Method::GET, url, None, Some(REQUEST_TIMEOUT), "list images")
            .await?;
        let bytes = read_body(body).await?;
        let images = serde_json::from_slice::<Vec<ImageSummary>>(&bytes)
            .map_err(|e| SyncError::Serialization(format!("Invalid image list: {}", e)))?;
        Ok(images)
    }

    async fn save(&self, names: &[String]) -> Result<ByteStream> {
        let query: Vec<(&str, &str)> = names.iter().map(|name| ("names", name.as_str())).collect();
        let url = self.url(&["images", "get"], &query)?;
        self.execute(Method::GET, url, None, None, "export images")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(host: &str) -> String {
        match DockerEngine::parse_host(host).unwrap() {
            EngineHost::Http(url) => url.to_string(),
            other => panic!("expected an HTTP host, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_host_variants() {
        assert_eq!(http("tcp://127.0.0.1:2375"), "http://127.0.0.1:2375/");
        assert_eq!(http("https://docker.internal:2376"), "https://docker.internal:2376/");
        assert_eq!(http("localhost:2375"), "http://localhost:2375/");
        assert_eq!(http("http://proxy/docker"), "http://proxy/docker/");
        assert_eq!(
            DockerEngine::parse_host("unix:///var/run/docker.sock").unwrap(),
            EngineHost::Socket(PathBuf::from("/var/run/docker.sock"))
        );
    }

    #[test]
    fn test_parse_host_rejects_pipes_and_blank() {
        assert!(DockerEngine::parse_host("npipe:////./pipe/docker_engine").is_err());
        assert!(DockerEngine::parse_host("unix://").is_err());
        assert!(DockerEngine::parse_host("  ").is_err());
    }

    #[test]
    fn test_socket_endpoint() {
        let engine = DockerEngine::new("unix:///run/user/1000/docker.sock").unwrap();
        assert_eq!(engine.endpoint(), "unix:///run/user/1000/docker.sock");
    }

    #[test]
    fn test_repository_and_tag_defaults_to_latest() {
        assert_eq!(
            DockerEngine::repository_and_tag("docker.io/team/app"),
            ("docker.io/team/app", Some("latest"))
        );
        assert_eq!(
            DockerEngine::repository_and_tag("docker.io/team/app:v1"),
            ("docker.io/team/app", Some("v1"))
        );
        assert_eq!(
            DockerEngine::repository_and_tag("app@sha256:abc"),
            ("app@sha256:abc", None)
        );
    }

    #[test]
    fn test_image_url_escapes_each_segment() {
        let engine = DockerEngine::new("tcp://127.0.0.1:2375").unwrap();

        let url = engine
            .image_url("registry.local:5000/team/app", "push", &[("tag", "v1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:2375/images/registry.local:5000/team/app/push?tag=v1"
        );

        let url = engine.image_url("app?force=1#x", "tag", &[]).unwrap();
        assert_eq!(url.path(), "/images/app%3Fforce=1%23x/tag");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_image_name_segments_refuse_traversal() {
        assert!(image_name_segments("../../containers/json").is_err());
        assert!(image_name_segments("team//app").is_err());
        assert!(image_name_segments("").is_err());
        assert_eq!(
            image_name_segments("docker.io/team/app").unwrap(),
            vec!["docker.io", "team", "app"]
        );
    }
}
