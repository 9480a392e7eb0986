//! Tile data sources and URL templates.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use reqwest::StatusCode;
use tracing::{debug, trace, warn};
use voxmap_tile::{TileAddress, TileError};

/// Errors building a tile source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("template '{template}' has an unclosed placeholder")]
    UnclosedPlaceholder { template: String },

    #[error("template '{template}' uses unknown placeholder '{{{name}}}'")]
    UnknownPlaceholder { template: String, name: String },

    #[error("template '{template}' must contain '{{{name}}}'")]
    MissingPlaceholder {
        template: String,
        name: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Asynchronous provider of raw tile payloads.
///
/// Implementations classify failures: a missing tile is
/// [`TileError::NotFound`], anything transient is [`TileError::Network`].
pub trait TileSource: Send + Sync + 'static {
    /// Fetch the encoded payload for `address`.
    fn fetch(
        &self,
        address: &TileAddress,
    ) -> impl Future<Output = Result<Vec<u8>, TileError>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Map,
    Lod,
    X,
    Z,
}

/// A tile location pattern with `{map}`, `{lod}`, `{x}` and `{z}`
/// placeholders, e.g. `https://host/maps/{map}/tiles/{lod}/x{x}/z{z}.vxmt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parse a template. `{x}` and `{z}` are required.
    pub fn parse(template: &str) -> Result<Self, SourceError> {
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| SourceError::UnclosedPlaceholder {
                    template: template.to_string(),
                })?;
            segments.push(match &after[..close] {
                "map" => Segment::Map,
                "lod" => Segment::Lod,
                "x" => Segment::X,
                "z" => Segment::Z,
                other => {
                    return Err(SourceError::UnknownPlaceholder {
                        template: template.to_string(),
                        name: other.to_string(),
                    });
                }
            });
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        for (segment, name) in [(Segment::X, "x"), (Segment::Z, "z")] {
            if !segments.contains(&segment) {
                return Err(SourceError::MissingPlaceholder {
                    template: template.to_string(),
                    name,
                });
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// Substitute `address` into the template.
    pub fn resolve(&self, address: &TileAddress) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Map => out.push_str(&address.map_id),
                Segment::Lod => out.push_str(&address.lod.to_string()),
                Segment::X => out.push_str(&address.x.to_string()),
                Segment::Z => out.push_str(&address.z.to_string()),
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

/// Default User-Agent for tile requests.
const USER_AGENT: &str = concat!("voxmap/", env!("CARGO_PKG_VERSION"));

/// Fetches tiles over HTTP(S).
///
/// 404 and 410 map to `NotFound`; every other failure, including other
/// error statuses, maps to `Network`. Timeouts are applied per attempt by
/// the loader, not here.
#[derive(Clone)]
pub struct HttpTileSource {
    client: reqwest::Client,
    template: UrlTemplate,
}

impl HttpTileSource {
    pub fn new(template: UrlTemplate) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(16)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client, template })
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }
}

impl TileSource for HttpTileSource {
    async fn fetch(&self, address: &TileAddress) -> Result<Vec<u8>, TileError> {
        let url = self.template.resolve(address);
        trace!(url = %url, "HTTP GET tile");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "tile request failed"
            );
            TileError::network(address, format!("request failed: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!(url = %url, status = status.as_u16(), "tile not found");
            return Err(TileError::not_found(address));
        }
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "tile request returned error status");
            return Err(TileError::network(address, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TileError::network(address, format!("failed to read body: {e}")))?;
        trace!(url = %url, bytes = body.len(), "tile body read");
        Ok(body.to_vec())
    }
}

/// Reads tiles from the local filesystem. The template resolves to a path.
#[derive(Clone, Debug)]
pub struct FileTileSource {
    template: UrlTemplate,
}

impl FileTileSource {
    pub fn new(template: UrlTemplate) -> Self {
        Self { template }
    }

    /// Path of the payload for `address`.
    pub fn path_for(&self, address: &TileAddress) -> PathBuf {
        PathBuf::from(self.template.resolve(address))
    }
}

impl TileSource for FileTileSource {
    async fn fetch(&self, address: &TileAddress) -> Result<Vec<u8>, TileError> {
        let path = self.path_for(address);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TileError::not_found(address)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read tile file");
                Err(TileError::network(address, format!("read {}: {e}", path.display())))
            }
        }
    }
}

/// A source chosen from the configured template: `http://` and `https://`
/// templates fetch over HTTP, `file://` or bare paths read from disk.
#[derive(Clone)]
pub enum ConfiguredSource {
    Http(HttpTileSource),
    File(FileTileSource),
}

impl ConfiguredSource {
    pub fn from_template(template: &str) -> Result<Self, SourceError> {
        if template.starts_with("http://") || template.starts_with("https://") {
            return Ok(Self::Http(HttpTileSource::new(UrlTemplate::parse(template)?)?));
        }
        let path = template.strip_prefix("file://").unwrap_or(template);
        Ok(Self::File(FileTileSource::new(UrlTemplate::parse(path)?)))
    }

    /// Short name of the transport, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::File(_) => "file",
        }
    }
}

impl TileSource for ConfiguredSource {
    async fn fetch(&self, address: &TileAddress) -> Result<Vec<u8>, TileError> {
        match self {
            Self::Http(source) => source.fetch(address).await,
            Self::File(source) => source.fetch(address).await,
        }
    }
}
