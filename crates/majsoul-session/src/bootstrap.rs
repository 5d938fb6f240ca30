//! Discovery of the protocol schema and a gateway endpoint.
//!
//! The web client finds its way in through a chain of JSON documents:
//!
//! ```text
//! version.json ─→ resversion{v}.json ─┬→ {prefix}/res/proto/liqi.json   (schema)
//!                                     └→ {prefix}/config.json           (regions)
//!                                           └→ region server list ─→ wss://{server}
//! ```
//!
//! [`HttpBootstrap`] walks that chain. [`StaticBootstrap`] skips it for a
//! pinned endpoint and schema, which is also what the tests use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use majsoul_protocol::Schema;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::DEFAULT_BASE_URL;
use crate::SessionError;

const SCHEMA_RESOURCE: &str = "res/proto/liqi.json";
const CONFIG_RESOURCE: &str = "config.json";
const PLAYER_REGION: &str = "player";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// What a session needs before it can connect.
#[derive(Debug, Clone)]
pub struct BootstrapInfo {
    pub schema: Arc<Schema>,
    /// `wss://` gateway URL.
    pub endpoint: String,
    /// Resource version, e.g. `0.11.8.w`.
    pub version: String,
}

/// Resolves a [`BootstrapInfo`], once per session attempt.
pub trait Bootstrap: Send + Sync + 'static {
    fn resolve(&self) -> impl Future<Output = Result<BootstrapInfo, SessionError>> + Send;
}

/// Always resolves to the same info.
#[derive(Debug, Clone)]
pub struct StaticBootstrap(pub BootstrapInfo);

impl Bootstrap for StaticBootstrap {
    async fn resolve(&self) -> Result<BootstrapInfo, SessionError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    prefix: String,
}

#[derive(Debug, Deserialize)]
struct ResourceInfo {
    res: HashMap<String, ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpDef {
    name: String,
    #[serde(default)]
    region_urls: Vec<RegionUrl>,
}

#[derive(Debug, Deserialize)]
struct ClientConfig {
    #[serde(default)]
    ip: Vec<IpDef>,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    #[serde(default)]
    servers: Vec<String>,
}

/// Walks the web client's bootstrap documents over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpBootstrap {
    client: reqwest::Client,
    base_url: String,
}

impl Default for HttpBootstrap {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpBootstrap {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        step: &'static str,
        url: &str,
    ) -> Result<T, SessionError> {
        tracing::debug!(step, url, "fetching bootstrap document");
        self.client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SessionError::bootstrap(step, e))?
            .json::<T>()
            .await
            .map_err(|e| SessionError::bootstrap(step, e))
    }
}

impl Bootstrap for HttpBootstrap {
    async fn resolve(&self) -> Result<BootstrapInfo, SessionError> {
        let base = &self.base_url;

        let version: VersionInfo = self
            .get_json("version", &format!("{base}version.json?randv={}", random_digits()))
            .await?;
        let resources: ResourceInfo = self
            .get_json(
                "resource manifest",
                &format!("{base}resversion{}.json", version.version),
            )
            .await?;

        let schema_prefix = resource_prefix(&resources, SCHEMA_RESOURCE)?;
        let raw_schema: serde_json::Value = self
            .get_json("schema", &format!("{base}{schema_prefix}/{SCHEMA_RESOURCE}"))
            .await?;
        let schema = Schema::from_value(raw_schema)?;

        let config_prefix = resource_prefix(&resources, CONFIG_RESOURCE)?;
        let config: ClientConfig = self
            .get_json("config", &format!("{base}{config_prefix}/{CONFIG_RESOURCE}"))
            .await?;
        let region = pick(&player_regions(&config)?, "config")?;

        let list: ServerList = self
            .get_json("server list", &server_list_url(&region, &random_digits()))
            .await?;
        let server = pick(&list.servers, "server list")?;

        let endpoint = gateway_endpoint(&server);
        tracing::info!(version = %version.version, %endpoint, "bootstrap resolved");
        Ok(BootstrapInfo {
            schema: Arc::new(schema),
            endpoint,
            version: version.version,
        })
    }
}

fn resource_prefix<'a>(res: &'a ResourceInfo, path: &str) -> Result<&'a str, SessionError> {
    res.res
        .get(path)
        .map(|e| e.prefix.as_str())
        .ok_or_else(|| SessionError::bootstrap("resource manifest", format!("no entry for {path}")))
}

fn player_regions(config: &ClientConfig) -> Result<Vec<String>, SessionError> {
    config
        .ip
        .iter()
        .find(|ip| ip.name == PLAYER_REGION)
        .map(|ip| ip.region_urls.iter().map(|r| r.url.clone()).collect())
        .ok_or_else(|| SessionError::bootstrap("config", "no player region"))
}

fn pick(options: &[String], step: &'static str) -> Result<String, SessionError> {
    options
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| SessionError::bootstrap(step, "empty list"))
}

fn random_digits() -> String {
    rand::rng().random::<u64>().to_string()
}

fn server_list_url(region: &str, rv: &str) -> String {
    format!("{region}?service=ws-gateway&protocol=ws&ssl=true&rv={rv}")
}

/// The websocket URL for a server-list entry.
///
/// Hosts on the `maj-soul` domains serve the lobby under `/gateway`.
pub fn gateway_endpoint(server: &str) -> String {
    if server.contains("maj-soul") {
        format!("wss://{server}/gateway")
    } else {
        format!("wss://{server}")
    }
}
