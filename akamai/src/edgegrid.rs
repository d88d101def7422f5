//! EdgeGrid credentials and request signing
//!
//! Credentials come from an `.edgerc` file, from `AKAMAI_*` environment
//! variables, or from the provider's `config` block. Every API request is
//! signed with the `EG1-HMAC-SHA256` scheme.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SECTION: &str = "default";
pub const DEFAULT_MAX_BODY: usize = 131072;

#[derive(Debug, Error)]
pub enum EdgegridError {
    #[error("unable to read edgerc file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("section {0:?} not found in edgerc file")]
    SectionNotFound(String),

    #[error("required credential {field:?} is missing in section {section:?}")]
    MissingField { section: String, field: String },

    #[error("invalid value for {field:?}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("unable to locate home directory for the default edgerc path")]
    NoHomeDir,

    #[error("signing failed: {0}")]
    Signing(String),
}

/// API client credentials for one `.edgerc` section
#[derive(Clone, PartialEq)]
pub struct EdgegridConfig {
    pub host: String,
    pub client_token: String,
    pub client_secret: String,
    pub access_token: String,
    pub max_body: usize,
    pub account_key: Option<String>,
}

impl std::fmt::Debug for EdgegridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgegridConfig")
            .field("host", &self.host)
            .field("client_token", &self.client_token)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("max_body", &self.max_body)
            .field("account_key", &self.account_key)
            .finish()
    }
}

#[derive(Default)]
struct PartialConfig {
    host: Option<String>,
    client_token: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    max_body: Option<String>,
    account_key: Option<String>,
}

impl PartialConfig {
    fn set(&mut self, key: &str, value: String) {
        match key {
            "host" => self.host = Some(value),
            "client_token" => self.client_token = Some(value),
            "client_secret" => self.client_secret = Some(value),
            "access_token" => self.access_token = Some(value),
            "max_body" => self.max_body = Some(value),
            "account_key" => self.account_key = Some(value),
            _ => tracing::debug!("ignoring unknown edgerc key {:?}", key),
        }
    }

    fn finish(self, section: &str) -> Result<EdgegridConfig, EdgegridError> {
        let required = |value: Option<String>, field: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| EdgegridError::MissingField {
                    section: section.to_string(),
                    field: field.to_string(),
                })
        };

        let max_body = match self.max_body {
            Some(v) if !v.is_empty() => v.parse().map_err(|_| EdgegridError::InvalidValue {
                field: "max_body".to_string(),
                message: format!("{:?} is not a number", v),
            })?,
            _ => DEFAULT_MAX_BODY,
        };

        let config = EdgegridConfig {
            host: required(self.host, "host")?,
            client_token: required(self.client_token, "client_token")?,
            client_secret: required(self.client_secret, "client_secret")?,
            access_token: required(self.access_token, "access_token")?,
            max_body,
            account_key: self.account_key.filter(|v| !v.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl EdgegridConfig {
    /// Environment first, then the edgerc file
    pub fn resolve(edgerc: Option<&str>, section: &str) -> Result<Self, EdgegridError> {
        if let Some(config) = Self::from_env(section) {
            tracing::debug!("using EdgeGrid credentials from environment for {:?}", section);
            return config;
        }

        let path = match edgerc.filter(|p| !p.is_empty()) {
            Some(p) => expand_home(p)?,
            None => default_edgerc_path()?,
        };
        tracing::debug!("loading EdgeGrid credentials from {}", path.display());
        Self::from_file(&path, section)
    }

    /// `AKAMAI_HOST` etc. for the default section, `AKAMAI_{SECTION}_HOST` otherwise.
    /// None unless the host variable is present.
    pub fn from_env(section: &str) -> Option<Result<Self, EdgegridError>> {
        let prefix = env_prefix(section);
        let var = |name: &str| std::env::var(format!("{}{}", prefix, name)).ok();

        var("HOST")?;
        let partial = PartialConfig {
            host: var("HOST"),
            client_token: var("CLIENT_TOKEN"),
            client_secret: var("CLIENT_SECRET"),
            access_token: var("ACCESS_TOKEN"),
            max_body: var("MAX_BODY"),
            account_key: var("ACCOUNT_KEY"),
        };
        Some(partial.finish(section))
    }

    pub fn from_file(path: &Path, section: &str) -> Result<Self, EdgegridError> {
        let contents = std::fs::read_to_string(path).map_err(|source| EdgegridError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        parse_edgerc(&contents, section)
    }

    fn validate(&self) -> Result<(), EdgegridError> {
        if self.host.ends_with('/') {
            return Err(EdgegridError::InvalidValue {
                field: "host".to_string(),
                message: "host must not end with a slash".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL for API requests; hosts without a scheme use https
    pub fn base_url(&self) -> Result<Url, EdgegridError> {
        let raw = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("https://{}", self.host)
        };
        Url::parse(&raw).map_err(|e| EdgegridError::InvalidValue {
            field: "host".to_string(),
            message: e.to_string(),
        })
    }
}

fn env_prefix(section: &str) -> String {
    if section.is_empty() || section == DEFAULT_SECTION {
        "AKAMAI_".to_string()
    } else {
        format!("AKAMAI_{}_", section.to_uppercase().replace('-', "_"))
    }
}

fn default_edgerc_path() -> Result<PathBuf, EdgegridError> {
    dirs::home_dir()
        .map(|home| home.join(".edgerc"))
        .ok_or(EdgegridError::NoHomeDir)
}

fn expand_home(path: &str) -> Result<PathBuf, EdgegridError> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir().ok_or(EdgegridError::NoHomeDir)?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Parse one section of an INI-style `.edgerc` file
pub fn parse_edgerc(contents: &str, section: &str) -> Result<EdgegridConfig, EdgegridError> {
    let mut current: Option<&str> = None;
    let mut found = false;
    let mut partial = PartialConfig::default();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            current = Some(name);
            found |= name == section;
            continue;
        }
        if current != Some(section) {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            partial.set(key.trim(), value.to_string());
        }
    }

    if !found {
        return Err(EdgegridError::SectionNotFound(section.to_string()));
    }
    partial.finish(section)
}

/// Produces `Authorization` header values for requests
#[derive(Clone)]
pub struct Signer {
    config: EdgegridConfig,
}

impl Signer {
    pub fn new(config: EdgegridConfig) -> Self {
        Self { config }
    }

    pub fn sign(&self, method: &str, url: &Url, body: Option<&[u8]>) -> Result<String, EdgegridError> {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H:%M:%S+0000").to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        self.sign_with(method, url, body, &timestamp, &nonce)
    }

    pub fn sign_with(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
        timestamp: &str,
        nonce: &str,
    ) -> Result<String, EdgegridError> {
        let auth_prefix = format!(
            "EG1-HMAC-SHA256 client_token={};access_token={};timestamp={};nonce={};",
            self.config.client_token, self.config.access_token, timestamp, nonce
        );

        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let data_to_sign = [
            method.to_uppercase().as_str(),
            url.scheme(),
            host.as_str(),
            path.as_str(),
            "",
            self.content_hash(method, body).as_str(),
            auth_prefix.as_str(),
        ]
        .join("\t");

        let signing_key = STANDARD.encode(hmac_sha256(
            self.config.client_secret.as_bytes(),
            timestamp.as_bytes(),
        )?);
        let signature = STANDARD.encode(hmac_sha256(
            signing_key.as_bytes(),
            data_to_sign.as_bytes(),
        )?);

        Ok(format!("{}signature={}", auth_prefix, signature))
    }

    /// Only POST bodies are hashed, truncated to max_body
    fn content_hash(&self, method: &str, body: Option<&[u8]>) -> String {
        match body {
            Some(body) if method.eq_ignore_ascii_case("POST") && !body.is_empty() => {
                let end = body.len().min(self.config.max_body);
                STANDARD.encode(Sha256::digest(&body[..end]))
            }
            _ => String::new(),
        }
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EdgegridError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| EdgegridError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
