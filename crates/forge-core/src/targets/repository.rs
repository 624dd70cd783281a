//! Remote Maven repository target.
//!
//! Uploads use the Maven 2 layout over plain HTTP `PUT`:
//!
//! ```text
//! <url>/<group path>/<artifactId>/<version>/<artifactId>-<version>.jar
//! <url>/<group path>/<artifactId>/<version>/<artifactId>-<version>.pom
//! <url>/<group path>/<artifactId>/<version>/<artifactId>-<version>.jar.sha256
//! ```
//!
//! The checksum goes up last, so a `.sha256` only exists for a complete
//! publication and doubles as the target's current content hash.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use forge_schema::ContentHash;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Outcome, PublicationTarget, settings};
use crate::bundle::{Bundle, BundleId};
use crate::config::TargetConfig;
use crate::error::ConfigError;
use crate::pom::{self, PomDetails};

pub const KIND: &str = "repository";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositorySettings {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Publishes to a Maven repository over HTTP.
#[derive(Debug, Clone)]
pub struct RepositoryTarget {
    name: String,
    url: String,
    client: Client,
    credentials: Option<Credentials>,
}

/// `FORGE_<TARGET>_<SUFFIX>` with the target name upper-cased and every
/// non-alphanumeric character replaced by `_`.
pub fn credential_var(target: &str, suffix: &str) -> String {
    let name: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("FORGE_{name}_{suffix}")
}

impl RepositoryTarget {
    /// A target uploading under `url` without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if the HTTP client cannot be built.
    pub fn new(name: &str, url: &str) -> Result<Self, ConfigError> {
        Self::with_timeout(name, url, Duration::from_secs(default_timeout_secs()))
    }

    fn with_timeout(name: &str, url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = url.trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::target(name, format!("unsupported url '{url}'")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| ConfigError::target(name, e))?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
            credentials: None,
        })
    }

    /// Build from a `[[targets]]` entry with `kind = "repository"`.
    ///
    /// Credentials come from `username`/`password` or, when absent, from the
    /// `FORGE_<TARGET>_USERNAME` / `FORGE_<TARGET>_PASSWORD` variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] for missing or malformed settings.
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// As [`RepositoryTarget::from_config`], reading variables through `var`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] for missing or malformed settings.
    pub fn from_config_with_env(
        config: &TargetConfig,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings: RepositorySettings = settings(config)?;
        let mut target = Self::with_timeout(
            &config.name,
            &settings.url,
            Duration::from_secs(settings.timeout_secs),
        )?;

        let username = settings
            .username
            .or_else(|| var(&credential_var(&config.name, "USERNAME")));
        let password = settings
            .password
            .or_else(|| var(&credential_var(&config.name, "PASSWORD")));
        target.credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::target(
                    &config.name,
                    "username and password must be given together",
                ));
            }
        };
        Ok(target)
    }

    /// Add basic-auth credentials (builder style).
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn artifact_url(&self, artifact: &BundleId, extension: &str) -> String {
        format!(
            "{}/{}/{}-{}.{extension}",
            self.url,
            artifact.repository_dir(),
            artifact.artifact_id,
            artifact.version
        )
    }

    async fn put(&self, url: &str, body: Bytes, content_type: &str) -> Result<(), Outcome> {
        debug!(target = %self.name, url, "PUT");
        let mut request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_error(url, &e))?;
        match classify_status(response.status()) {
            Outcome::Success => Ok(()),
            Outcome::Retryable(status) => Err(Outcome::Retryable(format!("PUT {url}: {status}"))),
            Outcome::Fatal(status) => Err(Outcome::Fatal(format!("PUT {url}: {status}"))),
        }
    }

    async fn upload(&self, bundle: &Bundle) -> Result<(), Outcome> {
        let id = bundle.id();
        if id.group.is_none() {
            return Err(Outcome::Fatal(
                "repository layout requires a group".to_string(),
            ));
        }
        id.validate().map_err(|e| Outcome::Fatal(e.to_string()))?;

        self.put(
            &self.artifact_url(id, "jar"),
            bundle.archive().clone(),
            "application/java-archive",
        )
        .await?;
        self.put(
            &self.artifact_url(id, "pom"),
            pom_for(bundle),
            "application/xml",
        )
        .await?;
        self.put(
            &self.artifact_url(id, "jar.sha256"),
            Bytes::from(bundle.digest().to_string()),
            "text/plain",
        )
        .await
    }
}

/// Map a response status to an attempt outcome.
pub fn classify_status(status: StatusCode) -> Outcome {
    if status.is_success() {
        Outcome::Success
    } else if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Outcome::Retryable(status.to_string())
    } else {
        Outcome::Fatal(status.to_string())
    }
}

fn classify_error(url: &str, err: &reqwest::Error) -> Outcome {
    let reason = format!("PUT {url}: {err}");
    if err.is_builder() || err.is_redirect() {
        Outcome::Fatal(reason)
    } else {
        Outcome::Retryable(reason)
    }
}

/// The `pom.xml` embedded in the bundle, or a coordinates-only POM.
fn pom_for(bundle: &Bundle) -> Bytes {
    pom::embedded_pom_path(bundle.id())
        .and_then(|path| bundle.contents().get(&path))
        .map_or_else(
            || Bytes::from(pom::render_pom(bundle.id(), &PomDetails::default())),
            |entry| Bytes::copy_from_slice(&entry.content()),
        )
}

#[async_trait]
impl PublicationTarget for RepositoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn accepts(&self, bundle: &Bundle) -> Outcome {
        match self.upload(bundle).await {
            Ok(()) => Outcome::Success,
            Err(outcome) => outcome,
        }
    }

    async fn current_content_hash(&self, artifact: &BundleId) -> Option<ContentHash> {
        artifact.validate().ok()?;
        let url = self.artifact_url(artifact, "jar.sha256");
        let mut request = self.client.get(&url);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(target = %self.name, url = %url, error = %e, "cannot query current checksum");
                return None;
            }
        };
        if response.status() == StatusCode::NOT_FOUND {
            return None;
        }
        if !response.status().is_success() {
            warn!(target = %self.name, url = %url, status = %response.status(), "unexpected checksum status");
            return None;
        }

        let text = response.text().await.ok()?;
        match ContentHash::parse(&text) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(target = %self.name, url = %url, error = %e, "malformed remote checksum");
                None
            }
        }
    }
}
