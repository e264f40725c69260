//! Environment selection and per-service URL resolution.
//!
//! A platform is described by a `resources/<env>_env.properties` file
//! (INI syntax). When the file carries a `bearer` token the `hostname` is a
//! gateway and every service lives under a path prefix; otherwise each
//! service is addressed directly on its own port. The effective user name
//! comes from the token's `sub` claim in gateway mode, from the `username`
//! property otherwise.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde_json::Value;
use tracing::info;

use crate::error::{BddError, Result};

/// Default resource directory holding the `<env>_env.properties` files.
pub const RESOURCES_DIR: &str = "resources";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicroService {
    Case,
    Study,
    Directory,
    Explore,
    Actions,
    Config,
    NetworkConversion,
    NetworkModification,
    Filter,
    DirectoryNotification,
    StudyNotification,
}

impl MicroService {
    pub const ALL: [MicroService; 11] = [
        MicroService::Case,
        MicroService::Study,
        MicroService::Directory,
        MicroService::Explore,
        MicroService::Actions,
        MicroService::Config,
        MicroService::NetworkConversion,
        MicroService::NetworkModification,
        MicroService::Filter,
        MicroService::DirectoryNotification,
        MicroService::StudyNotification,
    ];

    /// Path prefix behind the gateway.
    fn gateway_path(self) -> &'static str {
        match self {
            MicroService::Case => "/case",
            MicroService::Study => "/study",
            MicroService::Directory => "/directory",
            MicroService::Explore => "/explore",
            MicroService::Actions => "/actions",
            MicroService::Config => "/config",
            MicroService::NetworkConversion => "/network-conversion",
            MicroService::NetworkModification => "/network-modification",
            MicroService::Filter => "/filter",
            MicroService::DirectoryNotification => "/directory-notification",
            MicroService::StudyNotification => "/notification",
        }
    }

    /// Direct port when no gateway is involved.
    fn port(self) -> u16 {
        match self {
            MicroService::Case => 5000,
            MicroService::Study => 5001,
            MicroService::NetworkConversion => 5003,
            MicroService::NetworkModification => 5007,
            MicroService::DirectoryNotification => 5009,
            MicroService::StudyNotification => 5014,
            MicroService::Actions => 5022,
            MicroService::Config => 5025,
            MicroService::Directory => 5026,
            MicroService::Filter => 5027,
            MicroService::Explore => 5029,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvProperties {
    env_name: String,
    host: String,
    user_name: String,
    bearer: Option<String>,
    tmp_root_dir: String,
    service_urls: HashMap<MicroService, String>,
}

impl EnvProperties {
    /// Loads `resources/<env>_env.properties`.
    pub fn load(environment_name: &str) -> Result<Self> {
        Self::load_from(Path::new(RESOURCES_DIR), environment_name)
    }

    pub fn load_from(resources_dir: &Path, environment_name: &str) -> Result<Self> {
        let props_file = resources_dir.join(format!("{environment_name}_env.properties"));
        if !props_file.is_file() {
            return Err(BddError::Config(format!(
                "no property file '{}'",
                props_file.display()
            )));
        }
        info!("loading property file '{}'", props_file.display());

        let props = Config::builder()
            .add_source(File::from(props_file.as_path()).format(FileFormat::Ini))
            .build()
            .map_err(|e| BddError::Config(e.to_string()))?;

        let host = props
            .get_string("hostname")
            .map_err(|_| BddError::Config("cannot find hostname property".into()))?;

        // USING_BEARER overrides the property; an empty value means none
        let bearer = std::env::var("USING_BEARER")
            .ok()
            .or_else(|| props.get_string("bearer").ok())
            .filter(|b| !b.is_empty());

        let user_name = match &bearer {
            // a bearer means the host is a gateway; the user comes from the token
            Some(token) => user_from_bearer(token).ok_or_else(|| {
                BddError::Config("wrong bearer, cannot extract username from it".into())
            })?,
            None => props
                .get_string("username")
                .map_err(|_| BddError::Config("cannot find username property".into()))?,
        };

        let tmp_root_dir = props
            .get_string("tmp_root_dir")
            .unwrap_or_else(|_| "bddtests".into());

        match &bearer {
            Some(_) => info!("using bearer, username from token = '{user_name}'"),
            None => info!("no bearer, username property = '{user_name}'"),
        }

        Ok(Self::from_parts(
            environment_name,
            &host,
            &user_name,
            bearer,
            &tmp_root_dir,
        ))
    }

    /// Builds the per-service URL table from the already-resolved pieces.
    pub fn from_parts(
        env_name: &str,
        host: &str,
        user_name: &str,
        bearer: Option<String>,
        tmp_root_dir: &str,
    ) -> Self {
        let service_urls = MicroService::ALL
            .into_iter()
            .map(|ms| {
                let url = if bearer.is_some() {
                    format!("{host}{}", ms.gateway_path())
                } else {
                    format!("{host}:{}", ms.port())
                };
                (ms, url)
            })
            .collect();
        Self {
            env_name: env_name.to_string(),
            host: host.to_string(),
            user_name: user_name.to_string(),
            bearer,
            tmp_root_dir: tmp_root_dir.to_string(),
            service_urls,
        }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Root directory name under which scenario temp dirs are created.
    pub fn tmp_root_dir(&self) -> &str {
        &self.tmp_root_dir
    }

    pub fn service_url(&self, ms: MicroService) -> &str {
        &self.service_urls[&ms]
    }

    /// WebSocket endpoint of a notification channel.
    pub fn notification_url(&self, ms: MicroService) -> String {
        let http_url = self.service_url(ms);
        let ws_url = if let Some(rest) = http_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = http_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{http_url}")
        };
        format!("{ws_url}/notify")
    }
}

/// Extracts the `sub` claim from an (unverified) JWT.
fn user_from_bearer(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::decode_config(payload, base64::URL_SAFE_NO_PAD).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("sub")?.as_str().map(str::to_owned)
}
