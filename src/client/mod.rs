//! Thin REST wrappers, one per micro-service.
//!
//! All endpoints live under a `/v1/` prefix. Identity is the `userId`
//! header for calls the services attribute to a user; gateway auth (bearer)
//! is a default header on the shared HTTP client.

mod actions;
mod case;
mod config;
mod directory;
mod explore;
mod modification;
mod network_conversion;
mod study;

pub use actions::ActionsClient;
pub use case::CaseClient;
pub use config::ConfigClient;
pub use directory::{DirectoryClient, DirectoryElement};
pub use explore::ExploreClient;
pub use modification::ModificationClient;
pub use network_conversion::NetworkConversionClient;
pub use study::StudyClient;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::env::{EnvProperties, MicroService};
use crate::error::{BddError, Result};

pub(crate) const HEADER_USER_ID: &str = "userId";

pub(crate) fn api_url(service_url: &str, path: &str) -> String {
    format!("{service_url}/v1/{path}")
}

/// The full client set for one platform, sharing a connection pool.
#[derive(Debug, Clone)]
pub struct ServiceClients {
    pub directory: DirectoryClient,
    pub explore: ExploreClient,
    pub study: StudyClient,
    pub case: CaseClient,
    pub network_conversion: NetworkConversionClient,
    pub config: ConfigClient,
    pub actions: ActionsClient,
    pub modification: ModificationClient,
}

impl ServiceClients {
    pub fn new(env: &EnvProperties) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(bearer) = env.bearer() {
            let value = HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|e| BddError::Config(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            directory: DirectoryClient::new(http.clone(), env.service_url(MicroService::Directory)),
            explore: ExploreClient::new(http.clone(), env.service_url(MicroService::Explore)),
            study: StudyClient::new(http.clone(), env.service_url(MicroService::Study)),
            case: CaseClient::new(http.clone(), env.service_url(MicroService::Case)),
            network_conversion: NetworkConversionClient::new(
                http.clone(),
                env.service_url(MicroService::NetworkConversion),
            ),
            config: ConfigClient::new(http.clone(), env.service_url(MicroService::Config)),
            actions: ActionsClient::new(http.clone(), env.service_url(MicroService::Actions)),
            modification: ModificationClient::new(
                http,
                env.service_url(MicroService::NetworkModification),
            ),
        })
    }
}
