use serde::{Deserialize, Serialize};

use crate::models::RepoScope;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    /// sqlx URL for the session database.
    #[serde(default = "default_session_db")]
    pub session_db: String,
}

fn default_session_db() -> String { "sqlite://sessions.db".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self { Self { base_url: default_base_url() } }
}

fn default_base_url() -> String { "http://localhost:3001".to_string() }

/// The repository this deployment manages. Workflows are always scoped to a
/// single installation/repository pair, sent as headers on every API request.
/// Both ids are required; a missing or non-numeric value fails config parsing
/// before the server starts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct DemoConfig {
    pub installation_id: u64,
    pub repository_id: u64,
}

impl DemoConfig {
    pub fn scope(&self) -> RepoScope {
        RepoScope { installation_id: self.installation_id, repository_id: self.repository_id }
    }
}
