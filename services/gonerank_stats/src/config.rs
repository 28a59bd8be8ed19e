use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphqlConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Bearer token sent with every request, for the admin mutations.
    pub auth_token: Option<String>,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/graphql".to_string(),
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; Gonerank/1.0)".to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 4000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub graphql: GraphqlConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Apply overrides from any variable lookup. Unparseable values keep the default.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("GRAPHQL_ENDPOINT") {
            config.graphql.endpoint = endpoint;
        }
        if let Some(timeout) = lookup("GRAPHQL_TIMEOUT_SECS").and_then(|t| t.parse::<u64>().ok()) {
            config.graphql.request_timeout_secs = timeout;
        }
        if let Some(user_agent) = lookup("GRAPHQL_USER_AGENT") {
            config.graphql.user_agent = user_agent;
        }
        if let Some(token) = lookup("GRAPHQL_AUTH_TOKEN").filter(|t| !t.is_empty()) {
            config.graphql.auth_token = Some(token);
        }
        if let Some(host) = lookup("SERVER_HOST").and_then(|h| h.parse::<IpAddr>().ok()) {
            config.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            config.server.port = port;
        }

        config
    }
}
