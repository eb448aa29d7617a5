use crate::{
    datamanager::DataManagerConfig,
    db::{DatabaseConfig, TlsFiles},
    filter::DEFAULT_MAX_DEPTH,
    llm::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL},
    query::source::LakeConfig,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub api_key: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub request_timeout: Duration,
    pub max_filter_depth: usize,
    pub lake: LakeConfig,
    pub data_manager: DataManagerConfig,
    pub openai: Option<OpenAiConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    gateway_listen_addr: Option<String>,
    #[serde(default)]
    gateway_listen_host: Option<String>,
    #[serde(default)]
    gateway_listen_port: Option<u16>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    gateway_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    postgres_user: Option<String>,
    #[serde(default)]
    postgres_password: Option<String>,
    #[serde(default)]
    postgres_host: Option<String>,
    #[serde(default)]
    postgres_port: Option<u16>,
    #[serde(default)]
    postgres_database: Option<String>,
    #[serde(default = "default_pool_size")]
    gateway_max_pool_size: u32,
    #[serde(default)]
    pgsslrootcert: Option<String>,
    #[serde(default)]
    pgsslcert: Option<String>,
    #[serde(default)]
    pgsslkey: Option<String>,
    #[serde(default)]
    gateway_api_key: Option<String>,
    #[serde(default)]
    gateway_allowed_origins: Option<String>,
    #[serde(default = "default_timeout_secs")]
    gateway_request_timeout_secs: u64,
    #[serde(default = "default_max_filter_depth")]
    gateway_max_filter_depth: usize,
    #[serde(default)]
    data_manager_query_endpoint: Option<String>,
    #[serde(default)]
    data_manager_table_endpoint: Option<String>,
    #[serde(default)]
    data_manager_execute_endpoint: Option<String>,
    #[serde(default)]
    bucket_name: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    openai_key: Option<String>,
    #[serde(default)]
    openai_api_key: Option<String>,
    #[serde(default)]
    openai_base_url: Option<String>,
    #[serde(default)]
    model_name: Option<String>,
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_filter_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    /// Resolves configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig = envy::from_iter(vars.into_iter().filter(|(_, v)| !v.is_empty()))
            .context("failed to parse gateway environment variables")?;

        let listen_addr = resolve_addr(
            raw.gateway_listen_addr,
            raw.gateway_listen_host,
            raw.gateway_listen_port.or(raw.port),
        )?;

        let database_url = match raw.gateway_database_url.or(raw.database_url) {
            Some(url) => url,
            None => compose_database_url(
                raw.postgres_host,
                raw.postgres_port,
                raw.postgres_user,
                raw.postgres_password,
                raw.postgres_database,
            )
            .context("GATEWAY_DATABASE_URL, DATABASE_URL or POSTGRES_HOST must be set")?,
        };

        let tls = raw.pgsslrootcert.map(|root| TlsFiles {
            root_cert: PathBuf::from(root),
            client_cert: raw.pgsslcert.map(PathBuf::from),
            client_key: raw.pgsslkey.map(PathBuf::from),
        });

        let request_timeout = Duration::from_secs(raw.gateway_request_timeout_secs.max(1));

        let data_manager = DataManagerConfig {
            query_endpoint: raw
                .data_manager_query_endpoint
                .context("DATA_MANAGER_QUERY_ENDPOINT must be set")?,
            table_endpoint: raw.data_manager_table_endpoint,
            execute_endpoint: raw.data_manager_execute_endpoint,
            timeout: request_timeout,
        };

        let lake = LakeConfig {
            bucket: raw.bucket_name.context("BUCKET_NAME must be set")?,
            customer_id: raw.customer_id.context("CUSTOMER_ID must be set")?,
        };

        let openai = raw
            .openai_key
            .or(raw.openai_api_key)
            .map(|api_key| OpenAiConfig {
                api_key,
                model: raw.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: raw
                    .openai_base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: request_timeout,
            });

        Ok(Self {
            listen_addr,
            database: DatabaseConfig {
                url: database_url,
                max_pool_size: raw.gateway_max_pool_size.max(1),
                tls,
            },
            api_key: raw.gateway_api_key,
            allowed_origins: raw.gateway_allowed_origins.and_then(|csv| parse_origins(&csv)),
            request_timeout,
            max_filter_depth: raw.gateway_max_filter_depth.max(1),
            lake,
            data_manager,
            openai,
        })
    }
}

fn parse_origins(csv: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = csv
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        None
    } else {
        Some(origins)
    }
}

/// Builds a libpq key/value connection string from discrete settings.
fn compose_database_url(
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
) -> Option<String> {
    let host = host?;
    let mut parts = vec![
        format!("host={}", quote_conninfo(&host)),
        format!("port={}", port.unwrap_or(5432)),
    ];
    if let Some(user) = user {
        parts.push(format!("user={}", quote_conninfo(&user)));
    }
    if let Some(password) = password {
        parts.push(format!("password={}", quote_conninfo(&password)));
    }
    if let Some(database) = database {
        parts.push(format!("dbname={}", quote_conninfo(&database)));
    }
    Some(parts.join(" "))
}

fn quote_conninfo(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid GATEWAY_LISTEN_ADDR value")?
            .next()
            .context("GATEWAY_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(3000);
    format!("{host}:{port}")
        .to_socket_addrs()
        .context("invalid gateway listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
