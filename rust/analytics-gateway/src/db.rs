//! PostgreSQL connection pool for the saved query store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tokio_postgres::{Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, info};

pub type PgPool = Pool<PgConnectionManager>;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_pool_size: u32,
    pub tls: Option<TlsFiles>,
}

/// PEM files for a rustls connection (`PGSSLROOTCERT`, `PGSSLCERT`, `PGSSLKEY`).
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub root_cert: PathBuf,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let manager = PgConnectionManager::new(config)?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .build(manager)
        .await
        .context("failed to build PostgreSQL connection pool")?;

    match pool.get().await {
        Ok(_) => info!("database connectivity check succeeded"),
        Err(err) => error!(error = ?err, "initial database connectivity check failed"),
    }

    Ok(pool)
}

#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
    tls: Option<MakeRustlsConnect>,
}

impl PgConnectionManager {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let pg = config
            .url
            .parse::<PgConfig>()
            .context("invalid database connection string")?;
        let tls = config.tls.as_ref().map(TlsFiles::connector).transpose()?;
        Ok(Self { config: pg, tls })
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = AsyncPgConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = match &self.tls {
            None => {
                let (client, connection) = self.config.connect(NoTls).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
            Some(connector) => {
                let (client, connection) = self.config.connect(connector.clone()).await?;
                AsyncPgConnection::try_from_client_and_connection(client, connection).await
            }
        };
        conn.map_err(|err| anyhow::anyhow!(err))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

impl TlsFiles {
    fn connector(&self) -> Result<MakeRustlsConnect> {
        let mut roots = RootCertStore::empty();
        for cert in read_certs(&self.root_cert, "PGSSLROOTCERT")? {
            roots
                .add(cert)
                .map_err(|_| anyhow::anyhow!("invalid certificate in PGSSLROOTCERT"))?;
        }

        let builder = ClientConfig::builder().with_root_certificates(roots);
        let client_config = match (&self.client_cert, &self.client_key) {
            (None, None) => builder.with_no_client_auth(),
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(read_certs(cert, "PGSSLCERT")?, read_key(key)?)
                .context("failed to build PostgreSQL client TLS config")?,
            _ => anyhow::bail!("PGSSLCERT and PGSSLKEY must both be set (or neither)"),
        };

        Ok(MakeRustlsConnect::new(client_config))
    }
}

fn open(path: &Path, label: &str) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {label} file '{}'", path.display()))?;
    Ok(BufReader::new(file))
}

fn read_certs(path: &Path, label: &str) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path, label)?;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse {label}"))?;

    if chain.is_empty() {
        anyhow::bail!("{label} contained no certificates");
    }
    Ok(chain)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open(path, "PGSSLKEY")?;
    rustls_pemfile::private_key(&mut reader)
        .context("failed to parse PGSSLKEY")?
        .context("PGSSLKEY contained no private keys")
}
