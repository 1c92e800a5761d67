use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::fs::File;
use std::io::BufReader;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Connection pool type alias
pub type DbPool = Pool;

/// Build the deadpool configuration from application settings
pub fn pool_config(config: &config::DatabaseConfig) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.database.clone());
    cfg.user = Some(config.username.clone());
    cfg.password = Some(config.password.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_connections as usize));
    cfg
}

/// Create a connection pool, with TLS when enabled in the configuration
pub async fn create_pool(config: &config::DatabaseConfig) -> anyhow::Result<DbPool> {
    info!(
        "Creating database pool for {}:{}/{} (max_connections={}, tls={})",
        config.host, config.port, config.database, config.max_connections, config.tls_enabled
    );

    let cfg = pool_config(config);
    let pool = if config.tls_enabled {
        create_pool_with_rustls(cfg, config.tls_ca_cert_path.as_deref())?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    // Fail fast on unreachable databases
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    client.simple_query("SELECT 1").await?;
    debug!("Database connection verified");

    Ok(pool)
}

/// Create pool using rustls with either custom certificate or platform verifier
pub fn create_pool_with_rustls(cfg: Config, cert_path: Option<&str>) -> anyhow::Result<Pool> {
    use tokio_postgres_rustls::MakeRustlsConnect;

    // Install the default crypto provider (ring) if not already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    let client_config = match cert_path {
        Some(cert_path) => {
            info!("Using rustls with CA certificate from {}", cert_path);

            let cert_file = File::open(cert_path).map_err(|e| {
                anyhow::anyhow!("Failed to open certificate file {}: {}", cert_path, e)
            })?;
            let mut reader = BufReader::new(cert_file);
            let certs = rustls_pemfile::certs(&mut reader)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Failed to parse certificate: {}", e))?;

            if certs.is_empty() {
                return Err(anyhow::anyhow!("No certificates found in {}", cert_path));
            }
            debug!("Loaded {} certificate(s) from {}", certs.len(), cert_path);

            let mut root_store = rustls::RootCertStore::empty();
            for cert in certs {
                root_store.add(cert).map_err(|e| {
                    anyhow::anyhow!("Failed to add certificate to root store: {}", e)
                })?;
            }

            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        None => {
            info!("Using rustls with platform verifier (OS certificate store)");

            use rustls_platform_verifier::ConfigVerifierExt;
            rustls::ClientConfig::with_platform_verifier()
                .map_err(|e| anyhow::anyhow!("Failed to create platform verifier: {}", e))?
        }
    };

    let tls = MakeRustlsConnect::new(client_config);

    cfg.create_pool(Some(Runtime::Tokio1), tls)
        .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_config(tls_enabled: bool) -> config::DatabaseConfig {
        config::DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6432,
            database: "tokens".to_string(),
            username: "tokens_app".to_string(),
            password: "secret".to_string(),
            max_connections: 7,
            tls_enabled,
            tls_ca_cert_path: None,
        }
    }

    #[test]
    fn test_pool_config_maps_settings() {
        let cfg = pool_config(&database_config(false));
        assert_eq!(cfg.host.as_deref(), Some("db.internal"));
        assert_eq!(cfg.port, Some(6432));
        assert_eq!(cfg.dbname.as_deref(), Some("tokens"));
        assert_eq!(cfg.user.as_deref(), Some("tokens_app"));
        assert_eq!(cfg.pool.map(|p| p.max_size), Some(7));
    }

    #[test]
    fn test_missing_ca_file_is_an_error() {
        let cfg = pool_config(&database_config(true));
        let err = create_pool_with_rustls(cfg, Some("/nonexistent/ca.pem")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ca.pem"));
    }

    #[tokio::test]
    async fn test_platform_verifier_pool_builds_without_connecting() {
        let cfg = pool_config(&database_config(true));
        let pool = create_pool_with_rustls(cfg, None).unwrap();
        assert_eq!(pool.status().max_size, 7);
    }
}
