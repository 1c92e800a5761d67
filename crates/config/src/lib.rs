use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Reads a secret either from the file named by `{name}_FILE` or from `{name}` directly.
fn secret_from_env(name: &str) -> Option<String> {
    let file_var = format!("{name}_FILE");
    if let Ok(path) = std::env::var(&file_var) {
        let value = std::fs::read_to_string(&path)
            .map(|p| p.trim().to_string())
            .unwrap_or_else(|e| panic!("Failed to read {} at {}: {}", file_var, path, e));
        return Some(value);
    }
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Which record store backs the subscription core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Sheets,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Sheets => "sheets",
            StorageBackend::Memory => "memory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "sql" => Some(StorageBackend::Postgres),
            "sheets" | "spreadsheet" | "googlesheet" => Some(StorageBackend::Sheets),
            "memory" | "mock" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let raw = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".to_string());
        Self {
            backend: StorageBackend::parse(&raw)
                .unwrap_or_else(|| panic!("Unsupported STORAGE_BACKEND: {}", raw)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    pub tls_enabled: bool,
    pub tls_ca_cert_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("DATABASE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "clients".to_string()),
            username: std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: secret_from_env("DATABASE_PASSWORD")
                .unwrap_or_else(|| "postgres".to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
            tls_enabled: std::env::var("DATABASE_TLS_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            tls_ca_cert_path: std::env::var("DATABASE_TLS_CA_CERT_PATH").ok(),
        }
    }
}

/// Google Sheets (values API) backend configuration
#[derive(Clone, Deserialize)]
pub struct SheetsConfig {
    pub api_base_url: Url,
    pub spreadsheet_id: String,
    /// Service-account key JSON as issued by the cloud console; tokens are minted from it
    pub service_account_key: Option<String>,
    /// Pre-issued bearer token, used as-is when no service-account key is set
    pub access_token: Option<String>,
    pub timeout_secs: u64,
    pub clients_sheet: String,
    pub burned_sheet: String,
    pub operations_sheet: String,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("clients_sheet", &self.clients_sheet)
            .field("burned_sheet", &self.burned_sheet)
            .field("operations_sheet", &self.operations_sheet)
            .finish()
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        let raw = std::env::var("SHEETS_API_BASE_URL")
            .unwrap_or_else(|_| "https://sheets.googleapis.com".to_string());
        Self {
            api_base_url: Url::parse(&raw).expect("SHEETS_API_BASE_URL must be a valid URL"),
            spreadsheet_id: std::env::var("SHEETS_SPREADSHEET_ID").unwrap_or_default(),
            service_account_key: secret_from_env("SHEETS_SERVICE_ACCOUNT_KEY"),
            access_token: secret_from_env("SHEETS_ACCESS_TOKEN"),
            timeout_secs: std::env::var("SHEETS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            clients_sheet: std::env::var("SHEETS_CLIENTS_SHEET")
                .unwrap_or_else(|_| "clients".to_string()),
            burned_sheet: std::env::var("SHEETS_BURNED_SHEET")
                .unwrap_or_else(|_| "burned_tokens".to_string()),
            operations_sheet: std::env::var("SHEETS_OPERATIONS_SHEET")
                .unwrap_or_else(|_| "operations_log".to_string()),
        }
    }
}

impl SheetsConfig {
    /// Returns true if both the spreadsheet and the credentials are set
    pub fn is_configured(&self) -> bool {
        !self.spreadsheet_id.is_empty()
            && (self.service_account_key.is_some() || self.access_token.is_some())
    }
}

/// Where expiration notices are delivered (chat bot HTTP API)
#[derive(Clone, Deserialize)]
pub struct NotifierConfig {
    pub api_base_url: Url,
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        let raw = std::env::var("NOTIFY_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string());
        Self {
            api_base_url: Url::parse(&raw).expect("NOTIFY_API_BASE_URL must be a valid URL"),
            bot_token: secret_from_env("NOTIFY_BOT_TOKEN"),
            // 0 is treated the same as unset
            chat_id: std::env::var("NOTIFY_CHAT_ID")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|id: &i64| *id != 0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AdminConfig {
    /// Bearer token required on admin routes. `None` leaves the routes open.
    pub api_token: Option<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_token: secret_from_env("ADMIN_API_TOKEN"),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoggingConfig {
    /// Global log level for the application.
    ///
    /// Valid values: "error", "warn", "info", "debug", "trace".
    /// Default: "info" (from LOG_LEVEL env var or fallback).
    pub level: String,
    /// Log output format.
    ///
    /// Valid values: "pretty", "json".
    pub format: String,
    /// Per-module log levels.
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();

        if let Ok(level) = std::env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = std::env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = std::env::var("LOG_MODULE_DATABASE") {
            modules.insert("database".to_string(), level);
        }

        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        }
    }
}

impl LoggingConfig {
    /// Builds an `EnvFilter`-compatible directive string, e.g. `info,services=debug`
    pub fn filter_directive(&self) -> String {
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        std::iter::once(self.level.clone())
            .chain(modules.into_iter().map(|(m, l)| format!("{m}={l}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub sheets: SheetsConfig,
    pub notifier: NotifierConfig,
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            sheets: SheetsConfig::default(),
            notifier: NotifierConfig::default(),
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_storage_backend_parsing() {
        std::env::set_var("STORAGE_BACKEND", "Sheets");
        assert_eq!(StorageConfig::default().backend, StorageBackend::Sheets);
        std::env::set_var("STORAGE_BACKEND", "mock");
        assert_eq!(StorageConfig::default().backend, StorageBackend::Memory);
        std::env::remove_var("STORAGE_BACKEND");
        assert_eq!(StorageConfig::default().backend, StorageBackend::Postgres);
    }

    #[test]
    #[serial]
    #[should_panic(expected = "Unsupported STORAGE_BACKEND: mongo")]
    fn test_storage_backend_unknown_panics() {
        std::env::set_var("STORAGE_BACKEND", "mongo");
        let result = std::panic::catch_unwind(StorageConfig::default);
        std::env::remove_var("STORAGE_BACKEND");
        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    #[serial]
    fn test_notifier_zero_chat_id_is_unset() {
        std::env::set_var("NOTIFY_BOT_TOKEN", "123:abc");
        std::env::set_var("NOTIFY_CHAT_ID", "0");
        let config = NotifierConfig::default();
        assert_eq!(config.chat_id, None);

        std::env::set_var("NOTIFY_CHAT_ID", "-100200300");
        let config = NotifierConfig::default();
        assert_eq!(config.chat_id, Some(-100200300));
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));

        std::env::remove_var("NOTIFY_BOT_TOKEN");
        std::env::remove_var("NOTIFY_CHAT_ID");
    }

    #[test]
    #[serial]
    fn test_secret_read_from_file() {
        let path = std::env::temp_dir().join("admin_api_token_test");
        std::fs::write(&path, "  file-secret\n").expect("write secret file");
        std::env::set_var("ADMIN_API_TOKEN_FILE", &path);
        std::env::set_var("ADMIN_API_TOKEN", "env-secret");

        let config = AdminConfig::default();
        assert_eq!(config.api_token.as_deref(), Some("file-secret"));

        std::env::remove_var("ADMIN_API_TOKEN_FILE");
        std::env::remove_var("ADMIN_API_TOKEN");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    #[serial]
    fn test_blank_secret_is_none() {
        std::env::remove_var("ADMIN_API_TOKEN_FILE");
        std::env::set_var("ADMIN_API_TOKEN", "   ");
        assert!(AdminConfig::default().api_token.is_none());
        std::env::remove_var("ADMIN_API_TOKEN");
    }

    #[test]
    #[serial]
    fn test_sheets_debug_redacts_token() {
        std::env::remove_var("SHEETS_SERVICE_ACCOUNT_KEY");
        std::env::remove_var("SHEETS_SERVICE_ACCOUNT_KEY_FILE");
        std::env::set_var("SHEETS_ACCESS_TOKEN", "ya29.super-secret");
        std::env::set_var("SHEETS_SPREADSHEET_ID", "sheet-id");
        let config = SheetsConfig::default();
        assert!(config.is_configured());
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("sheet-id"));
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("REDACTED"));
        std::env::remove_var("SHEETS_ACCESS_TOKEN");
        std::env::remove_var("SHEETS_SPREADSHEET_ID");
    }

    #[test]
    #[serial]
    fn test_sheets_service_account_key_from_file() {
        let path = std::env::temp_dir().join("sheets_service_account_test.json");
        std::fs::write(&path, r#"{"client_email":"bot@example.iam.gserviceaccount.com"}"#)
            .expect("write key file");
        std::env::remove_var("SHEETS_ACCESS_TOKEN");
        std::env::set_var("SHEETS_SERVICE_ACCOUNT_KEY_FILE", &path);
        std::env::set_var("SHEETS_SPREADSHEET_ID", "sheet-id");

        let config = SheetsConfig::default();
        assert!(config.is_configured());
        assert!(config.access_token.is_none());
        assert!(config
            .service_account_key
            .as_deref()
            .is_some_and(|k| k.contains("client_email")));
        assert!(!format!("{:?}", config).contains("gserviceaccount"));

        std::env::remove_var("SHEETS_SERVICE_ACCOUNT_KEY_FILE");
        std::env::set_var("SHEETS_SPREADSHEET_ID", "");
        let config = SheetsConfig::default();
        assert!(!config.is_configured());

        std::env::remove_var("SHEETS_SPREADSHEET_ID");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_logging_filter_directive() {
        let mut modules = HashMap::new();
        modules.insert("services".to_string(), "debug".to_string());
        modules.insert("api".to_string(), "trace".to_string());
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "json".to_string(),
            modules,
        };
        assert_eq!(config.filter_directive(), "warn,api=trace,services=debug");
    }
}
