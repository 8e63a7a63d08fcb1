use std::env;
use secrecy::SecretString;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    /// Public root of the site, e.g. `https://lms.example.org`.
    pub site_root: String,
    pub session_secret: SecretString,
    pub session_ttl_minutes: i64,
    /// 0 disables the limit.
    pub max_concurrent_sessions: u32,
    pub webservices_enabled: bool,
    pub webservice_token: SecretString,
    pub launch_token_ttl_secs: i64,
    pub monitor_token_ttl_secs: i64,
    pub redirect_delay_secs: u32,
    pub trust_forwarded_for: bool,
    pub exam_server_timeout_secs: u64,
    pub exam_server_config_timeout_secs: u64,
    pub exam_server_accept_invalid_certs: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            _ => StorageBackend::Mongo,
        };

        Self {
            storage_backend,
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "sebgate-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env_parsed("WEB_SERVER_PORT", 8080),
            site_root: env::var("SITE_ROOT")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://localhost:8080".to_string()),
            session_secret: SecretString::from(env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "dev_secret_key_change_in_production".to_string())),
            session_ttl_minutes: env_parsed("SESSION_TTL_MINUTES", 120),
            max_concurrent_sessions: env_parsed("MAX_CONCURRENT_SESSIONS", 0),
            webservices_enabled: env_flag("WEBSERVICES_ENABLED", true),
            webservice_token: SecretString::from(env::var("WEBSERVICE_TOKEN")
                .unwrap_or_else(|_| "webservice_token".to_string())),
            launch_token_ttl_secs: env_parsed("LAUNCH_TOKEN_TTL_SECS", 900),
            monitor_token_ttl_secs: env_parsed("MONITOR_TOKEN_TTL_SECS", 60),
            redirect_delay_secs: env_parsed("REDIRECT_DELAY_SECS", 5),
            trust_forwarded_for: env_flag("TRUST_FORWARDED_FOR", false),
            exam_server_timeout_secs: env_parsed("EXAM_SERVER_TIMEOUT_SECS", 30),
            exam_server_config_timeout_secs: env_parsed("EXAM_SERVER_CONFIG_TIMEOUT_SECS", 60),
            exam_server_accept_invalid_certs: env_flag("EXAM_SERVER_ACCEPT_INVALID_CERTS", false),
        }
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let session_secret = self.session_secret.expose_secret();
        let ws_token = self.webservice_token.expose_secret();

        if session_secret == "dev_secret_key_change_in_production" {
            panic!(
                "FATAL: SESSION_SECRET is using default value! Set SESSION_SECRET environment variable to a secure random string."
            );
        }

        if session_secret.len() < 32 {
            panic!(
                "FATAL: SESSION_SECRET is too short ({}). Must be at least 32 characters for security.",
                session_secret.len()
            );
        }

        if ws_token == "webservice_token" {
            panic!(
                "FATAL: WEBSERVICE_TOKEN is using default value! Set WEBSERVICE_TOKEN environment variable."
            );
        }

        if !self.site_root.starts_with("https://") {
            panic!("FATAL: SITE_ROOT must be an https:// URL, got '{}'.", self.site_root);
        }

        // The listener itself speaks plain HTTP.
        if !self.trust_forwarded_for {
            log::warn!(
                "TRUST_FORWARDED_FOR is off: without a TLS-terminating proxy every token redemption will be refused"
            );
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "sebgate-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            site_root: "https://lms.example.org".to_string(),
            session_secret: SecretString::from("test_session_secret_key".to_string()),
            session_ttl_minutes: 60,
            max_concurrent_sessions: 0,
            webservices_enabled: true,
            webservice_token: SecretString::from("test-ws-token".to_string()),
            launch_token_ttl_secs: 900,
            monitor_token_ttl_secs: 60,
            redirect_delay_secs: 5,
            trust_forwarded_for: false,
            exam_server_timeout_secs: 30,
            exam_server_config_timeout_secs: 60,
            exam_server_accept_invalid_certs: false,
        }
    }
}
