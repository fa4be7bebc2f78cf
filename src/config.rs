use std::path::Path;
use std::time::Duration;

use axum::http::HeaderValue;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    pub token_ttl_secs: u64,
    pub token_bytes: usize,
    pub cookie_secure: bool,
    /// Additionally require the header token to equal the `XSRF-TOKEN` /
    /// `CSRF-TOKEN` cookie. The header is always required.
    pub double_submit_cookie: bool,
    pub exempt_paths: Vec<String>,
    /// 0 disables the background sweep; expiry is still enforced lazily.
    pub sweep_interval_secs: u64,
}

impl CsrfConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SanitizerConfig {
    pub max_field_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub frame_options: String,
    pub referrer_policy: String,
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    pub csp: String,
}

impl SecurityConfig {
    pub fn hsts_value(&self) -> String {
        let mut value = format!("max-age={}", self.hsts_max_age);
        if self.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.hsts_preload {
            value.push_str("; preload");
        }
        value
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub jwt: JwtConfig,
    pub csrf: CsrfConfig,
    pub sanitizer: SanitizerConfig,
    pub users: UsersConfig,
    pub security: SecurityConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");
const DEFAULT_JWT_SECRET: &str = "change-me-in-production";
/// Upper bound for `csrf.token_ttl_secs`: one day.
pub const MAX_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: companyguard.toml (in CWD)
        .add_source(::config::File::with_name("companyguard").required(false));

    if let Ok(custom_path) = std::env::var("COMPANYGUARD_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("COMPANYGUARD")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors.allowed_origins")
            .with_list_parse_key("csrf.exempt_paths"),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_body_bytes == 0 {
        return Err(anyhow::anyhow!("server.max_body_bytes must be > 0"));
    }

    // CORS
    for origin in &cfg.cors.allowed_origins {
        if origin.trim().is_empty() || HeaderValue::from_str(origin).is_err() {
            return Err(anyhow::anyhow!("invalid cors.allowed_origins entry: {:?}", origin));
        }
    }

    // JWT
    if cfg.jwt.secret.is_empty() {
        return Err(anyhow::anyhow!("jwt.secret must not be empty"));
    }
    if cfg.jwt.secret == DEFAULT_JWT_SECRET {
        tracing::warn!("jwt.secret uses the built-in default; set COMPANYGUARD__JWT__SECRET in production");
    }

    // CSRF
    if !(1..=MAX_TOKEN_TTL_SECS).contains(&cfg.csrf.token_ttl_secs) {
        return Err(anyhow::anyhow!("csrf.token_ttl_secs must be in 1..={}", MAX_TOKEN_TTL_SECS));
    }
    if cfg.csrf.token_bytes < 16 {
        return Err(anyhow::anyhow!("csrf.token_bytes must be >= 16 (128 bits)"));
    }
    if let Some(bad) = cfg.csrf.exempt_paths.iter().find(|p| !p.starts_with('/')) {
        return Err(anyhow::anyhow!("csrf.exempt_paths entries must start with '/': {:?}", bad));
    }
    if !cfg.csrf.cookie_secure && !cfg!(debug_assertions) {
        tracing::warn!("csrf.cookie_secure is false in a release build");
    }

    // Sanitizer
    if cfg.sanitizer.max_field_len == 0 {
        return Err(anyhow::anyhow!("sanitizer.max_field_len must be > 0"));
    }

    // Users
    if !(4..=31).contains(&cfg.users.bcrypt_cost) {
        return Err(anyhow::anyhow!("users.bcrypt_cost must be in 4..=31"));
    }

    // Security headers must be representable as header values
    for (name, value) in [
        ("security.frame_options", cfg.security.frame_options.as_str()),
        ("security.referrer_policy", cfg.security.referrer_policy.as_str()),
        ("security.csp", cfg.security.csp.as_str()),
    ] {
        if HeaderValue::from_str(value).is_err() {
            return Err(anyhow::anyhow!("{} is not a valid header value", name));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8091);
        assert_eq!(config.database.url, "sqlite://data/companyguard.db");
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.csrf.token_ttl_secs, 1800);
        assert!(!config.csrf.double_submit_cookie);
        assert!(!config.csrf.cookie_secure);
        assert!(config.csrf.is_exempt("/api/csrf/token"));
        assert!(config.csrf.is_exempt("/api/auth/login"));
        assert!(!config.csrf.is_exempt("/api/users"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_hsts_value() {
        let config = AppConfig::default();
        assert_eq!(config.security.hsts_value(), "max-age=31536000; includeSubDomains; preload");

        let mut sec = config.security.clone();
        sec.hsts_include_subdomains = false;
        sec.hsts_preload = false;
        assert_eq!(sec.hsts_value(), "max-age=31536000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.csrf.token_bytes = 8;
        assert!(validate(&cfg).unwrap_err().to_string().contains("token_bytes"));

        let mut cfg = AppConfig::default();
        cfg.csrf.token_ttl_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.csrf.token_ttl_secs = 20_000_000_000_000;
        assert!(validate(&cfg).unwrap_err().to_string().contains("token_ttl_secs"));
        cfg.csrf.token_ttl_secs = MAX_TOKEN_TTL_SECS;
        assert!(validate(&cfg).is_ok());

        let mut cfg = AppConfig::default();
        cfg.csrf.exempt_paths = vec!["api/csrf".into()];
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.jwt.secret.clear();
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.cors.allowed_origins = vec!["http://bad\norigin".into()];
        assert!(validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.users.bcrypt_cost = 2;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_server_port() {
        env::set_var("COMPANYGUARD__SERVER__PORT", "0");
        let result = load();
        env::remove_var("COMPANYGUARD__SERVER__PORT");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid server.port"));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("COMPANYGUARD__SERVER__PORT", "3001");
        env::set_var("COMPANYGUARD__CSRF__COOKIE_SECURE", "true");
        env::set_var("COMPANYGUARD__CORS__ALLOWED_ORIGINS", "https://app.example.com,https://admin.example.com");

        let result = load();

        env::remove_var("COMPANYGUARD__SERVER__PORT");
        env::remove_var("COMPANYGUARD__CSRF__COOKIE_SECURE");
        env::remove_var("COMPANYGUARD__CORS__ALLOWED_ORIGINS");

        let config = result.unwrap();
        assert_eq!(config.server.port, 3001);
        assert!(config.csrf.cookie_secure);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://app.example.com".to_string(), "https://admin.example.com".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[csrf]
token_ttl_secs = 600
exempt_paths = ["/api/csrf/", "/api/auth/", "/hooks/"]
"#,
        )
        .unwrap();

        env::set_var("COMPANYGUARD_CONFIG", path.to_str().unwrap());
        let result = load();
        env::remove_var("COMPANYGUARD_CONFIG");

        let config = result.unwrap();
        assert_eq!(config.csrf.token_ttl_secs, 600);
        assert!(config.csrf.is_exempt("/hooks/github"));
        // untouched sections keep their embedded defaults
        assert_eq!(config.server.port, 8091);
    }

    #[test]
    fn test_ensure_sqlite_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("app.db");
        let url = format!("sqlite://{}", db.display());
        ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());
        assert!(ensure_sqlite_parent_dir("sqlite::memory:").is_ok());
    }
}
