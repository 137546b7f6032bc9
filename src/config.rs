use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base directory for firmware binaries.
    pub firmware_dir: String,
    /// Root secret; token, grant, and sealing keys are derived from it.
    pub secret_key: String,
    /// Static token for the admin surface. Admin routes refuse to serve
    /// until this is configured.
    pub admin_token: Option<String>,
    pub token_ttl_days: i64,
    /// Extra days past token expiry during which refresh still succeeds.
    pub grace_days: i64,
    /// Lifetime of a signed download grant, in seconds.
    pub download_ttl_secs: i64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub dev_mode: bool,
}

const DEV_SECRET: &str = "insecure-dev-secret";

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("GATEHOUSE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "gatehouse.db".to_string()),
            firmware_dir: env::var("FIRMWARE_DIR").unwrap_or_else(|_| "firmware".to_string()),
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| DEV_SECRET.to_string()),
            admin_token: env::var("ADMIN_TOKEN").ok(),
            token_ttl_days: env_i64("TOKEN_TTL_DAYS", 7),
            grace_days: env_i64("GRACE_DAYS", 7),
            download_ttl_secs: env_i64("DOWNLOAD_TTL_SECS", 600),
            rate_limit_per_second: env_i64("RATE_LIMIT_PER_SECOND", 2) as u64,
            rate_limit_burst: env_i64("RATE_LIMIT_BURST", 10) as u32,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn secret_key_is_default(&self) -> bool {
        self.secret_key == DEV_SECRET
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
