use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub revocation_backend: RevocationBackend,
    pub upload_dir: String,
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let jwt_ttl_secs = env::var("JWT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(3600);
        let revocation_backend = match env::var("REVOCATION_BACKEND") {
            Ok(value) => parse_revocation_backend(&value)?,
            Err(_) => RevocationBackend::Postgres,
        };
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"));

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            jwt_ttl_secs,
            revocation_backend,
            upload_dir,
            public_base_url,
        })
    }
}

fn parse_revocation_backend(value: &str) -> anyhow::Result<RevocationBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(RevocationBackend::Postgres),
        "memory" => Ok(RevocationBackend::Memory),
        other => Err(anyhow::anyhow!("unknown REVOCATION_BACKEND: {other}")),
    }
}
