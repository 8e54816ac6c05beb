use anyhow::Result;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub sweep: SweepConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: std::env::var("DATABASE_HOST")?,
            port: std::env::var("DATABASE_PORT")?.parse()?,
            username: std::env::var("DATABASE_USERNAME")?,
            password: std::env::var("DATABASE_PASSWORD")?,
            database: std::env::var("DATABASE_NAME")?,
        };
        let redis = RedisConfig {
            host: std::env::var("REDIS_HOST")?,
            port: std::env::var("REDIS_PORT")?.parse()?,
        };
        let sweep = SweepConfig {
            interval_secs: std::env::var("EXPIRATION_SWEEP_INTERVAL_SECS")
                .ok()
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(60),
        };
        Ok(Self {
            database,
            redis,
            sweep,
        })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the reservation no-show sweep loop.
pub struct SweepConfig {
    pub interval_secs: u64,
}
