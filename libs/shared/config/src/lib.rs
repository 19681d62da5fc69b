use std::env;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub available_slots_cache_ttl_secs: u64,
    pub entity_cache_ttl_secs: u64,
    pub appointment_list_cache_ttl_secs: u64,
    pub queue_submit_timeout_secs: Option<u64>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            redis_url: None,
            available_slots_cache_ttl_secs: 300,
            entity_cache_ttl_secs: 300,
            appointment_list_cache_ttl_secs: 600,
            queue_submit_timeout_secs: None,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using in-memory store");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            available_slots_cache_ttl_secs: parse_env(
                "AVAILABLE_SLOTS_CACHE_TTL_SECS",
                defaults.available_slots_cache_ttl_secs,
            ),
            entity_cache_ttl_secs: parse_env("ENTITY_CACHE_TTL_SECS", defaults.entity_cache_ttl_secs),
            appointment_list_cache_ttl_secs: parse_env(
                "APPOINTMENT_LIST_CACHE_TTL_SECS",
                defaults.appointment_list_cache_ttl_secs,
            ),
            queue_submit_timeout_secs: env::var("QUEUE_SUBMIT_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok()),
            port: parse_env("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn available_slots_ttl(&self) -> Duration {
        Duration::from_secs(self.available_slots_cache_ttl_secs)
    }

    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_cache_ttl_secs)
    }

    pub fn appointment_list_ttl(&self) -> Duration {
        Duration::from_secs(self.appointment_list_cache_ttl_secs)
    }

    pub fn queue_submit_timeout(&self) -> Option<Duration> {
        self.queue_submit_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
