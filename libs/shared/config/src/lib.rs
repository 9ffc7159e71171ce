use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub port: u16,
    pub notification_poll_interval_secs: u64,
    pub notification_digest_enabled: bool,
    pub clinic_utc_offset_minutes: i32,
    pub strict_status_transitions: bool,
    pub history_completion_policy: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            redis_url: None,
            port: 3000,
            notification_poll_interval_secs: 30,
            notification_digest_enabled: false,
            clinic_utc_offset_minutes: 0,
            strict_status_transitions: true,
            history_completion_policy: "always".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
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
            port: parse_var("PORT", defaults.port),
            notification_poll_interval_secs: parse_var(
                "NOTIFICATION_POLL_INTERVAL_SECS",
                defaults.notification_poll_interval_secs,
            ),
            notification_digest_enabled: parse_var(
                "NOTIFICATION_DIGEST_ENABLED",
                defaults.notification_digest_enabled,
            ),
            clinic_utc_offset_minutes: parse_var(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            strict_status_transitions: parse_var(
                "STRICT_STATUS_TRANSITIONS",
                defaults.strict_status_transitions,
            ),
            history_completion_policy: env::var("HISTORY_COMPLETION_POLICY")
                .unwrap_or(defaults.history_completion_policy),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - appointments will be kept in memory");
        }
        if config.redis_url.is_none() {
            warn!("REDIS_URL not set - notification read-state will be kept in memory");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
