use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// When unset the service runs on the in-process store.
    pub database_url: Option<String>,

    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub ai_timeout_secs: u64,

    pub refinement_workers: usize,
    pub refinement_queue: usize,

    pub history_stream_coalesce_ms: u64,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: None,
            openai_api_key: String::new(),
            openai_model: "gpt-4.1-mini".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            ai_timeout_secs: 30,
            refinement_workers: 4,
            refinement_queue: 64,
            history_stream_coalesce_ms: 1000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),

            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),

            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            ai_timeout_secs: env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .expect("AI_TIMEOUT_SECS must be a number"),

            refinement_workers: env::var("REFINEMENT_WORKERS")
                .unwrap_or_else(|_| "4".into())
                .parse::<usize>()
                .expect("REFINEMENT_WORKERS must be a number")
                .max(1),
            refinement_queue: env::var("REFINEMENT_QUEUE")
                .unwrap_or_else(|_| "64".into())
                .parse::<usize>()
                .expect("REFINEMENT_QUEUE must be a number")
                .max(1),

            history_stream_coalesce_ms: env::var("HISTORY_STREAM_COALESCE_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()
                .expect("HISTORY_STREAM_COALESCE_MS must be a number"),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|list| {
                    list.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ai_enabled(&self) -> bool {
        !self.openai_api_key.is_empty()
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn stream_coalesce_window(&self) -> Duration {
        Duration::from_millis(self.history_stream_coalesce_ms)
    }
}
