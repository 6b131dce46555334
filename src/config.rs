//! Process configuration read from the environment

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Chat like friends about any topic. Keep it casual, light, sometimes funny. Stay safe and respectful.";
pub const DEFAULT_TURN_LIMIT_MINUTES: u32 = 10;
pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub ollama_host: String,
    pub system_prompt: String,
    pub default_turn_limit_minutes: u32,
    pub port: u16,
    pub log_level: String,
}

/// Values a start request falls back to when it omits them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationDefaults {
    pub system_prompt: String,
    pub turn_limit_minutes: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            ollama_host: non_blank("OLLAMA_HOST")
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            system_prompt: non_blank("SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            default_turn_limit_minutes: non_blank("DEFAULT_TURN_LIMIT_MINUTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_TURN_LIMIT_MINUTES),
            port: non_blank("AUTOPILOT_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            log_level: non_blank("LOG_LEVEL")
                .map_or_else(|| DEFAULT_LOG_LEVEL.to_string(), |v| v.trim().to_lowercase()),
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!("autopilot_chat={},tower_http=info", self.log_level)
    }

    pub fn conversation_defaults(&self) -> ConversationDefaults {
        ConversationDefaults {
            system_prompt: self.system_prompt.clone(),
            turn_limit_minutes: self.default_turn_limit_minutes,
        }
    }
}
