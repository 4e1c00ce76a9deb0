use std::{collections::HashMap, fs, path::Path, str::FromStr, sync::Arc, time::Duration};

use wordgen::{
    GeneratorError, HttpGeneratorConfig, HttpWordGenerator, WordSupplier, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};

use crate::{GameLimits, DEFAULT_MAX_TURN_SECS};

/// Process settings shared by the server and the command-line tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub wordgen_api_key: Option<String>,
    pub wordgen_model: String,
    pub wordgen_base_url: String,
    pub wordgen_timeout_secs: u64,
    pub session_idle_secs: u64,
    pub reap_interval_secs: u64,
    pub max_turn_secs: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3001".into(),
            wordgen_api_key: None,
            wordgen_model: DEFAULT_MODEL.into(),
            wordgen_base_url: DEFAULT_BASE_URL.into(),
            wordgen_timeout_secs: 15,
            session_idle_secs: 2 * 60 * 60,
            reap_interval_secs: 60,
            max_turn_secs: DEFAULT_MAX_TURN_SECS,
        }
    }
}

impl Settings {
    pub fn game_limits(&self) -> GameLimits {
        GameLimits {
            max_turn_secs: self.max_turn_secs,
        }
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }

    /// Without an API key every board is drawn from the built-in pool.
    pub fn word_supplier(&self) -> Result<WordSupplier, GeneratorError> {
        let Some(api_key) = self.wordgen_api_key.as_deref().filter(|key| !key.is_empty()) else {
            return Ok(WordSupplier::fallback_only());
        };
        let config = HttpGeneratorConfig {
            api_key: api_key.to_string(),
            model: self.wordgen_model.clone(),
            base_url: self.wordgen_base_url.clone(),
            timeout: Duration::from_secs(self.wordgen_timeout_secs),
        };
        let generator = HttpWordGenerator::new(config)?;
        Ok(WordSupplier::with_generator(Arc::new(generator)))
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then the optional TOML file, then environment variables. Values that
/// fail to parse keep whatever the earlier layer set.
pub fn load_settings_from(file: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("wordgen_api_key") {
                settings.wordgen_api_key = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("wordgen_model") {
                settings.wordgen_model = v.clone();
            }
            if let Some(v) = file_cfg.get("wordgen_base_url") {
                settings.wordgen_base_url = v.clone();
            }
            set_parsed(
                &mut settings.wordgen_timeout_secs,
                file_cfg.get("wordgen_timeout_secs"),
            );
            set_parsed(&mut settings.session_idle_secs, file_cfg.get("session_idle_secs"));
            set_parsed(&mut settings.reap_interval_secs, file_cfg.get("reap_interval_secs"));
            set_parsed(&mut settings.max_turn_secs, file_cfg.get("max_turn_secs"));
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("WORDGEN_API_KEY") {
        settings.wordgen_api_key = Some(v);
    }
    if let Some(v) = env("APP__WORDGEN_API_KEY") {
        settings.wordgen_api_key = Some(v);
    }

    if let Some(v) = env("APP__WORDGEN_MODEL") {
        settings.wordgen_model = v;
    }
    if let Some(v) = env("APP__WORDGEN_BASE_URL") {
        settings.wordgen_base_url = v;
    }

    set_parsed(
        &mut settings.wordgen_timeout_secs,
        env("APP__WORDGEN_TIMEOUT_SECS").as_ref(),
    );
    set_parsed(&mut settings.session_idle_secs, env("APP__SESSION_IDLE_SECS").as_ref());
    set_parsed(&mut settings.reap_interval_secs, env("APP__REAP_INTERVAL_SECS").as_ref());
    set_parsed(&mut settings.max_turn_secs, env("APP__MAX_TURN_SECS").as_ref());

    settings
}

fn set_parsed<T: FromStr>(target: &mut T, raw: Option<&String>) {
    if let Some(parsed) = raw.and_then(|v| v.trim().parse::<T>().ok()) {
        *target = parsed;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
