use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvigilSettings {
    pub api: ApiSettings,
    pub session: SessionSettings,
    pub proctoring: ProctoringSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Refresh proactively when the access token expires within this window
    pub proactive_refresh_window_seconds: i64,
    /// How long to wait after a cross-tab credential removal before
    /// treating it as a logout rather than a refresh race
    pub storage_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctoringSettings {
    /// Recovery window granted after a violation
    pub grace_period_seconds: u64,
    /// Tolerated violations before lockout becomes unconditional
    pub strike_budget: u8,
    /// Cadence of the periodic webcam identity check
    pub frame_interval_seconds: u64,
    /// Cadence of the optional audio-chunk capture
    pub audio_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            proactive_refresh_window_seconds: 60,
            storage_debounce_ms: 300,
        }
    }
}

impl Default for ProctoringSettings {
    fn default() -> Self {
        Self {
            grace_period_seconds: 5,
            strike_budget: 1,
            frame_interval_seconds: 10,
            audio_interval_seconds: 3,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl InvigilSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment initialization fails
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Initialize environment and logging
        Self::initialize_environment()?;

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Initialize environment variables and logging
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `INVIGIL_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        // 1. Start with default settings
        let mut settings = Self::default();

        // 2. Try to load from Settings.toml in current directory (lower priority)
        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            log::info!(
                "Loaded base settings from {}",
                default_config_path.display()
            );
        }

        // 3. If INVIGIL_SECRETS_DIR is set and contains Settings.toml, override with those settings
        if let Ok(secrets_dir) = std::env::var("INVIGIL_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                let secrets_settings: Self = basic_toml::from_str(&secrets_toml_content)?;

                log::info!("Overriding settings from {}", secrets_path.display());

                settings = secrets_settings;
            } else {
                log::info!(
                    "INVIGIL_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_api_env_overrides(&mut settings.api);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_proctoring_env_overrides(&mut settings.proctoring);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    /// Apply environment overrides for API settings
    fn apply_api_env_overrides(api_settings: &mut ApiSettings) {
        if let Ok(base_url) = std::env::var("API_BASE_URL") {
            api_settings.base_url = base_url;
        }
        Self::apply_numeric_env_override("API_TIMEOUT_SECONDS", &mut api_settings.timeout_seconds);
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(window_str) = std::env::var("PROACTIVE_REFRESH_WINDOW_SECONDS") {
            if let Ok(window) = window_str.parse::<i64>() {
                session_settings.proactive_refresh_window_seconds = window;
            }
        }
        Self::apply_numeric_env_override(
            "STORAGE_DEBOUNCE_MS",
            &mut session_settings.storage_debounce_ms,
        );
    }

    /// Apply environment overrides for proctoring settings
    pub fn apply_proctoring_env_overrides(proctoring_settings: &mut ProctoringSettings) {
        Self::apply_numeric_env_override(
            "GRACE_PERIOD_SECONDS",
            &mut proctoring_settings.grace_period_seconds,
        );
        if let Ok(budget_str) = std::env::var("STRIKE_BUDGET") {
            if let Ok(budget) = budget_str.parse::<u8>() {
                proctoring_settings.strike_budget = budget;
            }
        }
        Self::apply_numeric_env_override(
            "FRAME_INTERVAL_SECONDS",
            &mut proctoring_settings.frame_interval_seconds,
        );
        Self::apply_numeric_env_override(
            "AUDIO_INTERVAL_SECONDS",
            &mut proctoring_settings.audio_interval_seconds,
        );
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Apply environment overrides for logging settings
    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}
