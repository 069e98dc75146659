use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use atelier_core::Locale;
use atelier_llm::{
    AspectRatio, DEFAULT_CHAT_MODEL, DEFAULT_ENDPOINT, DEFAULT_IMAGE_MODEL, DEFAULT_PROVIDER_ID,
    ImageSize, ProviderConfig,
};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

pub const SETTINGS_DIRECTORY_NAME: &str = "atelier";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "ATELIER_";
/// Bare key variables, lowest precedence first.
pub const API_KEY_VARIABLES: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_grounding_enabled")]
    pub grounding_enabled: bool,
    #[serde(default)]
    pub image_size: ImageSize,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub locale: Locale,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            chat_model: default_chat_model(),
            image_model: default_image_model(),
            grounding_enabled: default_grounding_enabled(),
            image_size: ImageSize::default(),
            aspect_ratio: AspectRatio::default(),
            locale: Locale::default(),
        }
    }
}

impl ProviderSettings {
    pub fn to_provider_config(&self) -> Option<ProviderConfig> {
        if !self.is_valid() {
            return None;
        }

        Some(
            ProviderConfig::new(&self.provider_id, &self.api_key)
                .with_endpoint(&self.endpoint)
                .with_chat_model(&self.chat_model)
                .with_image_model(&self.image_model)
                .with_grounding(self.grounding_enabled)
                .with_image_size(self.image_size),
        )
    }

    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = or_default(self.provider_id, default_provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = or_default(self.endpoint, default_endpoint);
        self.chat_model = or_default(self.chat_model, default_chat_model);
        self.image_model = or_default(self.image_model, default_image_model);
        self
    }
}

/// Live settings shared by the shell.
///
/// Changes made through `update` stay in memory; the file on disk is only read.
pub struct SettingsStore {
    settings: Arc<ArcSwap<ProviderSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".atelier"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_layers(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ProviderSettings> {
        self.settings.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update(&self, settings: ProviderSettings) {
        self.settings.store(Arc::new(settings.normalized()));
    }

    /// Layers, lowest precedence first: defaults, the file, the bare key
    /// variables, then `ATELIER_*`.
    fn figment(file: Option<&Path>, prefixed: bool) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ProviderSettings::default()));
        if let Some(path) = file {
            figment = figment.merge(Json::file(path));
        }
        for variable in API_KEY_VARIABLES {
            figment = figment.merge(Env::raw().only(&[variable]).map(|_| "api_key".into()));
        }
        if prefixed {
            figment = figment.merge(Env::prefixed(ENV_PREFIX));
        }
        figment
    }

    /// Extracts the full layer stack; a layer that fails to parse is dropped
    /// and the remaining layers are tried again.
    fn load_layers(path: &Path) -> ProviderSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults and environment", path);
        }

        let attempts = [
            ("file and environment", Self::figment(Some(path), true)),
            ("environment", Self::figment(None, true)),
            ("file and key variables", Self::figment(Some(path), false)),
            ("key variables", Self::figment(None, false)),
        ];
        for (layers, figment) in attempts {
            match figment.extract::<ProviderSettings>() {
                Ok(settings) => return settings.normalized(),
                Err(error) => {
                    tracing::warn!(
                        "failed to parse settings from {} ({:?}): {}",
                        layers,
                        path,
                        error
                    );
                }
            }
        }

        tracing::warn!("no settings layer parsed, using defaults");
        ProviderSettings::default()
    }
}

fn or_default(value: String, default: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_string()
    }
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_grounding_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn file_values_override_defaults_and_are_normalized() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{
                    "api_key": "  secret  ",
                    "chat_model": "   ",
                    "image_size": "2K",
                    "aspect_ratio": "16:9",
                    "locale": "zh"
                }"#,
            )?;

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.api_key, "secret");
            assert_eq!(settings.chat_model, DEFAULT_CHAT_MODEL);
            assert_eq!(settings.image_size, ImageSize::TwoK);
            assert_eq!(settings.aspect_ratio, AspectRatio::Landscape);
            assert_eq!(settings.locale, Locale::Zh);
            assert!(settings.grounding_enabled);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(SETTINGS_FILE_NAME, r#"{ "api_key": "from-file" }"#)?;
            jail.set_env("GEMINI_API_KEY", "from-gemini-variable");
            jail.set_env("ATELIER_GROUNDING_ENABLED", "false");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.api_key, "from-gemini-variable");
            assert!(!settings.grounding_enabled);
            Ok(())
        });
    }

    #[test]
    fn prefixed_key_wins_over_bare_variables() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("API_KEY", "bare");
            jail.set_env("ATELIER_API_KEY", "prefixed");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(store.settings().api_key, "prefixed");
            Ok(())
        });
    }

    #[test]
    fn missing_file_and_key_yield_no_provider_config() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));

            assert_eq!(*store.settings(), ProviderSettings::default());
            assert_eq!(store.settings().to_provider_config(), None);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_skipped_but_environment_is_kept() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "aspect_ratio": "2:1", "api_key": "from-file" }"#,
            )?;
            jail.set_env("GEMINI_API_KEY", "from-environment");
            jail.set_env("ATELIER_LOCALE", "zh");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.aspect_ratio, AspectRatio::Square);
            assert_eq!(settings.api_key, "from-environment");
            assert_eq!(settings.locale, Locale::Zh);
            assert!(settings.to_provider_config().is_some());
            Ok(())
        });
    }

    #[test]
    fn bad_prefixed_variable_keeps_file_and_key() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(SETTINGS_FILE_NAME, r#"{ "aspect_ratio": "9:16" }"#)?;
            jail.set_env("GEMINI_API_KEY", "from-environment");
            jail.set_env("ATELIER_IMAGE_SIZE", "8K");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.aspect_ratio, AspectRatio::Portrait);
            assert_eq!(settings.image_size, ImageSize::OneK);
            assert_eq!(settings.api_key, "from-environment");
            Ok(())
        });
    }

    #[test]
    fn option_names_are_case_insensitive() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "api_key": "key", "image_size": "2k", "locale": "ZH" }"#,
            )?;

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.image_size, ImageSize::TwoK);
            assert_eq!(settings.locale, Locale::Zh);
            assert_eq!(settings.api_key, "key");
            Ok(())
        });
    }

    #[test]
    fn provider_config_carries_every_option() {
        let settings = ProviderSettings {
            api_key: "key".to_string(),
            endpoint: "https://proxy.example/v1beta/".to_string(),
            grounding_enabled: false,
            image_size: ImageSize::FourK,
            ..ProviderSettings::default()
        };

        let config = settings.to_provider_config().expect("key is set");
        assert_eq!(config.endpoint, "https://proxy.example/v1beta");
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert!(!config.grounding_enabled);
        assert_eq!(config.image_size, ImageSize::FourK);
    }

    #[test]
    fn update_swaps_settings_in_memory() {
        let store = SettingsStore::new(PathBuf::from("/nonexistent/atelier/settings.json"));
        let mut settings = (*store.settings()).clone();
        settings.locale = Locale::Zh;
        settings.image_model = String::new();

        store.update(settings);

        assert_eq!(store.settings().locale, Locale::Zh);
        assert_eq!(store.settings().image_model, DEFAULT_IMAGE_MODEL);
        assert!(!store.config_path().exists());
    }
}
