use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chatpane_client::{
    BackendConfig, DEFAULT_BASE_URL, DEFAULT_CHAT_PATH, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_DELETE_PATH, DEFAULT_UPLOAD_PATH,
};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::DEFAULT_PLACEHOLDER_TEXT;

pub const SETTINGS_DIRECTORY_NAME: &str = "chatpane";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Environment variables with this prefix override the settings file.
pub const ENV_PREFIX: &str = "CHATPANE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default = "default_delete_path")]
    pub delete_path: String,
    /// Value of the `stream` flag sent with chat requests.
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            upload_path: default_upload_path(),
            delete_path: default_delete_path(),
            stream: default_stream(),
            placeholder_text: default_placeholder_text(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl WidgetSettings {
    pub fn normalized(mut self) -> Self {
        let base_url = self.base_url.trim().trim_end_matches('/');
        self.base_url = if base_url.is_empty() {
            default_base_url()
        } else {
            base_url.to_string()
        };
        self.chat_path = normalize_path(&self.chat_path, DEFAULT_CHAT_PATH);
        self.upload_path = normalize_path(&self.upload_path, DEFAULT_UPLOAD_PATH);
        self.delete_path = normalize_path(&self.delete_path, DEFAULT_DELETE_PATH);
        if self.placeholder_text.trim().is_empty() {
            self.placeholder_text = default_placeholder_text();
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = default_connect_timeout_secs();
        }
        // Zero means "no timeout" rather than "fail immediately".
        self.request_timeout_secs = self.request_timeout_secs.filter(|secs| *secs > 0);
        self
    }

    pub fn to_backend_config(&self) -> BackendConfig {
        BackendConfig::new(&self.base_url)
            .with_paths(&self.chat_path, &self.upload_path, &self.delete_path)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_request_timeout(self.request_timeout_secs.map(Duration::from_secs))
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<WidgetSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatpane"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads defaults, then the JSON file, then `CHATPANE_*` variables.
    pub fn new(config_path: PathBuf) -> Self {
        let figment = Figment::from(Serialized::defaults(WidgetSettings::default()))
            .merge(Json::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(figment, config_path)
    }

    /// Loads defaults and the JSON file only.
    pub fn from_file(config_path: PathBuf) -> Self {
        let figment = Figment::from(Serialized::defaults(WidgetSettings::default()))
            .merge(Json::file(&config_path));
        Self::from_figment(figment, config_path)
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    fn from_figment(figment: Figment, config_path: PathBuf) -> Self {
        if !config_path.exists() {
            tracing::info!(path = ?config_path, "settings file not found, using defaults");
        }

        let settings = match figment.extract::<WidgetSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?config_path, error = %error, "failed to parse settings, using defaults");
                WidgetSettings::default()
            }
        };

        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<WidgetSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: WidgetSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn persist(&self, settings: &WidgetSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn normalize_path(path: &str, default: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        default.to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}

fn default_upload_path() -> String {
    DEFAULT_UPLOAD_PATH.to_string()
}

fn default_delete_path() -> String {
    DEFAULT_DELETE_PATH.to_string()
}

fn default_stream() -> bool {
    true
}

fn default_placeholder_text() -> String {
    DEFAULT_PLACEHOLDER_TEXT.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}
