pub mod state;

pub use state::{ENV_PREFIX, SettingsError, SettingsStore, WidgetSettings};
