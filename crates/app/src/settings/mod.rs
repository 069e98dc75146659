pub mod state;

pub use state::{ProviderSettings, SettingsStore};
