/// Image payloads and their derived shape.
pub mod content;
/// Linear version history with branch truncation.
pub mod version_store;
/// Text-to-image and image-editing flows built on the version store.
pub mod workflow;

pub use content::Artifact;
pub use version_store::{ArtifactVersionStore, HistorySnapshot};
pub use workflow::{ImageEditor, ImageGenerator};
