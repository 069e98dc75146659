use std::sync::Arc;

use atelier_llm::{AspectRatio, EditRequest, GenerativeProvider, ImageRequest};
use snafu::ensure;

use crate::error::{EmptyInputSnafu, NoBaseArtifactSnafu, Operation, SuiteError, SuiteResult};

use super::content::Artifact;
use super::version_store::{ArtifactVersionStore, HistorySnapshot};

/// Text-to-image mode: each successful call replaces the shown image.
pub struct ImageGenerator {
    provider: Arc<dyn GenerativeProvider>,
    store: ArtifactVersionStore,
    aspect_ratio: AspectRatio,
}

impl ImageGenerator {
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            provider,
            store: ArtifactVersionStore::new(),
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Generates an image with the selected aspect ratio.
    ///
    /// On failure the previously generated image stays in place.
    pub async fn generate(&mut self, prompt: &str) -> SuiteResult<&Artifact> {
        let prompt = prompt.trim();
        ensure!(
            !prompt.is_empty(),
            EmptyInputSnafu {
                stage: "generate-image",
                operation: Operation::GenerateImage,
            }
        );

        let request = ImageRequest::new(prompt, self.aspect_ratio);
        let payload = self
            .provider
            .generate_image(request)
            .await
            .map_err(|error| {
                tracing::warn!(error = %error, "image generation failed");
                SuiteError::from_provider("generate-image", Operation::GenerateImage, error)
            })?;

        let artifact = Artifact::from(payload);
        tracing::info!(
            content_type = %artifact.content_type(),
            bytes = artifact.bytes().len(),
            "image generated"
        );
        self.store.load(artifact);
        self.current().ok_or_else(|| SuiteError::NoImageProduced {
            stage: "generate-image",
            operation: Operation::GenerateImage,
        })
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.store.current()
    }

    /// Hands the current image over, e.g. to seed an editor.
    pub fn take(&mut self) -> Option<Artifact> {
        let artifact = self.store.current().cloned();
        self.store.clear();
        artifact
    }
}

/// Iterative editing mode over a branch-truncating version history.
pub struct ImageEditor {
    provider: Arc<dyn GenerativeProvider>,
    store: ArtifactVersionStore,
}

impl ImageEditor {
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            provider,
            store: ArtifactVersionStore::new(),
        }
    }

    /// Starts a new history from an uploaded image.
    pub fn load(&mut self, artifact: Artifact) {
        tracing::info!(
            content_type = %artifact.content_type(),
            aspect_ratio = %artifact.aspect_ratio(),
            "editor history started"
        );
        self.store.load(artifact);
    }

    pub fn select(&mut self, index: usize) -> SuiteResult<()> {
        self.store.select(index)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Applies `prompt` to the active version and commits the result.
    ///
    /// The request keeps the base image's aspect ratio. Versions and the active
    /// index are untouched unless the provider returns an image.
    pub async fn edit(&mut self, prompt: &str) -> SuiteResult<HistorySnapshot> {
        let prompt = prompt.trim();
        ensure!(
            !prompt.is_empty(),
            EmptyInputSnafu {
                stage: "edit-image",
                operation: Operation::EditImage,
            }
        );

        let Some(base) = self.store.current() else {
            return NoBaseArtifactSnafu {
                stage: "edit-image",
            }
            .fail();
        };

        let request = EditRequest::new(prompt, base.to_payload(), base.aspect_ratio());
        let payload = self.provider.edit_image(request).await.map_err(|error| {
            tracing::warn!(
                error = %error,
                active_index = self.store.active_index(),
                "image edit failed; history unchanged"
            );
            SuiteError::from_provider("edit-image", Operation::EditImage, error)
        })?;

        let index = self.store.commit(Artifact::from(payload))?;
        tracing::info!(index, total = self.store.len(), "edit committed");

        self.history().ok_or_else(|| SuiteError::NoBaseArtifact {
            stage: "edit-image",
        })
    }

    pub fn history(&self) -> Option<HistorySnapshot> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &ArtifactVersionStore {
        &self.store
    }
}
