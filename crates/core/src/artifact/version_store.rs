use snafu::ensure;

use crate::error::{NoBaseArtifactSnafu, OutOfRangeSnafu, SuiteResult};

use super::content::Artifact;

/// Ordered version history of one editable artifact.
///
/// Versions form a single line, not a tree: committing from an older version
/// drops every version after it, like writing after an undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactVersionStore {
    versions: Vec<Artifact>,
    active_index: usize,
}

/// Read-only view of the store for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub current: Artifact,
    pub active_index: usize,
    pub total: usize,
}

impl ArtifactVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole history with a single fresh artifact.
    pub fn load(&mut self, artifact: Artifact) {
        self.versions.clear();
        self.versions.push(artifact);
        self.active_index = 0;
    }

    /// Moves the cursor to an existing version.
    pub fn select(&mut self, index: usize) -> SuiteResult<()> {
        ensure!(
            index < self.versions.len(),
            OutOfRangeSnafu {
                stage: "select-version",
                index,
                len: self.versions.len(),
            }
        );

        self.active_index = index;
        Ok(())
    }

    /// Appends an edit result after the active version, discarding forward versions.
    pub fn commit(&mut self, artifact: Artifact) -> SuiteResult<usize> {
        ensure!(
            !self.versions.is_empty(),
            NoBaseArtifactSnafu {
                stage: "commit-version",
            }
        );

        let discarded = self.versions.len() - (self.active_index + 1);
        self.versions.truncate(self.active_index + 1);
        self.versions.push(artifact);
        self.active_index = self.versions.len() - 1;

        if discarded > 0 {
            tracing::debug!(
                discarded,
                active_index = self.active_index,
                "committed over older version; forward history dropped"
            );
        }

        Ok(self.active_index)
    }

    pub fn clear(&mut self) {
        self.versions.clear();
        self.active_index = 0;
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.versions.get(self.active_index)
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn versions(&self) -> &[Artifact] {
        &self.versions
    }

    pub fn snapshot(&self) -> Option<HistorySnapshot> {
        self.current().map(|current| HistorySnapshot {
            current: current.clone(),
            active_index: self.active_index,
            total: self.versions.len(),
        })
    }
}
