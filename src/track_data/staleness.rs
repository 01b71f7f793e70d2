use serde::{Deserialize, Serialize};

use super::{ArtifactStore, ArtifactStoreError};

/// Outcome of a staleness check for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessCheck {
    /// Whether the artifact exists at all.
    pub exists: bool,
    /// Whether the source audio has been modified since the artifact was
    /// written. Always false when the artifact does not exist; absence is a
    /// distinct "must generate" case handled by the caller.
    pub needs_regeneration: bool,
}

/// Compare storage timestamps of an audio file and its derived artifact.
///
/// Metadata-only: runs once per track on every visit, so it never downloads
/// content. When the audio's metadata is unavailable there is nothing to
/// compare against, and the verdict is conservatively fresh.
pub fn check_stale(
    store: &ArtifactStore,
    artifact_key: &str,
    audio_key: Option<&str>,
) -> Result<StalenessCheck, ArtifactStoreError> {
    let Some(artifact_meta) = store.metadata(artifact_key)? else {
        return Ok(StalenessCheck {
            exists: false,
            needs_regeneration: false,
        });
    };

    let mut needs_regeneration = false;
    if let Some(audio_key) = audio_key
        && let Some(audio_meta) = store.metadata(audio_key)?
    {
        needs_regeneration = audio_meta.updated > artifact_meta.updated;
    }

    Ok(StalenessCheck {
        exists: true,
        needs_regeneration,
    })
}
