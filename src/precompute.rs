//! Offline batch precompute: walk a directory tree and generate track-data
//! artifacts (and running order documents) next to the audio files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::audio_files;
use crate::generate::{TrackDataGenerator, TrackSource};
use crate::running_order::{RUNNING_ORDER_FILE, RunningOrder};
use crate::track_data::{DEFAULT_SCALE, TRACK_DATA_SUFFIX, TrackData};

/// Options for one precompute run.
#[derive(Debug, Clone)]
pub struct PrecomputeOptions {
    /// Directory tree to walk.
    pub input: PathBuf,
    /// Samples per peak window for generated artifacts.
    pub scale: u32,
    /// Regenerate artifacts and running orders that already exist.
    pub overwrite: bool,
    /// Write a running order document per folder.
    pub running_order: bool,
}

impl PrecomputeOptions {
    /// Options for an input directory with the default scale, no overwrite,
    /// and running order documents enabled.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            scale: DEFAULT_SCALE,
            overwrite: false,
            running_order: true,
        }
    }
}

/// Counts from one precompute run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrecomputeSummary {
    /// Folders that contained audio files.
    pub folders: usize,
    /// Artifacts generated.
    pub generated: usize,
    /// Artifacts skipped because they already existed.
    pub skipped: usize,
    /// Files whose generation or write failed.
    pub failed: usize,
    /// Running order documents written.
    pub running_orders_written: usize,
}

/// Errors that abort a whole precompute run.
///
/// Per-file failures never land here; they are logged, counted, and the run
/// continues with the remaining files.
#[derive(Debug, Error)]
pub enum PrecomputeError {
    /// The input path is not a directory.
    #[error("Input path is not a directory: {0}")]
    InvalidRoot(PathBuf),
    /// The input root could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One folder containing audio files.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AudioFolder {
    dir: PathBuf,
    files: Vec<String>,
}

/// Walk the tree and generate artifacts for every audio file found.
pub fn run(
    options: &PrecomputeOptions,
    generator: &dyn TrackDataGenerator,
) -> Result<PrecomputeSummary, PrecomputeError> {
    if !options.input.is_dir() {
        return Err(PrecomputeError::InvalidRoot(options.input.clone()));
    }

    let folders = discover_audio_folders(&options.input)?;
    let mut summary = PrecomputeSummary {
        folders: folders.len(),
        ..PrecomputeSummary::default()
    };
    if folders.is_empty() {
        info!("No audio files found");
        return Ok(summary);
    }
    info!(folders = folders.len(), "Found folders with audio files");

    for folder in folders {
        info!(dir = %folder.dir.display(), "Processing folder");
        let mut sorted = folder.files.clone();
        sort_track_names(&mut sorted);

        for name in &sorted {
            let file_path = folder.dir.join(name);
            let artifact_path = artifact_path_for(&file_path);
            if !options.overwrite && artifact_path.exists() {
                info!(artifact = %artifact_path.display(), "Skipping existing artifact");
                summary.skipped += 1;
                continue;
            }

            info!(artifact = %artifact_path.display(), "Generating artifact");
            let source = TrackSource::LocalFile(file_path.clone());
            match generator.generate(&source, options.scale, &mut |_| {}) {
                Ok(data) => match write_artifact(&artifact_path, &data) {
                    Ok(()) => summary.generated += 1,
                    Err(err) => {
                        warn!(
                            artifact = %artifact_path.display(),
                            error = %err,
                            "Failed to write artifact"
                        );
                        summary.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(
                        file = %file_path.display(),
                        error = %err,
                        "Failed to generate track data"
                    );
                    summary.failed += 1;
                }
            }
        }

        if options.running_order {
            let order_path = folder.dir.join(RUNNING_ORDER_FILE);
            if !options.overwrite && order_path.exists() {
                info!(path = %order_path.display(), "Skipping existing running order");
            } else {
                let order = RunningOrder {
                    playlist: sorted.clone(),
                };
                match write_json(&order_path, &order) {
                    Ok(()) => {
                        info!(path = %order_path.display(), "Wrote running order");
                        summary.running_orders_written += 1;
                    }
                    Err(err) => {
                        warn!(
                            path = %order_path.display(),
                            error = %err,
                            "Failed to write running order"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
    }

    Ok(summary)
}

/// Sort track names the way they appear in the player: case-insensitive,
/// with a byte-order tiebreak to keep the result total and deterministic.
pub fn sort_track_names(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

/// Artifact path next to an audio file.
pub fn artifact_path_for(audio_path: &Path) -> PathBuf {
    let mut name = audio_path.as_os_str().to_os_string();
    name.push(TRACK_DATA_SUFFIX);
    PathBuf::from(name)
}

fn discover_audio_folders(root: &Path) -> Result<Vec<AudioFolder>, PrecomputeError> {
    let mut folders = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if dir != root => {
                warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Failed to read directory during walk"
                );
                continue;
            }
            Err(source) => {
                return Err(PrecomputeError::Io { path: dir, source });
            }
        };

        let mut files = Vec::new();
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read directory entry during walk"
                    );
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to read file type during walk"
                    );
                    continue;
                }
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if file_type.is_file()
                && audio_files::is_supported_audio(&path)
                && let Ok(name) = entry.file_name().into_string()
            {
                files.push(name);
            }
        }

        if !files.is_empty() {
            folders.push(AudioFolder { dir, files });
        }
    }
    folders.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(folders)
}

fn write_artifact(path: &Path, data: &TrackData) -> Result<(), std::io::Error> {
    write_json(path, data)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), std::io::Error> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    fs::write(path, bytes)
}
