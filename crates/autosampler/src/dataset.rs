//! Corpus scanning and dataset assembly
//!
//! A corpus is a directory tree of drum one-shots. Scanning collects
//! candidate files by extension; assembly decodes and featurizes each one,
//! turning per-file failures into typed skips instead of aborting the run.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use walkdir::WalkDir;

use crate::audio;
use crate::error::SamplerResult;
use crate::features::{flatten_grid, FeatureExtractor};

/// Extensions accepted as corpus material
const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// One training example
#[derive(Debug, Clone)]
pub struct DatasetItem {
    /// Flattened normalized log-mel grid, length `n_mels * time_steps`
    pub feature: Array1<f32>,
    /// `[pitch, variation]` condition vector
    pub condition: [f32; 2],
}

/// An in-memory training dataset with stable index order
#[derive(Debug, Default)]
pub struct Dataset {
    items: Vec<DatasetItem>,
}

impl Dataset {
    /// Build a dataset from already-featurized items
    pub fn from_items(items: Vec<DatasetItem>) -> Self {
        Self { items }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dataset holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in assembly order
    pub fn items(&self) -> &[DatasetItem] {
        &self.items
    }
}

/// A corpus file excluded from the dataset, with the reason
#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// Path of the excluded file
    pub path: PathBuf,
    /// Why it was excluded
    pub reason: String,
}

/// Collect candidate audio files under a directory, sorted by path
///
/// Walks the tree recursively and keeps regular files whose extension
/// matches a known audio format, case-insensitively. Sorting keeps
/// dataset order independent of filesystem enumeration order.
pub fn scan_corpus(dir: &Path) -> SamplerResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Featurize candidate files into a dataset, collecting per-file skips
///
/// A file that fails to decode or featurize never aborts the batch; it
/// comes back as a [`SkippedFile`] for the caller to report.
pub fn build_dataset(
    paths: &[PathBuf],
    extractor: &FeatureExtractor,
) -> (Dataset, Vec<SkippedFile>) {
    let mut items = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        match audio::load_waveform(path, extractor.config()) {
            Ok(waveform) => {
                let grid = extractor.spectrogram(&waveform);
                let condition = extractor.condition(&waveform);
                items.push(DatasetItem {
                    feature: flatten_grid(&grid),
                    condition,
                });
            }
            Err(e) => skipped.push(SkippedFile {
                path: path.clone(),
                reason: e.to_string(),
            }),
        }
    }
    (Dataset { items }, skipped)
}
