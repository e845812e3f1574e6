//! Recording persistence
//!
//! The finished WAV is written to disk before any network call, so a failed
//! transcription always leaves audio that `quickscribe transcribe <file>`
//! can retry. Naming follows the configured policy: one overwritten file, or
//! one timestamp-suffixed file per session.

use crate::config::{Config, FileHandling, RecordingsConfig};
use crate::wav;
use chrono::Local;
use std::path::PathBuf;

const OVERWRITE_NAME: &str = "recording.wav";

/// Writes finished recordings to the configured location
pub struct RecordingStore {
    dir: PathBuf,
    file_handling: FileHandling,
}

impl RecordingStore {
    pub fn new(config: &RecordingsConfig) -> Self {
        let dir = match config.location.as_str() {
            "app-data" => Config::data_dir().join("recordings"),
            "alongside" => std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("recordings"),
            custom => PathBuf::from(custom),
        };

        Self {
            dir,
            file_handling: config.file_handling,
        }
    }

    /// Directory recordings are written to
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Persist samples as a WAV file, returning the written path
    pub fn persist(&self, samples: &[f32], sample_rate: u32) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let filename = match self.file_handling {
            FileHandling::Overwrite => OVERWRITE_NAME.to_string(),
            FileHandling::Timestamp => {
                format!("recording_{}.wav", Local::now().format("%Y%m%d_%H%M%S"))
            }
        };

        let path = self.dir.join(filename);
        let bytes = wav::encode_wav(samples, sample_rate)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(&path, bytes)?;

        tracing::debug!("Recording saved to {:?}", path);
        Ok(path)
    }

    /// Most recently written recording, if any
    pub fn latest(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.dir).ok()?;

        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().map(|ext| ext == "wav").unwrap_or(false)
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("recording"))
                        .unwrap_or(false)
            })
            .max_by_key(|p| {
                p.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::UNIX_EPOCH)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path, handling: FileHandling) -> RecordingStore {
        RecordingStore::new(&RecordingsConfig {
            location: dir.to_string_lossy().to_string(),
            file_handling: handling,
        })
    }

    #[test]
    fn test_overwrite_reuses_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), FileHandling::Overwrite);

        let first = store.persist(&[0.1; 1600], 16000).unwrap();
        let second = store.persist(&[0.2; 1600], 16000).unwrap();
        assert_eq!(first, second);

        let wavs: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(wavs.len(), 1);
    }

    #[test]
    fn test_timestamp_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), FileHandling::Timestamp);

        let path = store.persist(&[0.1; 1600], 16000).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("recording_"));
        assert!(path.exists());
    }

    #[test]
    fn test_latest_finds_written_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), FileHandling::Overwrite);

        assert!(store.latest().is_none());

        let path = store.persist(&[0.1; 1600], 16000).unwrap();
        assert_eq!(store.latest(), Some(path));
    }
}
