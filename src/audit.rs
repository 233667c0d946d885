use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::errors::{ClickSightError, ClickSightResult};
use crate::executor::input::ClickResult;
use crate::perception::resolver::ResolutionStep;

/// One line of the resolution journal.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub ts: i64,
    pub request_id: String,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<[f64; 2]>,
    pub steps: Vec<ResolutionStep>,
    pub screen_point: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

/// Append-only JSONL record of every resolution, for after-the-fact misclick
/// analysis.
pub struct ResolutionJournal {
    file_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ResolutionJournal {
    pub fn new(dir: &Path) -> Self {
        Self {
            file_path: dir.join("resolutions.jsonl"),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// The file write runs on the blocking pool; concurrent appends are
    /// serialized so lines never interleave.
    pub async fn append(&self, entry: &JournalEntry) -> ClickSightResult<()> {
        let line = serde_json::to_string(entry)?;
        let path = self.file_path.clone();
        let lock = self.write_lock.clone();
        tokio::task::spawn_blocking(move || -> ClickSightResult<()> {
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            writeln!(file, "{}", line)?;
            Ok(())
        })
        .await
        .map_err(|e| ClickSightError::Io(std::io::Error::other(e)))??;
        tracing::debug!(
            path = %self.file_path.display(),
            request_id = %entry.request_id,
            "journal entry appended"
        );
        Ok(())
    }

    /// Never fails the caller; a lost journal line is only logged.
    pub async fn record(&self, entry: &JournalEntry) {
        if let Err(e) = self.append(entry).await {
            tracing::warn!(error = %e, request_id = %entry.request_id, "journal append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> JournalEntry {
        JournalEntry {
            ts: 1,
            request_id: id.into(),
            route: "/find_click_position".into(),
            query: Some("OK button".into()),
            normalized: Some([0.25, 0.25]),
            steps: vec![
                ResolutionStep::Projected {
                    image_width: 3840,
                    image_height: 2160,
                    point: [960.0, 540.0],
                },
                ResolutionStep::DensityCorrected {
                    factor: 0.5,
                    point: [480.0, 270.0],
                },
            ],
            screen_point: [480.0, 270.0],
            click: None,
            click_error: None,
            artifact_id: Some("click_result_1.png".into()),
        }
    }

    #[tokio::test]
    async fn entries_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = ResolutionJournal::new(dir.path());
        journal.append(&entry("a")).await.unwrap();
        journal.append(&entry("b")).await.unwrap();

        let text = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["request_id"], "a");
        assert_eq!(lines[1]["request_id"], "b");
        assert_eq!(lines[0]["steps"][1]["step"], "density_corrected");
        assert_eq!(lines[0]["steps"][1]["factor"], 0.5);
        assert!(lines[0].get("click").is_none());
    }

    #[tokio::test]
    async fn record_swallows_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        let journal = ResolutionJournal::new(&dir.path().join("missing").join("dir"));
        journal.record(&entry("lost")).await;
        assert!(!journal.path().exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_keep_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(ResolutionJournal::new(dir.path()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let journal = journal.clone();
            handles.push(tokio::spawn(async move {
                journal.append(&entry(&format!("req-{i}"))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let text = std::fs::read_to_string(journal.path()).unwrap();
        let mut ids: Vec<String> = text
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["request_id"].as_str().unwrap().to_string()
            })
            .collect();
        ids.sort();
        assert_eq!(ids.len(), 16);
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }
}
