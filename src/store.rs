/// Append-only store for annotated result images.
///
/// Artifact ids are derived from the millisecond timestamp of creation. Two
/// artifacts stored within the same millisecond collide; the second write
/// fails with `AlreadyExists` instead of overwriting the first. This is an
/// accepted limitation, ids are not deduplicated.
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::errors::{ClickSightError, ClickSightResult};

const ID_PREFIX: &str = "click_result_";
const ID_SUFFIX: &str = ".png";

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactMeta {
    pub id: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub download_url: String,
}

impl ArtifactMeta {
    fn new(id: String, size: u64, created: DateTime<Utc>) -> Self {
        let download_url = format!("/download_result/{id}");
        Self {
            id,
            size,
            created,
            download_url,
        }
    }
}

pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub async fn open(dir: impl Into<PathBuf>) -> ClickSightResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(path = %dir.display(), "result store ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn store(&self, png: &[u8]) -> ClickSightResult<ArtifactMeta> {
        self.store_at(png, Utc::now()).await
    }

    pub(crate) async fn store_at(
        &self,
        png: &[u8],
        at: DateTime<Utc>,
    ) -> ClickSightResult<ArtifactMeta> {
        let id = format!("{ID_PREFIX}{}{ID_SUFFIX}", at.timestamp_millis());
        let path = self.dir.join(&id);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(png).await?;
        file.flush().await?;
        tracing::debug!(id = %id, size = png.len(), "artifact stored");
        Ok(ArtifactMeta::new(id, png.len() as u64, at))
    }

    pub async fn get(&self, id: &str) -> ClickSightResult<Vec<u8>> {
        if !is_valid_id(id) {
            return Err(ClickSightError::ArtifactNotFound(id.to_string()));
        }
        match tokio::fs::read(self.dir.join(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ClickSightError::ArtifactNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All stored artifacts, most recent first.
    pub async fn list(&self) -> ClickSightResult<Vec<ArtifactMeta>> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            if !id.ends_with(ID_SUFFIX) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let created = created_from_id(&id)
                .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
                .unwrap_or_else(Utc::now);
            out.push(ArtifactMeta::new(id, meta.len(), created));
        }
        out.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }
}

fn created_from_id(id: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = id
        .strip_prefix(ID_PREFIX)?
        .strip_suffix(ID_SUFFIX)?
        .parse()
        .ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Ids are plain file names inside the store; anything that could escape the
/// directory is treated as unknown.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
