//! # Filesystem Content Store
//!
//! Directory-backed [`ContentStore`].
//!
//! ```text
//! <source>/<cid>            objects available for retrieval
//! <root>/objects/<cid>      local copies
//! <root>/pins/<cid>         retention markers
//! ```
//!
//! Local copies are written to a uniquely named temporary file and renamed
//! into place, so concurrent fetches of one id leave a single complete object.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use shared_types::{ContentId, StoreError};
use tracing::{debug, info, warn};

use crate::ports::outbound::{ContentStore, OpenedContent};

const OBJECTS_DIR: &str = "objects";
const PINS_DIR: &str = "pins";

/// Filesystem-backed content store.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    source: PathBuf,
    root: PathBuf,
    min_disk_space_percent: u8,
}

impl FsContentStore {
    /// Open a store rooted at `root`, retrieving objects from `source`.
    ///
    /// Creates the local directory layout if it does not exist.
    pub async fn open_at(
        source: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        min_disk_space_percent: u8,
    ) -> Result<Self, StoreError> {
        let store = Self {
            source: source.into(),
            root: root.into(),
            min_disk_space_percent,
        };
        tokio::fs::create_dir_all(store.objects_dir()).await?;
        tokio::fs::create_dir_all(store.pins_dir()).await?;

        info!(
            "[storage] 📁 Content store at {} (source {})",
            store.root.display(),
            store.source.display()
        );
        Ok(store)
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    fn pins_dir(&self) -> PathBuf {
        self.root.join(PINS_DIR)
    }

    fn object_path(&self, content_id: &ContentId) -> PathBuf {
        self.objects_dir().join(content_id.as_str())
    }

    fn pin_path(&self, content_id: &ContentId) -> PathBuf {
        self.pins_dir().join(content_id.as_str())
    }

    /// Refuse writes when free space on the store's volume is below the minimum.
    pub fn check_disk_space(&self) -> Result<(), StoreError> {
        let available = fs2::available_space(&self.root)?;
        let total = fs2::total_space(&self.root)?;
        if total == 0 {
            return Ok(());
        }

        let available_percent = ((available as u128 * 100) / total as u128) as u8;
        if available_percent < self.min_disk_space_percent {
            return Err(StoreError::InsufficientSpace {
                available_percent,
                required_percent: self.min_disk_space_percent,
            });
        }
        Ok(())
    }

    async fn source_size(&self, content_id: &ContentId) -> Result<u64, StoreError> {
        match tokio::fs::metadata(self.source.join(content_id.as_str())).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(StoreError::NotFound(content_id.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(content_id.clone()))
            }
            Err(e) => Err(StoreError::Unreachable(format!("{}: {}", content_id, e))),
        }
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn fetch(&self, content_id: &ContentId) -> Result<u64, StoreError> {
        let destination = self.object_path(content_id);
        if let Ok(metadata) = tokio::fs::metadata(&destination).await {
            debug!(cid = %content_id, "[storage] Object already local");
            return Ok(metadata.len());
        }

        self.source_size(content_id).await?;
        self.check_disk_space()?;

        let temp = self
            .objects_dir()
            .join(format!(".{}.{}.tmp", content_id, uuid::Uuid::new_v4()));
        let copied = match tokio::fs::copy(self.source.join(content_id.as_str()), &temp).await {
            Ok(copied) => copied,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(StoreError::Unreachable(format!("{}: {}", content_id, e)));
            }
        };

        if let Err(e) = tokio::fs::rename(&temp, &destination).await {
            let _ = tokio::fs::remove_file(&temp).await;
            warn!(cid = %content_id, error = %e, "[storage] Failed to move object into place");
            return Err(e.into());
        }

        debug!(cid = %content_id, bytes = copied, "[storage] Object copied");
        Ok(copied)
    }

    async fn is_retained(&self, content_id: &ContentId) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.pin_path(content_id)).await?)
    }

    async fn retention_snapshot(&self) -> Result<HashSet<ContentId>, StoreError> {
        let mut retained = HashSet::new();
        let mut entries = tokio::fs::read_dir(self.pins_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().map(ContentId::new) {
                Some(Ok(content_id)) => {
                    retained.insert(content_id);
                }
                _ => debug!(name = ?name, "[storage] Ignoring foreign pin entry"),
            }
        }
        Ok(retained)
    }

    async fn retain(&self, content_id: &ContentId) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(self.object_path(content_id)).await? {
            return Err(StoreError::NotFound(content_id.clone()));
        }
        tokio::fs::write(self.pin_path(content_id), b"").await?;
        Ok(())
    }

    async fn open(&self, content_id: &ContentId) -> Result<OpenedContent, StoreError> {
        if !self.is_retained(content_id).await? {
            return Err(StoreError::NotRetained(content_id.clone()));
        }
        let file = match tokio::fs::File::open(self.object_path(content_id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(content_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        Ok(OpenedContent {
            size,
            reader: Box::new(file),
        })
    }
}
