use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::types::StoredEntry;
use crate::{Error, RunRecord, RunStatus, Store};

/// Filesystem-backed store.
///
/// Entries are stored one file per target:
/// ```text
/// {root}/
/// └── targets/
///     ├── load.json
///     ├── double.json
///     └── summarize.json
/// ```
/// Target names are validated identifiers (`[A-Za-z_][A-Za-z0-9_]*`), so
/// they are safe as file names.
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store rooted at the given path.
  ///
  /// The directory is created lazily on first write.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the store.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn entry_path(&self, target: &str) -> PathBuf {
    self.root.join("targets").join(format!("{}.json", target))
  }

  async fn read_entry(&self, target: &str) -> Result<Option<StoredEntry>, Error> {
    let path = self.entry_path(target);
    let content = match fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
  }
}

#[async_trait]
impl Store for FsStore {
  async fn record(&self, target: &str) -> Result<Option<RunRecord>, Error> {
    Ok(self.read_entry(target).await?.map(|entry| entry.record))
  }

  async fn result(&self, target: &str) -> Result<serde_json::Value, Error> {
    let entry = self.read_entry(target).await?;
    match entry {
      Some(StoredEntry {
        record:
          RunRecord {
            status: RunStatus::Success,
            ..
          },
        result: Some(result),
      }) => Ok(result),
      _ => Err(Error::NotFound(target.to_string())),
    }
  }

  async fn put(
    &self,
    record: &RunRecord,
    result: Option<&serde_json::Value>,
  ) -> Result<(), Error> {
    let entry = StoredEntry {
      record: record.clone(),
      result: result.cloned(),
    };
    let content = serde_json::to_vec_pretty(&entry)?;

    let path = self.entry_path(&record.target);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    // Write-temp-then-rename: the rename is the commit point, so the entry
    // is either fully updated or left at its previous valid state. The
    // executor is the single writer per target name, so the temp name
    // cannot collide.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &content).await?;
    fs::rename(&tmp, &path).await?;
    Ok(())
  }
}
