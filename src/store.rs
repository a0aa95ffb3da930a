use crate::model::AcademyData;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const STATE_FILE: &str = "academy.json";

/// Storage surface for the single state document. Mirrors a key/value
/// store holding one blob: the snapshot is read once and rewritten
/// wholesale on every change.
pub trait StatePort {
    fn read(&self) -> anyhow::Result<Option<String>>;
    fn write(&self, raw: &str) -> anyhow::Result<()>;
}

pub struct FilePort {
    path: PathBuf,
}

impl FilePort {
    pub fn new(workspace: &Path) -> Self {
        Self {
            path: workspace.join(STATE_FILE),
        }
    }
}

impl StatePort for FilePort {
    fn read(&self) -> anyhow::Result<Option<String>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.to_string_lossy()))?;
        Ok(Some(raw))
    }

    fn write(&self, raw: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
        // Replace by rename so a crash mid-write cannot truncate the document.
        let tmp = self.path.with_extension("json.writing");
        std::fs::write(&tmp, raw)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("failed to move state into {}", self.path.to_string_lossy())
        })?;
        Ok(())
    }
}

pub struct Store {
    data: AcademyData,
    port: Box<dyn StatePort>,
}

impl Store {
    /// Loads the snapshot behind the port. A missing, unreadable, or
    /// malformed document degrades to the empty academy.
    pub fn open(port: Box<dyn StatePort>) -> Self {
        let data = match port.read() {
            Ok(Some(raw)) => match serde_json::from_str::<AcademyData>(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "state document is malformed; starting empty");
                    AcademyData::default()
                }
            },
            Ok(None) => AcademyData::default(),
            Err(e) => {
                warn!(error = %e, "state document is unreadable; starting empty");
                AcademyData::default()
            }
        };
        Self { data, port }
    }

    pub fn data(&self) -> &AcademyData {
        &self.data
    }

    /// Applies a mutation and rewrites the whole document.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut AcademyData) -> T) -> anyhow::Result<T> {
        let out = f(&mut self.data);
        self.persist()?;
        Ok(out)
    }

    fn persist(&self) -> anyhow::Result<()> {
        let raw =
            serde_json::to_string_pretty(&self.data).context("failed to serialize state")?;
        self.port.write(&raw)
    }
}
