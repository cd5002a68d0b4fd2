//! Calibration record stores.
//!
//! Both stores hold exactly one fixed-size record, like the EEPROM block
//! the controller was designed around. A missing or unmarked record loads
//! as `None`; only I/O failures are errors.
use gimbal_traits::record::RecordDecodeError;
use gimbal_traits::{BoxError, CalibrationRecord, CalibrationStore};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::{fs, io::Write};

fn decode(bytes: &[u8]) -> Option<CalibrationRecord> {
    match CalibrationRecord::from_bytes(bytes) {
        Ok(rec) => Some(rec),
        Err(RecordDecodeError::BadMagic(m)) => {
            tracing::debug!(marker = m, "no calibration record");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable calibration record");
            None
        }
    }
}

/// In-process store. Clones share the same bytes, so a test can keep a
/// handle after moving one into a controller.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Rc<RefCell<Option<Vec<u8>>>>,
    saves: Rc<RefCell<u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &CalibrationRecord) -> Self {
        let s = Self::default();
        *s.bytes.borrow_mut() = Some(record.to_bytes().to_vec());
        s
    }

    /// Raw stored bytes, for tests that corrupt or inspect them.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.bytes.borrow().clone()
    }

    pub fn set_raw(&self, bytes: Vec<u8>) {
        *self.bytes.borrow_mut() = Some(bytes);
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.borrow()
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&mut self) -> Result<Option<CalibrationRecord>, BoxError> {
        Ok(self.bytes.borrow().as_deref().and_then(decode))
    }

    fn save(&mut self, record: &CalibrationRecord) -> Result<(), BoxError> {
        *self.bytes.borrow_mut() = Some(record.to_bytes().to_vec());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

/// Single-record binary file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

impl CalibrationStore for FileStore {
    fn load(&mut self) -> Result<Option<CalibrationRecord>, BoxError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(decode(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(crate::error::HwError::Io(e))),
        }
    }

    fn save(&mut self, record: &CalibrationRecord) -> Result<(), BoxError> {
        write_atomic(&self.path, &record.to_bytes())
            .map_err(|e| Box::new(crate::error::HwError::Io(e)) as BoxError)?;
        tracing::debug!(path = %self.path.display(), step = record.step, "calibration record written");
        Ok(())
    }
}
