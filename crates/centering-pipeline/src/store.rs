//! Calibration persistence.
//!
//! [`CalibrationStore`] holds the last saved scale for one capture device
//! and applies the staleness policy; a [`CalibrationStorage`] backend does
//! the actual reading and writing.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use centering_core::{px_to_mm, CalibrationData, CenteringError, FrameSpec, Real};
use log::{debug, info, warn};

use crate::current_timestamp;

/// Backend that persists one [`CalibrationData`] per device identity.
pub trait CalibrationStorage {
    /// Read the calibration stored for `device_id`, if any.
    fn read(&self, device_id: &str) -> Result<Option<CalibrationData>>;

    /// Store `data` under `data.device_id`, replacing any previous value.
    fn write(&mut self, data: &CalibrationData) -> Result<()>;

    /// Delete the calibration stored for `device_id`. Removing a missing
    /// entry is not an error.
    fn remove(&mut self, device_id: &str) -> Result<()>;
}

/// Process-local storage; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, CalibrationData>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationStorage for MemoryStorage {
    fn read(&self, device_id: &str) -> Result<Option<CalibrationData>> {
        Ok(self.entries.get(device_id).cloned())
    }

    fn write(&mut self, data: &CalibrationData) -> Result<()> {
        self.entries.insert(data.device_id.clone(), data.clone());
        Ok(())
    }

    fn remove(&mut self, device_id: &str) -> Result<()> {
        self.entries.remove(device_id);
        Ok(())
    }
}

/// One pretty-printed JSON document per device under a directory.
///
/// Device ids are escaped into file names: ASCII alphanumerics and `-`
/// are kept, every other byte becomes `_` plus two hex digits. Distinct
/// ids therefore never share a file; the empty id maps to `_.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the calibration for `device_id`.
    pub fn path_for(&self, device_id: &str) -> PathBuf {
        let mut stem = String::with_capacity(device_id.len());
        for byte in device_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{byte:02x}"));
            }
        }
        if stem.is_empty() {
            stem.push('_');
        }
        self.dir.join(format!("{stem}.json"))
    }
}

impl CalibrationStorage for JsonFileStorage {
    fn read(&self, device_id: &str) -> Result<Option<CalibrationData>> {
        let path = self.path_for(device_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read calibration {}", path.display()))?;
        let data: CalibrationData = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse calibration {}", path.display()))?;
        if data.device_id != device_id {
            warn!(
                "{} holds a calibration for device {:?}, expected {:?}",
                path.display(),
                data.device_id,
                device_id
            );
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn write(&mut self, data: &CalibrationData) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(&data.device_id);
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write calibration {}", path.display()))?;
        debug!("wrote calibration to {}", path.display());
        Ok(())
    }

    fn remove(&mut self, device_id: &str) -> Result<()> {
        let path = self.path_for(device_id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove calibration {}", path.display()))?;
        }
        Ok(())
    }
}

/// Last saved calibration for one capture device.
pub struct CalibrationStore {
    device_id: String,
    max_age_secs: u64,
    storage: Box<dyn CalibrationStorage>,
    current: Option<CalibrationData>,
}

impl fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("device_id", &self.device_id)
            .field("max_age_secs", &self.max_age_secs)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl CalibrationStore {
    /// Default staleness window: one day.
    pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;

    pub fn new(device_id: impl Into<String>, storage: impl CalibrationStorage + 'static) -> Self {
        Self {
            device_id: device_id.into(),
            max_age_secs: Self::DEFAULT_MAX_AGE_SECS,
            storage: Box::new(storage),
            current: None,
        }
    }

    /// Store backed by [`MemoryStorage`].
    pub fn in_memory(device_id: impl Into<String>) -> Self {
        Self::new(device_id, MemoryStorage::new())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    pub fn set_max_age_secs(&mut self, max_age_secs: u64) {
        self.max_age_secs = max_age_secs;
    }

    /// Derive a calibration for this device, stamped now. Nothing is saved.
    ///
    /// # Errors
    ///
    /// See [`CalibrationData::from_reference`].
    pub fn compute(
        &self,
        face_width_px: Real,
        spec: &FrameSpec,
    ) -> Result<CalibrationData, CenteringError> {
        CalibrationData::from_reference(
            face_width_px,
            spec,
            self.device_id.clone(),
            current_timestamp(),
        )
    }

    /// Persist `data` and make it the current calibration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write; the current
    /// calibration is left unchanged in that case.
    pub fn save(&mut self, data: CalibrationData) -> Result<()> {
        self.storage.write(&data).with_context(|| {
            format!("failed to save calibration for device {}", self.device_id)
        })?;
        info!(
            "saved calibration for {}: {:.4} px/mm",
            self.device_id, data.pixels_per_mm
        );
        self.current = Some(data);
        Ok(())
    }

    /// Load the persisted calibration for this device into memory.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn load(&mut self) -> Result<Option<CalibrationData>> {
        let loaded = self.storage.read(&self.device_id)?;
        match &loaded {
            Some(data) => debug!(
                "loaded calibration for {} from t={}",
                self.device_id, data.timestamp
            ),
            None => debug!("no stored calibration for {}", self.device_id),
        }
        self.current = loaded.clone();
        Ok(loaded)
    }

    /// Last saved or loaded calibration, valid or not.
    pub fn current(&self) -> Option<&CalibrationData> {
        self.current.as_ref()
    }

    /// Current calibration, if it passes [`check`](Self::check).
    ///
    /// # Errors
    ///
    /// [`CenteringError::InsufficientSignal`] when none is held, otherwise
    /// whatever [`check`](Self::check) reports.
    pub fn valid_current(&self) -> Result<&CalibrationData, CenteringError> {
        let data = self
            .current
            .as_ref()
            .ok_or_else(|| CenteringError::insufficient("no calibration available"))?;
        self.check(data)?;
        Ok(data)
    }

    /// Check scale and staleness of `data` against the current time.
    pub fn check(&self, data: &CalibrationData) -> Result<(), CenteringError> {
        data.check(current_timestamp(), self.max_age_secs)
    }

    pub fn is_valid(&self, data: &CalibrationData) -> bool {
        self.check(data).is_ok()
    }

    /// Convert a pixel length with `data`.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InvalidCalibration`] for an unusable scale.
    pub fn px_to_mm(&self, px: Real, data: &CalibrationData) -> Result<Real, CenteringError> {
        px_to_mm(px, data)
    }

    /// Forget the calibration, in memory and in the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to delete.
    pub fn reset(&mut self) -> Result<()> {
        self.current = None;
        self.storage.remove(&self.device_id).with_context(|| {
            format!("failed to remove calibration for device {}", self.device_id)
        })?;
        info!("calibration for {} reset", self.device_id);
        Ok(())
    }
}
