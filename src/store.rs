use crate::error::{Error, SaveStep};
use crate::field::{FieldValue, SetField};
use crate::platform::FileSystem;
use crate::record::{self, ConfigurationRecord, DEFAULT_DOCUMENT};
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{debug, trace, warn};
use serde_json::Value;

pub const CONFIG_PATH: &str = "/config.json";
pub const TEMP_PATH: &str = "/config_temp.json";
pub const BACKUP_PATH: &str = "/config_backup.json";

fn fail<E>(step: SaveStep) -> impl FnOnce(E) -> Error {
    move |_| Error::PersistFailed(step)
}

/// The single durable source of the badge configuration.
///
/// The record lives in memory and is replaced wholesale on disk by [`ConfigStore::save`], which
/// never writes to the canonical path directly. At any point the canonical file either holds a
/// complete committed document or does not exist.
pub struct ConfigStore<F: FileSystem> {
    pub(crate) fs: F,
    pub(crate) record: ConfigurationRecord,
}

impl<F: FileSystem> ConfigStore<F> {
    /// Mounts the filesystem and brings the record up:
    /// 1. Restore the backup onto the canonical path if only the backup survived a save
    /// 2. Load the canonical file, filling fields it lacks with their fallbacks
    /// 3. Otherwise synthesize the record from [`DEFAULT_DOCUMENT`] and commit it
    ///
    /// Fails if the medium cannot be mounted or read, or if a commit does not land. All of
    /// these are fatal: the badge must not run with configuration it cannot persist.
    pub fn initialize(fs: F) -> Result<ConfigStore<F>, Error> {
        let mut store = Self {
            fs,
            record: ConfigurationRecord::default(),
        };

        store.fs.mount().map_err(|_| Error::StorageUnavailable)?;

        #[cfg(feature = "defmt")]
        debug!("initialize: filesystem mounted");

        store.restore_backup().map_err(|e| match e {
            Error::ReadFailed => Error::StorageUnavailable,
            e => e,
        })?;

        if store.load() {
            return Ok(store);
        }

        #[cfg(feature = "defmt")]
        warn!("initialize: no usable configuration, writing defaults");

        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: no usable configuration, writing defaults");

        let document: Value =
            serde_json::from_str(DEFAULT_DOCUMENT).map_err(|_| Error::ConfigCorrupt)?;
        store.record = ConfigurationRecord::from_document(&document);
        store.save()?;

        Ok(store)
    }

    /// Refreshes the in-memory record from the canonical file.
    ///
    /// Returns false and leaves the record untouched if the file is missing or not valid JSON.
    pub fn load(&mut self) -> bool {
        match self.read_document(CONFIG_PATH) {
            Ok(document) => {
                self.record = ConfigurationRecord::from_document(&document);
                true
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                debug!("load: {}", _e);

                #[cfg(feature = "debug-logs")]
                println!("ConfigStore: load failed: {_e}");

                false
            }
        }
    }

    /// Persists the in-memory record with the replace protocol:
    /// 1. Move the canonical file onto the backup path, dropping an older backup
    /// 2. Write the full record to the temp path
    /// 3. Remove the canonical file if an interrupted cycle left one behind
    /// 4. Rename the temp file onto the canonical path
    ///
    /// The failing step is reported in [`Error::PersistFailed`].
    pub fn save(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("save");

        let encoded = self.encode()?;

        if self.fs.exists(CONFIG_PATH).map_err(fail(SaveStep::Backup))? {
            if self.fs.exists(BACKUP_PATH).map_err(fail(SaveStep::Backup))? {
                self.fs
                    .remove(BACKUP_PATH)
                    .map_err(fail(SaveStep::Backup))?;
            }
            self.fs
                .rename(CONFIG_PATH, BACKUP_PATH)
                .map_err(fail(SaveStep::Backup))?;
        }

        self.fs
            .write(TEMP_PATH, &encoded)
            .map_err(fail(SaveStep::WriteTemp))?;

        if self
            .fs
            .exists(CONFIG_PATH)
            .map_err(fail(SaveStep::RemoveCanonical))?
        {
            self.fs
                .remove(CONFIG_PATH)
                .map_err(fail(SaveStep::RemoveCanonical))?;
        }

        self.fs
            .rename(TEMP_PATH, CONFIG_PATH)
            .map_err(fail(SaveStep::Commit))?;

        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: saved {} bytes", encoded.len());

        Ok(())
    }

    /// Assigns one field and persists the result.
    ///
    /// The field must be part of the record and already present in the canonical file, so a
    /// mistyped name never grows the schema. Unknown names and values of the wrong kind are
    /// rejected before anything is read or written. A backup left by an earlier failed save is
    /// restored first. If only the final save fails, the in-memory record already holds the
    /// new value.
    pub fn update_field(&mut self, name: &str, value: FieldValue) -> Result<(), Error> {
        let spec = record::field_spec(name).ok_or(Error::UnknownField)?;
        if spec.kind() != value.kind() {
            return Err(Error::FieldTypeMismatch {
                expected: spec.kind(),
                found: value.kind(),
            });
        }

        self.restore_backup()?;
        let mut document = self.read_document(CONFIG_PATH)?;

        let slot = record::lookup_mut(&mut document, name).ok_or(Error::UnknownField)?;
        *slot = value.into();

        self.record = ConfigurationRecord::from_document(&document);

        #[cfg(feature = "defmt")]
        trace!("update_field: {}", name);

        self.save()
    }

    /// Sets a field from a plain Rust value, see [`SetField`].
    pub fn set<T>(&mut self, name: &str, value: T) -> Result<(), Error>
    where
        ConfigStore<F>: SetField<T>,
    {
        SetField::set_field(self, name, value)
    }

    /// A copy of the current record. Never touches the medium.
    pub fn get_record(&self) -> ConfigurationRecord {
        self.record.clone()
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn filesystem_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// Gives up the store and returns the filesystem.
    pub fn into_inner(self) -> F {
        self.fs
    }

    fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec_pretty(&self.record.to_document())
            .map_err(|_| Error::PersistFailed(SaveStep::WriteTemp))
    }

    fn read_document(&mut self, path: &str) -> Result<Value, Error> {
        if !self.fs.exists(path).map_err(|_| Error::ReadFailed)? {
            return Err(Error::ConfigMissing);
        }
        let raw = self.fs.read(path).map_err(|_| Error::ReadFailed)?;
        let document: Value = serde_json::from_slice(&raw).map_err(|_| Error::ConfigCorrupt)?;
        if !document.is_object() {
            return Err(Error::ConfigCorrupt);
        }
        Ok(document)
    }

    /// A save interrupted between its backup and commit steps leaves only the backup. Put it
    /// back if it still parses; a leftover temp file is never trusted.
    ///
    /// If the backup cannot be moved, its content is committed under the canonical path
    /// instead and the backup stays where it is.
    fn restore_backup(&mut self) -> Result<(), Error> {
        if self.fs.exists(CONFIG_PATH).map_err(|_| Error::ReadFailed)? {
            return Ok(());
        }

        let document = match self.read_document(BACKUP_PATH) {
            Ok(document) => document,
            Err(Error::ReadFailed) => return Err(Error::ReadFailed),
            Err(_) => return Ok(()),
        };

        #[cfg(feature = "defmt")]
        warn!("restore_backup: restoring configuration from backup");

        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: restoring configuration from backup");

        if self.fs.rename(BACKUP_PATH, CONFIG_PATH).is_ok() {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        warn!("restore_backup: rename failed, committing the backup content");

        #[cfg(feature = "debug-logs")]
        println!("ConfigStore: backup rename failed, committing its content");

        self.record = ConfigurationRecord::from_document(&document);
        self.save()
    }
}
