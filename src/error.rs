use thiserror::Error;

/// The step of the replace protocol that did not complete.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveStep {
    /// Moving the canonical file onto the backup path.
    Backup,
    /// Writing the serialized record to the temp path.
    WriteTemp,
    /// Removing a canonical file left behind by an interrupted cycle.
    RemoveCanonical,
    /// Renaming the temp file onto the canonical path.
    Commit,
}

/// The kind of value a configuration field holds.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldKind {
    Integer,
    Text,
    Real,
    Boolean,
}

/// Errors of the configuration store and the tag writer. Marked as non-exhaustive so adapters
/// can grow new failure modes. Boot code only needs [`Error::is_fatal_at_boot`] to decide
/// whether to halt; everything else is reported and the caller keeps running.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The flash filesystem could not be mounted.
    #[error("storage unavailable")]
    StorageUnavailable,

    /// A document that had to be valid JSON was not. At boot this only happens if the
    /// compiled-in default document is broken.
    #[error("configuration corrupt")]
    ConfigCorrupt,

    /// The canonical configuration file does not exist.
    #[error("configuration missing")]
    ConfigMissing,

    /// The canonical configuration file exists but could not be read.
    #[error("configuration read failed")]
    ReadFailed,

    /// A step of the replace protocol failed. The in-memory record keeps the attempted
    /// update, the medium does not.
    #[error("persisting configuration failed at step {0}")]
    PersistFailed(SaveStep),

    /// The field is not part of the record or not present in the persisted document.
    #[error("unknown field")]
    UnknownField,

    /// The value does not match the kind of the field.
    #[error("field type mismatch: expected {expected}, found {found}")]
    FieldTypeMismatch { expected: FieldKind, found: FieldKind },

    /// The tag controller did not answer discovery.
    #[error("tag not detected")]
    TagNotDetected,

    /// The privileged session could not be opened or the interrupt configuration was rejected.
    #[error("tag session failed")]
    SessionFailed,

    /// A bus transfer to or from the EEPROM failed. The EEPROM content is undefined from
    /// `address` on.
    #[error("transfer failed at {address:#06x}")]
    TransferFailed { address: u32 },

    /// The URI suffix does not fit a short record.
    #[error("uri too long")]
    UriTooLong,

    /// The payload does not fit the EEPROM.
    #[error("tag full")]
    TagFull,

    /// The random range is empty.
    #[error("invalid range")]
    InvalidRange,
}

impl Error {
    /// Errors after which the badge must not keep running: an unmountable medium, a broken
    /// default document, a first commit that did not land or a tag that cannot be driven.
    pub fn is_fatal_at_boot(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable
                | Error::ConfigCorrupt
                | Error::PersistFailed(_)
                | Error::TagNotDetected
                | Error::SessionFailed
        )
    }
}
