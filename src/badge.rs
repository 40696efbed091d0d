use crate::error::Error;
use crate::field::SetField;
use crate::platform::{Entropy, FileSystem, TagDevice, Watchdog};
use crate::record::ConfigurationRecord;
use crate::store::ConfigStore;
use crate::tag::{ALL_READINGS, LIMITED_READINGS, TagOptions, TagWriter};
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{info, warn};

/// Outcome of a tag rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// The reading the URI points to.
    pub reading: u32,
    /// Bytes of the image that carry meaning, starting at address 0.
    pub total_bytes: u32,
    /// The image as read back from the EEPROM.
    pub image: Vec<u8>,
}

/// What the animation and sensor layer sees of the badge: a configuration snapshot, typed
/// field updates and the tag rewrite gesture.
///
/// Every call runs to completion on the caller's context; animation freezes while a rewrite
/// is in flight.
pub struct Badge<F: FileSystem, T: TagDevice, E: Entropy, W: Watchdog = ()> {
    config: ConfigStore<F>,
    tag: TagWriter<T>,
    entropy: E,
    watchdog: W,
}

impl<F: FileSystem, T: TagDevice, E: Entropy, W: Watchdog> Badge<F, T, E, W> {
    /// Brings up the configuration store, then the tag. Any error here is fatal for the
    /// badge, see [`Error::is_fatal_at_boot`].
    pub fn boot(
        fs: F,
        tag_device: T,
        tag_options: TagOptions,
        entropy: E,
        watchdog: W,
    ) -> Result<Badge<F, T, E, W>, Error> {
        let config = ConfigStore::initialize(fs)?;
        let tag = TagWriter::initialize(tag_device, tag_options)?;

        #[cfg(feature = "defmt")]
        info!("badge up");

        Ok(Self {
            config,
            tag,
            entropy,
            watchdog,
        })
    }

    pub fn get_configuration(&self) -> ConfigurationRecord {
        self.config.get_record()
    }

    /// Updates and persists one field. Failures are recoverable: the badge keeps running
    /// with the last persisted value on disk.
    pub fn set_field<V>(&mut self, name: &str, value: V) -> Result<(), Error>
    where
        ConfigStore<F>: SetField<V>,
    {
        let result = self.config.set(name, value);

        #[cfg(feature = "defmt")]
        if let Err(e) = &result {
            warn!("set_field {}: {}", name, e);
        }

        result
    }

    /// Regenerates the tag: wipe, capability container, a URI for a freshly drawn reading,
    /// then a diagnostic read-back. The extended range covers every reading, the regular
    /// one only the first 38.
    ///
    /// On failure the EEPROM content is undefined; call again to redo the whole sequence.
    pub fn trigger_tag_rewrite(
        &mut self,
        use_extended_range: bool,
    ) -> Result<RewriteReport, Error> {
        let range = if use_extended_range {
            ALL_READINGS
        } else {
            LIMITED_READINGS
        };

        self.watchdog.feed();
        self.tag.wipe_with(&mut self.watchdog)?;
        self.tag.write_capability_header()?;
        let reading = self.tag.write_uri_record(range, &mut self.entropy)?;
        self.watchdog.feed();

        let total_bytes = self.tag.total_bytes_written();
        let image = self.tag.verify(total_bytes as usize)?;

        #[cfg(feature = "defmt")]
        info!("tag rewritten: reading {}, {} bytes", reading, total_bytes);

        Ok(RewriteReport {
            reading,
            total_bytes,
            image,
        })
    }

    pub fn config(&self) -> &ConfigStore<F> {
        &self.config
    }

    pub fn tag(&self) -> &TagWriter<T> {
        &self.tag
    }

    pub fn tag_mut(&mut self) -> &mut TagWriter<T> {
        &mut self.tag
    }
}
