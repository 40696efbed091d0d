use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::BitOr;
use embedded_storage::Storage;

/// A flat-directory filesystem on the badge's SPI flash.
///
/// `write` opens, fills and closes the file within one call, so no two writable handles ever
/// exist at the same time.
pub trait FileSystem {
    type Error: Debug;

    fn mount(&mut self) -> Result<(), Self::Error>;

    fn exists(&mut self, path: &str) -> Result<bool, Self::Error>;

    fn read(&mut self, path: &str) -> Result<Vec<u8>, Self::Error>;

    /// Creates or truncates `path` and writes `data` to it.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn remove(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Renames `from` to `to`. Implementations are not required to overwrite an existing `to`.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;
}

impl<T: FileSystem> FileSystem for &mut T {
    type Error = T::Error;

    fn mount(&mut self) -> Result<(), Self::Error> {
        T::mount(self)
    }

    fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        T::exists(self, path)
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        T::read(self, path)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), Self::Error> {
        T::write(self, path, data)
    }

    fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        T::remove(self, path)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        T::rename(self, from, to)
    }
}

/// Dynamic tag controller with an I2C-addressable EEPROM (ST25DV family).
///
/// EEPROM access goes through [`embedded_storage::Storage`]; a single `read` or `write` must
/// not exceed [`TagDevice::MAX_TRANSFER`] bytes.
pub trait TagDevice: Storage {
    /// Largest number of bytes a single bus transaction may carry.
    const MAX_TRANSFER: usize;

    /// Returns true if the controller answered discovery.
    fn is_present(&mut self) -> bool;

    /// Opens the privileged I2C security session. Returns whether the session is open.
    fn open_security_session(&mut self, password: &[u8; 8]) -> Result<bool, Self::Error>;

    /// Enables the given events on the interrupt output. Needs an open security session.
    fn set_interrupt_events(&mut self, events: GpoEvents) -> Result<(), Self::Error>;
}

/// Bit layout of the ST25DV GPO1 configuration register.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpoEvents(pub u8);

impl GpoEvents {
    pub const RF_USER: Self = Self(1 << 0);
    pub const RF_ACTIVITY: Self = Self(1 << 1);
    pub const RF_INTERRUPT: Self = Self(1 << 2);
    pub const FIELD_CHANGE: Self = Self(1 << 3);
    pub const RF_PUT_MSG: Self = Self(1 << 4);
    pub const RF_GET_MSG: Self = Self(1 << 5);
    pub const RF_WRITE: Self = Self(1 << 6);
    /// Master enable of the interrupt output.
    pub const GPO_EN: Self = Self(1 << 7);

    /// Every event the badge listens for, with the output enabled.
    pub const TAG_TOUCHED: Self = Self(
        Self::RF_USER.0
            | Self::RF_ACTIVITY.0
            | Self::RF_INTERRUPT.0
            | Self::FIELD_CHANGE.0
            | Self::RF_PUT_MSG.0
            | Self::RF_GET_MSG.0
            | Self::RF_WRITE.0
            | Self::GPO_EN.0,
    );

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for GpoEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Source of randomness, e.g. a floating ADC pin or a hardware TRNG.
pub trait Entropy {
    fn next_u32(&mut self) -> u32;
}

impl<T: Entropy> Entropy for &mut T {
    fn next_u32(&mut self) -> u32 {
        T::next_u32(self)
    }
}

/// Hardware watchdog that has to be fed during long-running bus work.
pub trait Watchdog {
    fn feed(&mut self);
}

impl Watchdog for () {
    fn feed(&mut self) {}
}

impl<T: Watchdog> Watchdog for &mut T {
    fn feed(&mut self) {
        T::feed(self)
    }
}
