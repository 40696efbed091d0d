use crate::error::Error;
use crate::ndef::{self, CapabilityContainer, UriIdentifierCode};
use crate::platform::{Entropy, GpoEvents, TagDevice, Watchdog};
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp;
use core::fmt;
use core::ops::RangeInclusive;
#[cfg(feature = "defmt")]
use defmt::{debug, trace};

/// User EEPROM of the tag that gets wiped before every rewrite.
pub const EEPROM_SIZE: usize = 2048;
/// Bytes per bus transaction unless the device allows less.
pub const CHUNK_SIZE: usize = 16;
/// Address the NDEF TLV is written to. A protocol constant of the target tag, not derived from
/// the size of the capability container.
pub const NDEF_OFFSET: u32 = 0x10;

/// Readings drawn on a regular rewrite.
pub const LIMITED_READINGS: RangeInclusive<u32> = 1..=38;
/// Readings drawn in special mode.
pub const ALL_READINGS: RangeInclusive<u32> = 1..=78;

/// URI written to the tag: identifier code, then `stem`, the drawn number and `extension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    pub code: UriIdentifierCode,
    pub stem: &'static str,
    pub extension: &'static str,
}

impl UriTemplate {
    pub const READINGS: Self = Self {
        code: UriIdentifierCode::Https,
        stem: "github.com/lukeswitz/SkullOfFate/blob/main/Readings/",
        extension: ".md",
    };

    /// The literal part of the URI, without the abbreviated prefix.
    pub fn suffix(&self, number: u32) -> String {
        format!("{}{}{}", self.stem, number, self.extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    pub eeprom_size: usize,
    /// Clamped to [`TagDevice::MAX_TRANSFER`].
    pub chunk_size: usize,
    pub ndef_offset: u32,
    /// Open the privileged session and route tag events to the interrupt output.
    pub configure_interrupt: bool,
    pub password: [u8; 8],
    pub interrupt_events: GpoEvents,
    pub uri: UriTemplate,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            eeprom_size: EEPROM_SIZE,
            chunk_size: CHUNK_SIZE,
            ndef_offset: NDEF_OFFSET,
            configure_interrupt: true,
            password: [0; 8],
            interrupt_events: GpoEvents::TAG_TOUCHED,
            uri: UriTemplate::READINGS,
        }
    }
}

/// Builds the tag image and streams it into the EEPROM in bounded transfers.
///
/// A rewrite is always the full sequence [`wipe`](Self::wipe),
/// [`write_capability_header`](Self::write_capability_header),
/// [`write_uri_record`](Self::write_uri_record). A failure anywhere leaves the EEPROM
/// inconsistent and the sequence has to be restarted from the wipe.
pub struct TagWriter<T: TagDevice> {
    device: T,
    options: TagOptions,
    cursor: u32,
}

impl<T: TagDevice> TagWriter<T> {
    /// Opens the controller session. With `configure_interrupt` set, also opens the privileged
    /// session and enables the configured interrupt events, so a touch can be signalled on the
    /// GPO line instead of being polled.
    pub fn initialize(mut device: T, options: TagOptions) -> Result<TagWriter<T>, Error> {
        if !device.is_present() {
            return Err(Error::TagNotDetected);
        }

        #[cfg(feature = "defmt")]
        debug!("tag detected");

        if options.configure_interrupt {
            let open = device
                .open_security_session(&options.password)
                .map_err(|_| Error::SessionFailed)?;
            if !open {
                return Err(Error::SessionFailed);
            }
            device
                .set_interrupt_events(options.interrupt_events)
                .map_err(|_| Error::SessionFailed)?;

            #[cfg(feature = "defmt")]
            debug!("tag interrupt events {:#04x}", options.interrupt_events.0);
        }

        Ok(Self {
            device,
            options,
            cursor: 0,
        })
    }

    /// Zero-fills the EEPROM so stale bytes are never read as part of a later image.
    pub fn wipe(&mut self) -> Result<(), Error> {
        self.wipe_with(&mut ())
    }

    /// Like [`wipe`](Self::wipe), feeding `watchdog` after every chunk.
    pub fn wipe_with(&mut self, watchdog: &mut impl Watchdog) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("wipe: {} bytes", self.capacity());

        let zeros = vec![0u8; self.chunk_size()];
        let capacity = self.capacity();
        let mut address = 0;
        while address < capacity {
            let len = cmp::min(zeros.len(), capacity - address);
            self.device
                .write(address as u32, &zeros[..len])
                .map_err(|_| Error::TransferFailed {
                    address: address as u32,
                })?;
            address += len;
            watchdog.feed();
        }

        self.cursor = 0;
        Ok(())
    }

    /// Writes the capability container to address 0 and moves the cursor to the fixed NDEF
    /// offset.
    pub fn write_capability_header(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_capability_header");

        let header = CapabilityContainer::TYPE2.to_bytes();
        self.write_chunked(0, &header)?;
        self.cursor = self.options.ndef_offset;
        Ok(())
    }

    /// Draws a number from `range`, writes the URI for it and returns the number.
    pub fn write_uri_record(
        &mut self,
        range: RangeInclusive<u32>,
        entropy: &mut impl Entropy,
    ) -> Result<u32, Error> {
        let number = draw(range, entropy)?;
        let suffix = self.options.uri.suffix(number);

        #[cfg(feature = "defmt")]
        debug!("write_uri_record: {}", suffix.as_str());

        #[cfg(feature = "debug-logs")]
        println!("TagWriter: {}{}", self.options.uri.code.prefix(), suffix);

        self.write_uri(self.options.uri.code, &suffix)?;
        Ok(number)
    }

    /// Writes the NDEF TLV holding one URI record, then the terminator, at the cursor and
    /// advances the cursor past the terminator.
    pub fn write_uri(&mut self, code: UriIdentifierCode, suffix: &str) -> Result<(), Error> {
        let block = ndef::encode_uri_message(code, suffix)?;

        if self.cursor as usize + block.len() > self.capacity() {
            return Err(Error::TagFull);
        }

        self.write_chunked(self.cursor, &block)?;
        self.cursor += block.len() as u32;
        Ok(())
    }

    /// Reads back the first `total_len` bytes of the EEPROM. Diagnostic only: the bytes are
    /// logged and returned, not compared.
    pub fn verify(&mut self, total_len: usize) -> Result<Vec<u8>, Error> {
        if total_len > self.capacity() {
            return Err(Error::TagFull);
        }

        let chunk_size = self.chunk_size();
        let mut image = vec![0u8; total_len];
        for (i, chunk) in image.chunks_mut(chunk_size).enumerate() {
            let address = (i * chunk_size) as u32;
            self.device
                .read(address, chunk)
                .map_err(|_| Error::TransferFailed { address })?;
        }

        #[cfg(feature = "defmt")]
        debug!("verify:\n{}", defmt::Display2Format(&HexDump(&image)));

        #[cfg(feature = "debug-logs")]
        println!("{}", HexDump(&image));

        Ok(image)
    }

    /// The next free EEPROM address.
    pub fn total_bytes_written(&self) -> u32 {
        self.cursor
    }

    pub fn device(&self) -> &T {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut T {
        &mut self.device
    }

    /// Gives up the writer and returns the device.
    pub fn release(self) -> T {
        self.device
    }

    fn capacity(&self) -> usize {
        cmp::min(self.options.eeprom_size, self.device.capacity())
    }

    fn chunk_size(&self) -> usize {
        cmp::min(self.options.chunk_size, T::MAX_TRANSFER).max(1)
    }

    fn write_chunked(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let chunk_size = self.chunk_size();
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            let address = address + (i * chunk_size) as u32;
            self.device
                .write(address, chunk)
                .map_err(|_| Error::TransferFailed { address })?;
        }
        Ok(())
    }
}

/// Draws a number uniformly enough for a badge from an inclusive range.
pub fn draw(range: RangeInclusive<u32>, entropy: &mut impl Entropy) -> Result<u32, Error> {
    let (low, high) = range.into_inner();
    if low > high {
        return Err(Error::InvalidRange);
    }
    let span = u64::from(high - low) + 1;
    Ok(low + (u64::from(entropy.next_u32()) % span) as u32)
}

/// Renders bytes 16 per row: decimal offset, hex offset, hex bytes and printable ASCII.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, bytes) in self.0.chunks(16).enumerate() {
            let offset = row * 16;
            write!(f, "{offset:05} 0x{offset:04X} ")?;
            for byte in bytes {
                write!(f, "{byte:02X} ")?;
            }
            for _ in bytes.len()..16 {
                f.write_str("   ")?;
            }
            for &byte in bytes {
                let c = if (0x20..=0x7E).contains(&byte) {
                    byte as char
                } else {
                    '.'
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
