//! Byte-exact encoding of the tag image: capability container, NDEF TLV framing and the
//! well-known URI record.
//!
//! ```text
//! 0x00  E2 40 00 01 00 00 03 FF     capability container
//! 0x10  03 LL | 03 FF HH LL         NDEF TLV (short form if the message is < 255 bytes)
//!       D1 01 PL 55 ID suffix...    URI record, short record, well-known type
//!       FE                          terminator TLV
//! ```

use crate::error::Error;
use alloc::vec;
use alloc::vec::Vec;
use deku::prelude::*;

pub const TLV_NDEF_MESSAGE: u8 = 0x03;
pub const TLV_TERMINATOR: u8 = 0xFE;
/// Length byte announcing the three-byte extended length form.
pub const TLV_EXTENDED_LENGTH: u8 = 0xFF;
/// Messages this long or longer need the extended length form.
pub const TLV_SHORT_LENGTH_LIMIT: usize = 0xFF;

pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const RECORD_TYPE_URI: u8 = b'U';

/// Bytes of a URI record in front of the suffix: header, type length, payload length, type
/// and identifier code.
pub const URI_RECORD_OVERHEAD: usize = 5;
/// A short record carries at most 255 payload bytes, one of which is the identifier code.
pub const MAX_URI_SUFFIX: usize = u8::MAX as usize - 1;

/// Prefix abbreviations of the NFC Forum URI record type definition.
#[derive(strum::FromRepr, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UriIdentifierCode {
    NoPrefix = 0x00,
    HttpWww = 0x01,
    HttpsWww = 0x02,
    Http = 0x03,
    Https = 0x04,
}

impl UriIdentifierCode {
    pub fn prefix(&self) -> &'static str {
        match self {
            UriIdentifierCode::NoPrefix => "",
            UriIdentifierCode::HttpWww => "http://www.",
            UriIdentifierCode::HttpsWww => "https://www.",
            UriIdentifierCode::Http => "http://",
            UriIdentifierCode::Https => "https://",
        }
    }

    /// Splits a full URI into the longest known prefix and the literal rest.
    pub fn abbreviate(uri: &str) -> (Self, &str) {
        [Self::HttpWww, Self::HttpsWww, Self::Http, Self::Https]
            .into_iter()
            .find_map(|code| uri.strip_prefix(code.prefix()).map(|rest| (code, rest)))
            .unwrap_or((Self::NoPrefix, uri))
    }
}

/// Capability container of a type 2 tag. The memory size is counted in units of 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContainer {
    pub magic: u8,
    pub version_access: u8,
    pub memory_size_units: u8,
}

impl CapabilityContainer {
    pub const SIZE: usize = 8;

    pub const TYPE2: Self = Self {
        magic: 0xE2,
        version_access: 0x40,
        memory_size_units: 0x01,
    };

    pub const fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.magic,
            self.version_access,
            0x00,
            self.memory_size_units,
            0x00,
            0x00,
            TLV_NDEF_MESSAGE,
            TLV_EXTENDED_LENGTH,
        ]
    }
}

/// A single URI record: message begin and end, short record, well-known type `U`. The payload
/// is the identifier code followed by the literal suffix.
///
/// Only short records without an id field are modelled; that is all the badge ever writes.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
pub struct UriRecord {
    #[deku(bits = 1)]
    message_begin: bool,
    #[deku(bits = 1)]
    message_end: bool,
    #[deku(bits = 1)]
    chunked: bool,
    #[deku(bits = 1)]
    short_record: bool,
    #[deku(bits = 1)]
    id_length_present: bool,
    #[deku(bits = 3)]
    type_name_format: u8,
    #[deku(update = "self.record_type.len()")]
    type_length: u8,
    #[deku(update = "self.payload.len()")]
    payload_length: u8,
    #[deku(count = "type_length")]
    record_type: Vec<u8>,
    #[deku(count = "payload_length")]
    payload: Vec<u8>,
}

impl UriRecord {
    pub fn new(code: UriIdentifierCode, suffix: &str) -> Result<Self, Error> {
        if suffix.len() > MAX_URI_SUFFIX {
            return Err(Error::UriTooLong);
        }

        let mut payload = Vec::with_capacity(1 + suffix.len());
        payload.push(code as u8);
        payload.extend_from_slice(suffix.as_bytes());

        let mut record = Self {
            message_begin: true,
            message_end: true,
            chunked: false,
            short_record: true,
            id_length_present: false,
            type_name_format: TNF_WELL_KNOWN,
            type_length: 0,
            payload_length: 0,
            record_type: vec![RECORD_TYPE_URI],
            payload,
        };
        record.update().map_err(|_| Error::UriTooLong)?;
        Ok(record)
    }

    pub fn code(&self) -> Option<UriIdentifierCode> {
        self.payload
            .first()
            .copied()
            .and_then(UriIdentifierCode::from_repr)
    }

    /// The URI without its abbreviated prefix.
    pub fn suffix(&self) -> &[u8] {
        self.payload.get(1..).unwrap_or_default()
    }
}

fn tlv_length_reader<R: no_std_io::io::Read>(
    reader: &mut deku::reader::Reader<R>,
) -> Result<usize, DekuError> {
    let len = u8::from_reader_with_ctx(reader, deku::ctx::Endian::Big)?;
    if len == TLV_EXTENDED_LENGTH {
        Ok(u16::from_reader_with_ctx(reader, deku::ctx::Endian::Big)?.into())
    } else {
        Ok(len.into())
    }
}

fn tlv_length_writer<W: no_std_io::io::Write>(
    writer: &mut deku::writer::Writer<W>,
    len: usize,
) -> Result<(), DekuError> {
    if len < TLV_SHORT_LENGTH_LIMIT {
        (len as u8).to_writer(writer, deku::ctx::Endian::Big)
    } else {
        let len: u16 = len.try_into()?;
        TLV_EXTENDED_LENGTH.to_writer(writer, deku::ctx::Endian::Big)?;
        len.to_writer(writer, deku::ctx::Endian::Big)
    }
}

/// NDEF message TLV holding one URI record, followed by the terminator TLV.
/// The length field is `03 LL` below 255 bytes and `03 FF HH LL` otherwise.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
pub struct NdefMessageTlv {
    #[deku(update = "TLV_NDEF_MESSAGE")]
    tlv_type: u8,
    #[deku(
        reader = "tlv_length_reader(deku::reader)",
        writer = "tlv_length_writer(deku::writer, *length)",
        update = "self.record.to_bytes()?.len()"
    )]
    length: usize,
    pub record: UriRecord,
    #[deku(update = "TLV_TERMINATOR")]
    terminator: u8,
}

impl NdefMessageTlv {
    pub fn new(record: UriRecord) -> Result<Self, Error> {
        let mut tlv = Self {
            tlv_type: 0,
            length: 0,
            record,
            terminator: 0,
        };
        tlv.update().map_err(|_| Error::TagFull)?;
        Ok(tlv)
    }

    /// Reads a complete block from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (_, tlv) = Self::from_bytes((bytes, 0)).ok()?;
        (tlv.tlv_type == TLV_NDEF_MESSAGE).then_some(tlv)
    }

    /// Length of the record as announced by the length field.
    pub fn message_len(&self) -> usize {
        self.length
    }
}

/// The TLV block for one URI record, terminator included, ready to be written to the tag.
pub fn encode_uri_message(code: UriIdentifierCode, suffix: &str) -> Result<Vec<u8>, Error> {
    NdefMessageTlv::new(UriRecord::new(code, suffix)?)?
        .to_bytes()
        .map_err(|_| Error::TagFull)
}

/// Reads the TLV header at the start of `bytes`. Returns the message length and the size of
/// the header, or None if `bytes` does not start with a complete NDEF message TLV header.
pub fn parse_tlv_header(bytes: &[u8]) -> Option<(usize, usize)> {
    let (&tlv_type, rest) = bytes.split_first()?;
    if tlv_type != TLV_NDEF_MESSAGE {
        return None;
    }

    let mut cursor = no_std_io::io::Cursor::new(rest);
    let mut reader = deku::reader::Reader::new(&mut cursor);
    let len = tlv_length_reader(&mut reader).ok()?;

    let header_len = if rest.first() == Some(&TLV_EXTENDED_LENGTH) {
        4
    } else {
        2
    };
    Some((len, header_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_container_bytes() {
        assert_eq!(
            CapabilityContainer::TYPE2.to_bytes(),
            [0xE2, 0x40, 0x00, 0x01, 0x00, 0x00, 0x03, 0xFF]
        );
    }

    #[test]
    fn uri_record_layout() {
        let record = UriRecord::new(UriIdentifierCode::Https, "a.b/5.md").unwrap();
        let bytes = record.to_bytes().unwrap();
        assert_eq!(&bytes[..5], &[0xD1, 0x01, 9, b'U', 0x04]);
        assert_eq!(&bytes[5..], b"a.b/5.md");

        let (_, read) = UriRecord::from_bytes((bytes.as_slice(), 0)).unwrap();
        assert_eq!(read, record);
        assert_eq!(read.code(), Some(UriIdentifierCode::Https));
        assert_eq!(read.suffix(), b"a.b/5.md");
    }

    #[test]
    fn uri_suffix_limit() {
        let max = "x".repeat(MAX_URI_SUFFIX);
        let record = UriRecord::new(UriIdentifierCode::NoPrefix, &max).unwrap();
        assert_eq!(record.to_bytes().unwrap()[2], 0xFF);

        let over = "x".repeat(MAX_URI_SUFFIX + 1);
        assert_eq!(
            UriRecord::new(UriIdentifierCode::NoPrefix, &over),
            Err(Error::UriTooLong)
        );
    }

    #[test]
    fn tlv_length_boundary() {
        // 5 bytes of record header + 249 bytes of suffix make a 254 byte message
        let block = encode_uri_message(UriIdentifierCode::NoPrefix, &"x".repeat(249)).unwrap();
        assert_eq!(&block[..2], &[0x03, 254]);
        assert_eq!(block.len(), 2 + 254 + 1);
        assert_eq!(parse_tlv_header(&block), Some((254, 2)));
        assert_eq!(NdefMessageTlv::parse(&block).unwrap().message_len(), 254);

        let block = encode_uri_message(UriIdentifierCode::NoPrefix, &"x".repeat(250)).unwrap();
        assert_eq!(&block[..4], &[0x03, 0xFF, 0x00, 0xFF]);
        assert_eq!(block.len(), 4 + 255 + 1);
        assert_eq!(parse_tlv_header(&block), Some((255, 4)));
        assert_eq!(block.last(), Some(&TLV_TERMINATOR));

        let tlv = NdefMessageTlv::parse(&block).unwrap();
        assert_eq!(tlv.message_len(), 255);
        assert_eq!(tlv.record.suffix().len(), 250);
    }

    #[test]
    fn truncated_headers() {
        assert_eq!(parse_tlv_header(&[]), None);
        assert_eq!(parse_tlv_header(&[0x03]), None);
        assert_eq!(parse_tlv_header(&[0x03, 0xFF, 0x01]), None);
        assert_eq!(parse_tlv_header(&[0xFE, 0x05]), None);
        assert_eq!(parse_tlv_header(&[0x03, 0x05]), Some((5, 2)));
    }

    #[test]
    fn abbreviation_prefers_longest_prefix() {
        assert_eq!(
            UriIdentifierCode::abbreviate("https://www.example.org"),
            (UriIdentifierCode::HttpsWww, "example.org")
        );
        assert_eq!(
            UriIdentifierCode::abbreviate("https://github.com/x"),
            (UriIdentifierCode::Https, "github.com/x")
        );
        assert_eq!(
            UriIdentifierCode::abbreviate("mailto:someone"),
            (UriIdentifierCode::NoPrefix, "mailto:someone")
        );
        assert_eq!(UriIdentifierCode::from_repr(0x04), Some(UriIdentifierCode::Https));
    }
}
