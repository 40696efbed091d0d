//! The configuration record and its JSON document form.
//!
//! Every field is described once in [`FIELDS`]: its document key, its fallback and how to reach
//! it inside [`ConfigurationRecord`]. Decoding walks that table, so a field that is missing from
//! an older document, or holds a value of the wrong type, takes its fallback instead of failing
//! the whole document. New fields only need a new table row.

use crate::error::FieldKind;
use alloc::string::{String, ToString};
use core::fmt;
use serde_json::{Map, Value};

pub const NUM_ANIMATION_COLORS: usize = 25;

/// Document synthesized on first boot.
pub const DEFAULT_DOCUMENT: &str = r#"{
  "version": 1,
  "deviceName": "SkullOfFate",
  "accel_calibration": {
    "x": 0,
    "y": 0,
    "z": 0
  },
  "defaultAnimation": 0,
  "defaulti2cAddress": 19,
  "alternatei2cAddress1": 19,
  "alternatei2cAddress2": 20,
  "alternatei2cAddress3": 21,
  "mic_calibration": 0,
  "mag_calibration": 0,
  "rfid_calibration": 0,
  "extra1": 0,
  "extra2": 0,
  "extra3": 0,
  "extra4": 0,
  "extra5": 0,
  "neopixelmaxbrightness": 10,
  "watchdogmaxtimeout": 8000,
  "animation1_color": 0,
  "animation2_color": 0,
  "animation3_color": 0,
  "animation4_color": 0,
  "animation5_color": 0,
  "animation6_color": 0,
  "animation7_color": 0,
  "animation8_color": 0,
  "animation9_color": 0,
  "animation10_color": 0,
  "animation11_color": 0,
  "animation12_color": 0,
  "animation13_color": 0,
  "animation14_color": 0,
  "animation15_color": 0,
  "animation16_color": 0,
  "animation17_color": 0,
  "animation18_color": 0,
  "animation19_color": 0,
  "animation20_color": 0,
  "animation21_color": 0,
  "animation22_color": 0,
  "animation23_color": 0,
  "animation24_color": 0,
  "animation25_color": 0
}"#;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisCalibration {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Operator-tunable state of the badge. Always fully populated; see [`FIELDS`] for the
/// fallback of each field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationRecord {
    pub version: i32,
    pub device_name: String,
    pub accel_calibration: AxisCalibration,
    pub default_animation: i32,
    pub default_i2c_address: i32,
    pub alternate_i2c_address1: i32,
    pub alternate_i2c_address2: i32,
    pub alternate_i2c_address3: i32,
    pub mic_calibration: i32,
    pub mag_calibration: i32,
    pub rfid_calibration: i32,
    pub extra1: i32,
    pub extra2: i32,
    pub extra3: i32,
    pub extra4: i32,
    pub extra5: i32,
    pub neopixel_max_brightness: i32,
    pub watchdog_max_timeout: i32,
    /// `animation_colors[0]` is `animation1_color` in the document.
    pub animation_colors: [i32; NUM_ANIMATION_COLORS],
}

/// Compiled fallback of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Integer(i32),
    Text(&'static str),
}

impl Fallback {
    pub fn kind(&self) -> FieldKind {
        match self {
            Fallback::Integer(_) => FieldKind::Integer,
            Fallback::Text(_) => FieldKind::Text,
        }
    }
}

pub(crate) enum Slot<'a> {
    Integer(&'a mut i32),
    Text(&'a mut String),
}

impl<'a> From<&'a mut i32> for Slot<'a> {
    fn from(value: &'a mut i32) -> Self {
        Slot::Integer(value)
    }
}

impl<'a> From<&'a mut String> for Slot<'a> {
    fn from(value: &'a mut String) -> Self {
        Slot::Text(value)
    }
}

pub(crate) enum FieldRef<'a> {
    Integer(i32),
    Text(&'a str),
}

impl<'a> From<&'a i32> for FieldRef<'a> {
    fn from(value: &'a i32) -> Self {
        FieldRef::Integer(*value)
    }
}

impl<'a> From<&'a String> for FieldRef<'a> {
    fn from(value: &'a String) -> Self {
        FieldRef::Text(value)
    }
}

impl From<FieldRef<'_>> for Value {
    fn from(value: FieldRef<'_>) -> Self {
        match value {
            FieldRef::Integer(v) => Value::from(v),
            FieldRef::Text(v) => Value::from(v),
        }
    }
}

impl fmt::Display for FieldRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Integer(v) => write!(f, "{v}"),
            FieldRef::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One row of the field table.
pub struct FieldSpec {
    /// Document key. Nested objects are addressed with a dot, e.g. `accel_calibration.x`.
    pub key: &'static str,
    pub fallback: Fallback,
    get: for<'a> fn(&'a ConfigurationRecord) -> FieldRef<'a>,
    slot: for<'a> fn(&'a mut ConfigurationRecord) -> Slot<'a>,
}

impl FieldSpec {
    pub fn kind(&self) -> FieldKind {
        self.fallback.kind()
    }

    fn reset(&self, record: &mut ConfigurationRecord) {
        match ((self.slot)(record), self.fallback) {
            (Slot::Integer(slot), Fallback::Integer(v)) => *slot = v,
            (Slot::Text(slot), Fallback::Text(v)) => *slot = v.to_string(),
            // the table below never pairs a slot with a fallback of another kind
            _ => {}
        }
    }

    /// Takes the value from `value` if it has the right type, the fallback otherwise.
    fn decode(&self, record: &mut ConfigurationRecord, value: Option<&Value>) {
        let taken = match ((self.slot)(record), value) {
            (Slot::Integer(slot), Some(value)) => match value.as_i64().map(i32::try_from) {
                Some(Ok(v)) => {
                    *slot = v;
                    true
                }
                _ => false,
            },
            (Slot::Text(slot), Some(Value::String(v))) => {
                slot.clone_from(v);
                true
            }
            _ => false,
        };

        if !taken {
            self.reset(record);
        }
    }
}

macro_rules! field {
    ($key:literal => [$($place:tt)+], $fallback:expr) => {
        FieldSpec {
            key: $key,
            fallback: $fallback,
            get: |r| FieldRef::from(&r.$($place)+),
            slot: |r| Slot::from(&mut r.$($place)+),
        }
    };
}

use Fallback::{Integer, Text};

pub static FIELDS: &[FieldSpec] = &[
    field!("version" => [version], Integer(1)),
    field!("deviceName" => [device_name], Text("SkullOfFate")),
    field!("accel_calibration.x" => [accel_calibration.x], Integer(0)),
    field!("accel_calibration.y" => [accel_calibration.y], Integer(0)),
    field!("accel_calibration.z" => [accel_calibration.z], Integer(0)),
    field!("defaultAnimation" => [default_animation], Integer(0)),
    field!("defaulti2cAddress" => [default_i2c_address], Integer(18)),
    field!("alternatei2cAddress1" => [alternate_i2c_address1], Integer(19)),
    field!("alternatei2cAddress2" => [alternate_i2c_address2], Integer(20)),
    field!("alternatei2cAddress3" => [alternate_i2c_address3], Integer(21)),
    field!("mic_calibration" => [mic_calibration], Integer(0)),
    field!("mag_calibration" => [mag_calibration], Integer(0)),
    field!("rfid_calibration" => [rfid_calibration], Integer(0)),
    field!("extra1" => [extra1], Integer(0)),
    field!("extra2" => [extra2], Integer(0)),
    field!("extra3" => [extra3], Integer(0)),
    field!("extra4" => [extra4], Integer(0)),
    field!("extra5" => [extra5], Integer(0)),
    field!("neopixelmaxbrightness" => [neopixel_max_brightness], Integer(255)),
    field!("watchdogmaxtimeout" => [watchdog_max_timeout], Integer(5000)),
    field!("animation1_color" => [animation_colors[0]], Integer(0)),
    field!("animation2_color" => [animation_colors[1]], Integer(0)),
    field!("animation3_color" => [animation_colors[2]], Integer(0)),
    field!("animation4_color" => [animation_colors[3]], Integer(0)),
    field!("animation5_color" => [animation_colors[4]], Integer(0)),
    field!("animation6_color" => [animation_colors[5]], Integer(0)),
    field!("animation7_color" => [animation_colors[6]], Integer(0)),
    field!("animation8_color" => [animation_colors[7]], Integer(0)),
    field!("animation9_color" => [animation_colors[8]], Integer(0)),
    field!("animation10_color" => [animation_colors[9]], Integer(0)),
    field!("animation11_color" => [animation_colors[10]], Integer(0)),
    field!("animation12_color" => [animation_colors[11]], Integer(0)),
    field!("animation13_color" => [animation_colors[12]], Integer(0)),
    field!("animation14_color" => [animation_colors[13]], Integer(0)),
    field!("animation15_color" => [animation_colors[14]], Integer(0)),
    field!("animation16_color" => [animation_colors[15]], Integer(0)),
    field!("animation17_color" => [animation_colors[16]], Integer(0)),
    field!("animation18_color" => [animation_colors[17]], Integer(0)),
    field!("animation19_color" => [animation_colors[18]], Integer(0)),
    field!("animation20_color" => [animation_colors[19]], Integer(0)),
    field!("animation21_color" => [animation_colors[20]], Integer(0)),
    field!("animation22_color" => [animation_colors[21]], Integer(0)),
    field!("animation23_color" => [animation_colors[22]], Integer(0)),
    field!("animation24_color" => [animation_colors[23]], Integer(0)),
    field!("animation25_color" => [animation_colors[24]], Integer(0)),
];

/// Looks up the table row for a document key.
pub fn field_spec(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.key == key)
}

/// Resolves a dotted key inside a document.
pub(crate) fn lookup<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(document, |value, segment| value.as_object()?.get(segment))
}

/// Resolves a dotted key inside a document for assignment. Only existing keys are returned.
pub(crate) fn lookup_mut<'a>(document: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    key.split('.')
        .try_fold(document, |value, segment| value.as_object_mut()?.get_mut(segment))
}

fn insert(document: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            document.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = document
                .entry(head)
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                insert(child, rest, value);
            }
        }
    }
}

impl Default for ConfigurationRecord {
    /// The record made of every field's compiled fallback.
    fn default() -> Self {
        let mut record = Self {
            version: 0,
            device_name: String::new(),
            accel_calibration: AxisCalibration::default(),
            default_animation: 0,
            default_i2c_address: 0,
            alternate_i2c_address1: 0,
            alternate_i2c_address2: 0,
            alternate_i2c_address3: 0,
            mic_calibration: 0,
            mag_calibration: 0,
            rfid_calibration: 0,
            extra1: 0,
            extra2: 0,
            extra3: 0,
            extra4: 0,
            extra5: 0,
            neopixel_max_brightness: 0,
            watchdog_max_timeout: 0,
            animation_colors: [0; NUM_ANIMATION_COLORS],
        };
        for spec in FIELDS {
            spec.reset(&mut record);
        }
        record
    }
}

impl ConfigurationRecord {
    /// Builds a record from a parsed document, field by field.
    pub fn from_document(document: &Value) -> Self {
        let mut record = Self::default();
        for spec in FIELDS {
            spec.decode(&mut record, lookup(document, spec.key));
        }
        record
    }

    /// Encodes the complete record as one self-contained document.
    pub fn to_document(&self) -> Value {
        let mut document = Map::new();
        for spec in FIELDS {
            insert(&mut document, spec.key, (spec.get)(self).into());
        }
        Value::Object(document)
    }
}

impl fmt::Display for ConfigurationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for spec in FIELDS {
            writeln!(f, "{}: {}", spec.key, (spec.get)(self))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_the_field_table() {
        let record = ConfigurationRecord::default();
        assert_eq!(record.version, 1);
        assert_eq!(record.device_name, "SkullOfFate");
        assert_eq!(record.default_i2c_address, 18);
        assert_eq!(record.neopixel_max_brightness, 255);
        assert_eq!(record.watchdog_max_timeout, 5000);
        assert_eq!(record.animation_colors, [0; NUM_ANIMATION_COLORS]);
    }

    #[test]
    fn default_document_differs_from_fallbacks() {
        let document: Value = serde_json::from_str(DEFAULT_DOCUMENT).unwrap();
        let record = ConfigurationRecord::from_document(&document);
        assert_eq!(record.default_i2c_address, 19);
        assert_eq!(record.neopixel_max_brightness, 10);
        assert_eq!(record.watchdog_max_timeout, 8000);
    }

    #[test]
    fn default_document_covers_every_field() {
        let document: Value = serde_json::from_str(DEFAULT_DOCUMENT).unwrap();
        for spec in FIELDS {
            assert!(lookup(&document, spec.key).is_some(), "{}", spec.key);
        }
    }

    #[test]
    fn nested_keys_are_written_as_objects() {
        let mut record = ConfigurationRecord::default();
        record.accel_calibration = AxisCalibration { x: 1, y: -2, z: 3 };
        record.animation_colors[24] = 0xFF00FF;

        let document = record.to_document();
        assert_eq!(document["accel_calibration"]["y"], Value::from(-2));
        assert_eq!(document["animation25_color"], Value::from(0xFF00FF));
        assert_eq!(ConfigurationRecord::from_document(&document), record);
    }

    #[test]
    fn mistyped_values_take_the_fallback() {
        let document: Value = serde_json::from_str(
            r#"{"version": "two", "deviceName": 7, "extra1": 4294967296, "extra2": 12}"#,
        )
        .unwrap();
        let record = ConfigurationRecord::from_document(&document);
        assert_eq!(record.version, 1);
        assert_eq!(record.device_name, "SkullOfFate");
        assert_eq!(record.extra1, 0);
        assert_eq!(record.extra2, 12);
    }

    #[test]
    fn every_key_is_unique() {
        for (i, a) in FIELDS.iter().enumerate() {
            for b in &FIELDS[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }
}
