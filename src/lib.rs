#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod badge;
pub mod error;
mod field;
pub mod ndef;
pub mod platform;
pub mod record;
mod store;
pub mod tag;

pub use badge::{Badge, RewriteReport};
pub use field::{FieldValue, SetField};
pub use record::ConfigurationRecord;
pub use store::{BACKUP_PATH, CONFIG_PATH, ConfigStore, TEMP_PATH};
pub use tag::{TagOptions, TagWriter};

extern crate alloc;
