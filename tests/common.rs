#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::{ReadStorage, Storage};
use sao_badge::platform::{Entropy, FileSystem, GpoEvents, TagDevice, Watchdog};
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Mount,
    Exists { path: String },
    Read { path: String },
    Write { path: String, len: usize },
    Remove { path: String },
    Rename { from: String, to: String },
}

#[derive(Debug)]
pub struct DiskError;

/// In-memory flat filesystem. Renames do not overwrite, like FAT.
#[derive(Clone)]
pub struct Disk {
    pub files: BTreeMap<String, Vec<u8>>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
    pub unformatted: bool,
    /// The next rename away from this path fails once.
    pub failing_rename_from: Option<String>,
}

impl Disk {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            fail_after_operation: usize::MAX,
            operations: Vec::new(),
            unformatted: false,
            failing_rename_from: None,
        }
    }

    pub fn new_with_fault(fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new()
        }
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    /// Fails the `n`th operation from now and every one after it.
    pub fn fail_in(&mut self, n: usize) {
        self.fail_after_operation = self.operations.len() + n;
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files
            .get(path)
            .map(|content| std::str::from_utf8(content).unwrap())
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    Operation::Write { .. } | Operation::Remove { .. } | Operation::Rename { .. }
                )
            })
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn record(&mut self, op: Operation) -> Result<(), DiskError> {
        println!("    disk: {op:?} #{:>2}", self.operations.len());
        if self.operations.len() >= self.fail_after_operation {
            println!("    disk: FAULT");
            return Err(DiskError);
        }
        self.operations.push(op);
        Ok(())
    }
}

impl FileSystem for Disk {
    type Error = DiskError;

    fn mount(&mut self) -> Result<(), Self::Error> {
        self.record(Operation::Mount)?;
        if self.unformatted {
            return Err(DiskError);
        }
        Ok(())
    }

    fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        self.record(Operation::Exists {
            path: path.to_string(),
        })?;
        Ok(self.files.contains_key(path))
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        self.record(Operation::Read {
            path: path.to_string(),
        })?;
        self.files.get(path).cloned().ok_or(DiskError)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), Self::Error> {
        if self
            .record(Operation::Write {
                path: path.to_string(),
                len: data.len(),
            })
            .is_err()
        {
            // power lost halfway through the write
            self.files
                .insert(path.to_string(), data[..data.len() / 2].to_vec());
            return Err(DiskError);
        }
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        self.record(Operation::Remove {
            path: path.to_string(),
        })?;
        self.files.remove(path).map(|_| ()).ok_or(DiskError)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        self.record(Operation::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        if self.failing_rename_from.as_deref() == Some(from) {
            self.failing_rename_from = None;
            return Err(DiskError);
        }
        if self.files.contains_key(to) {
            return Err(DiskError);
        }
        let content = self.files.remove(from).ok_or(DiskError)?;
        self.files.insert(to.to_string(), content);
        Ok(())
    }
}

pub const EEPROM_SIZE: usize = 2048;
pub const MAX_TRANSFER: usize = 32;

#[derive(Debug, PartialEq, Clone)]
pub enum Transfer {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
}

#[derive(Debug)]
pub struct EepromError;

/// ST25DV-like tag: EEPROM behind a bus limited to `MAX_TRANSFER` bytes per transaction.
pub struct Eeprom {
    pub buf: Vec<u8>,
    pub present: bool,
    pub accepts_password: bool,
    pub session_open: bool,
    pub interrupt_events: Option<GpoEvents>,
    pub fail_after_operation: usize,
    pub transfers: Vec<Transfer>,
}

impl Eeprom {
    pub fn new() -> Self {
        Self {
            buf: vec![0xA5; EEPROM_SIZE],
            present: true,
            accepts_password: true,
            session_open: false,
            interrupt_events: None,
            fail_after_operation: usize::MAX,
            transfers: Vec::new(),
        }
    }

    pub fn new_with_fault(fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new()
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn writes(&self) -> Vec<(u32, usize)> {
        self.transfers
            .iter()
            .filter_map(|t| match t {
                Transfer::Write { offset, len } => Some((*offset, *len)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, transfer: Transfer) -> Result<(), EepromError> {
        if self.transfers.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromError);
        }
        self.transfers.push(transfer);
        Ok(())
    }
}

impl ReadStorage for Eeprom {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(bytes.len() <= MAX_TRANSFER);
        self.record(Transfer::Read {
            offset,
            len: bytes.len(),
        })?;
        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Storage for Eeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(bytes.len() <= MAX_TRANSFER);
        assert!(!bytes.is_empty());
        self.record(Transfer::Write {
            offset,
            len: bytes.len(),
        })?;
        let offset = offset as usize;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl TagDevice for Eeprom {
    const MAX_TRANSFER: usize = MAX_TRANSFER;

    fn is_present(&mut self) -> bool {
        self.present
    }

    fn open_security_session(&mut self, password: &[u8; 8]) -> Result<bool, Self::Error> {
        self.session_open = self.accepts_password && *password == [0; 8];
        Ok(self.session_open)
    }

    fn set_interrupt_events(&mut self, events: GpoEvents) -> Result<(), Self::Error> {
        if !self.session_open {
            return Err(EepromError);
        }
        self.interrupt_events = Some(events);
        Ok(())
    }
}

/// Hands out the given values in turn.
pub struct Dice(pub Vec<u32>);

impl Entropy for Dice {
    fn next_u32(&mut self) -> u32 {
        let value = self.0[0];
        self.0.rotate_left(1);
        value
    }
}

#[derive(Default)]
pub struct Kicks(pub usize);

impl Watchdog for Kicks {
    fn feed(&mut self) {
        self.0 += 1;
    }
}
