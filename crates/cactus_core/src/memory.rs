//! Byte-addressable data memory.
//!
//! Word accesses are little-endian: the byte at the lowest address is the
//! least significant byte of the word. Every access is range checked and a
//! word access needs all four of its bytes in bounds.

use crate::DataError;

/// Flat byte array backing `LW/LB/LBU/SW/SB/FLW/FSW`.
pub struct DataMemory {
    bytes: Vec<u8>,
}

impl DataMemory {
    /// Allocates `size` zeroed bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn check(&self, addr: usize, len: usize) -> Result<(), DataError> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(DataError::AddressOutOfRange {
                addr: addr as i64,
                size: self.bytes.len(),
            }),
        }
    }

    pub fn read_byte(&self, addr: usize) -> Result<u8, DataError> {
        self.check(addr, 1)?;
        Ok(self.bytes[addr])
    }

    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), DataError> {
        self.check(addr, 1)?;
        self.bytes[addr] = value;
        Ok(())
    }

    /// Reads the word at `addr..addr + 4`.
    ///
    /// For bytes `12 34 56 78` at increasing addresses the word is `0x78563412`.
    pub fn read_word(&self, addr: usize) -> Result<u32, DataError> {
        self.check(addr, 4)?;
        let mut word = 0u32;
        for i in (0..4).rev() {
            word = (word << 8) | self.read_byte(addr + i)? as u32;
        }
        Ok(word)
    }

    pub fn write_word(&mut self, addr: usize, value: u32) -> Result<(), DataError> {
        self.check(addr, 4)?;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_byte(addr + i, byte)?;
        }
        Ok(())
    }

    /// Copies `image` into memory starting at `addr`.
    pub fn load_image(&mut self, addr: usize, image: &[u8]) -> Result<(), DataError> {
        self.check(addr, image.len())?;
        self.bytes[addr..addr + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Bytes `addr..addr + len`.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], DataError> {
        self.check(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }

    /// The whole memory contents.
    pub fn snapshot(&self) -> &[u8] {
        &self.bytes
    }
}
