//! Payload property access through the Trace Data Helper (TDH) API.
//!
//! Properties are looked up by name, so the same code works for the 32-bit
//! and 64-bit layouts of the kernel's classic event classes.

use std::ffi::OsString;
use std::os::windows::ffi::{OsStrExt, OsStringExt};

use windows::Win32::System::Diagnostics::Etw::{
    TdhGetProperty, TdhGetPropertySize, EVENT_RECORD, PROPERTY_DATA_DESCRIPTOR,
};

/// Reasons a payload property could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    /// TDH failed with this Win32 status
    Status(u32),
    /// The property has a different size than the requested type
    LengthMismatch { expected: usize, actual: usize },
}

/// Typed, by-name access to the payload of one event record
pub struct PropertyReader<'a> {
    record: &'a EVENT_RECORD,
}

impl<'a> PropertyReader<'a> {
    pub fn new(record: &'a EVENT_RECORD) -> Self {
        Self { record }
    }

    pub fn u32(&self, name: &str) -> Result<u32, PropertyError> {
        let bytes = self.fixed::<4>(name)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn u64(&self, name: &str) -> Result<u64, PropertyError> {
        let bytes = self.fixed::<8>(name)?;
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn i64(&self, name: &str) -> Result<i64, PropertyError> {
        let bytes = self.fixed::<8>(name)?;
        Ok(i64::from_le_bytes(bytes))
    }

    /// A NUL-terminated single byte string (e.g. `ImageFileName`)
    pub fn ansi_string(&self, name: &str) -> Result<String, PropertyError> {
        let bytes = self.bytes(name)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// A NUL-terminated UTF-16 string (e.g. `FileName`)
    pub fn unicode_string(&self, name: &str) -> Result<String, PropertyError> {
        let bytes = self.bytes(name)?;
        let wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|c| *c != 0)
            .collect();
        Ok(OsString::from_wide(&wide).to_string_lossy().into_owned())
    }

    fn fixed<const N: usize>(&self, name: &str) -> Result<[u8; N], PropertyError> {
        let bytes = self.bytes(name)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| PropertyError::LengthMismatch {
                expected: N,
                actual: bytes.len(),
            })
    }

    fn bytes(&self, name: &str) -> Result<Vec<u8>, PropertyError> {
        let utf16_name: Vec<u16> = std::ffi::OsStr::new(name)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let descriptor = PROPERTY_DATA_DESCRIPTOR {
            PropertyName: utf16_name.as_ptr() as u64,
            ArrayIndex: u32::MAX,
            Reserved: 0,
        };

        let mut size = 0u32;
        let status = unsafe { TdhGetPropertySize(self.record, None, &[descriptor], &mut size) };
        if status != 0 {
            return Err(PropertyError::Status(status));
        }

        let mut buffer = vec![0u8; size as usize];
        let status = unsafe { TdhGetProperty(self.record, None, &[descriptor], &mut buffer) };
        if status != 0 {
            return Err(PropertyError::Status(status));
        }

        Ok(buffer)
    }
}
