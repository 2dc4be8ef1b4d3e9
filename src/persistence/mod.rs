//! Binary save/resume
//!
//! Fixed-order records, big-endian:
//! - `f32` as IEEE-754 single precision
//! - `bool` as one byte (0 / 1)
//! - strings as a `u16` byte length followed by UTF-8
//! - `Vec3` as 3 floats, `Mat4` as 16 floats (column-major)
//!
//! There is no versioning or length prefixing of records. Reordering a field
//! breaks every existing snapshot.

use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

use glam::{Mat4, Vec3};
use thiserror::Error;

/// Errors raised while writing or reading a snapshot
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tag of {0} bytes does not fit a u16 length prefix")]
    TagTooLong(usize),

    #[error("Tag is not valid UTF-8: {0}")]
    InvalidTag(#[from] FromUtf8Error),

    #[error("Unknown motion variant: {0}")]
    UnknownMotion(String),

    #[error("Unknown satellite transformation '{0}' ahead of further records")]
    UnknownSpin(String),

    #[error("Negative record count: {0}")]
    NegativeCount(i32),
}

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// State that can be written to and read back from a binary stream
///
/// `restore` must read exactly the fields `persist` writes, in the same order.
pub trait Persistable {
    fn persist(&self, out: &mut dyn Write) -> PersistResult<()>;
    fn restore(&mut self, input: &mut dyn Read) -> PersistResult<()>;
}

/// Primitive writers for the snapshot format
pub trait WriteExt: Write {
    fn write_f32(&mut self, value: f32) -> PersistResult<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> PersistResult<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> PersistResult<()> {
        self.write_all(&[value as u8])?;
        Ok(())
    }

    fn write_utf(&mut self, value: &str) -> PersistResult<()> {
        let len = u16::try_from(value.len()).map_err(|_| PersistError::TagTooLong(value.len()))?;
        self.write_all(&len.to_be_bytes())?;
        self.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_vec3(&mut self, v: Vec3) -> PersistResult<()> {
        for c in v.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    fn write_mat4(&mut self, m: &Mat4) -> PersistResult<()> {
        for c in m.to_cols_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

/// Primitive readers for the snapshot format
pub trait ReadExt: Read {
    fn read_f32(&mut self) -> PersistResult<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> PersistResult<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Any non-zero byte reads as `true`
    fn read_bool(&mut self) -> PersistResult<bool> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }

    fn read_utf(&mut self) -> PersistResult<String> {
        let mut len = [0u8; 2];
        self.read_exact(&mut len)?;
        let mut bytes = vec![0u8; u16::from_be_bytes(len) as usize];
        self.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_vec3(&mut self) -> PersistResult<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    fn read_mat4(&mut self) -> PersistResult<Mat4> {
        let mut cols = [0.0f32; 16];
        for c in cols.iter_mut() {
            *c = self.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Snapshot a single record into a byte buffer
pub fn to_bytes<P: Persistable + ?Sized>(record: &P) -> PersistResult<Vec<u8>> {
    let mut buf = Vec::new();
    record.persist(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_float_layout_is_big_endian() {
        let mut buf = Vec::new();
        buf.write_f32(1.0).unwrap();
        assert_eq!(buf, vec![0x3f, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_utf_has_u16_length_prefix() {
        let mut buf = Vec::new();
        buf.write_utf("orbit").unwrap();
        assert_eq!(&buf[..2], &[0, 5]);
        assert_eq!(&buf[2..], b"orbit");

        let tag = Cursor::new(buf).read_utf().unwrap();
        assert_eq!(tag, "orbit");
    }

    #[test]
    fn test_overlong_tag_rejected() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let mut buf = Vec::new();
        assert!(matches!(buf.write_utf(&long), Err(PersistError::TagTooLong(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_mat4_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        let mut buf = Vec::new();
        buf.write_mat4(&m).unwrap();
        assert_eq!(buf.len(), 64);

        // translation lives in the fourth column (floats 12..15)
        let mut cursor = Cursor::new(&buf[48..]);
        assert_eq!(cursor.read_f32().unwrap(), 7.0);
        assert_eq!(cursor.read_f32().unwrap(), 8.0);
        assert_eq!(cursor.read_f32().unwrap(), 9.0);
        assert_eq!(cursor.read_f32().unwrap(), 1.0);
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let mut cursor = Cursor::new(vec![0x3f, 0x80]);
        assert!(matches!(cursor.read_f32(), Err(PersistError::Io(_))));
    }

    #[test]
    fn test_invalid_utf8_tag() {
        let mut cursor = Cursor::new(vec![0, 2, 0xff, 0xfe]);
        assert!(matches!(cursor.read_utf(), Err(PersistError::InvalidTag(_))));
    }
}
