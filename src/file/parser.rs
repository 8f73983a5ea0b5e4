//! Cursor-based byte stream parser for class files and instruction streams.
//!
//! [`crate::file::parser::Parser`] keeps a position within a borrowed byte slice and offers
//! bounds-checked big-endian reads on top of [`crate::file::io`]. The class-file codec, the
//! `Code` attribute decoder and the instruction decoder all read through it.
//!
//! # Examples
//!
//! ```rust
//! use mcsc::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), mcsc::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A cursor over a big-endian byte buffer.
///
/// The parser never reads past the end of its slice: every access is checked and fails
/// with [`crate::Error::OutOfBounds`] instead.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the buffer is allowed; nothing can be read from there.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Advance the cursor to the next multiple of `alignment`, measured from the start of the
    /// buffer.
    ///
    /// Used for the padding in front of `tableswitch` and `lookupswitch` operands, which is
    /// relative to the start of the method's code.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding runs past the end of the buffer.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - self.position % alignment) % alignment;
        self.advance_by(padding)
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Read a value of type `T` in big-endian byte order and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    /// Read a `u16` length prefix followed by that many raw bytes.
    ///
    /// This is the layout of `CONSTANT_Utf8` entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is truncated.
    pub fn read_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_be::<u16>()?;
        self.read_bytes(usize::from(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_sequential_reads() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_be::<u16>().unwrap(), 1);
        assert_eq!(parser.read_be::<u32>().unwrap(), 2);
        assert_eq!(parser.read_be::<i8>().unwrap(), -1);
        assert!(!parser.has_more_data());
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn test_seek_and_peek() {
        let data = [0x10, 0x20, 0x30];
        let mut parser = Parser::new(&data);

        parser.seek(2).unwrap();
        assert_eq!(parser.peek_byte().unwrap(), 0x30);
        assert_eq!(parser.pos(), 2);

        parser.seek(3).unwrap();
        assert!(matches!(parser.peek_byte(), Err(Error::OutOfBounds { .. })));
        assert!(parser.seek(4).is_err());
    }

    #[test]
    fn test_align() {
        let data = [0u8; 12];
        let mut parser = Parser::new(&data);

        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn test_read_bytes() {
        let data = [0x00, 0x03, b'a', b'b', b'c', b'd'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_prefixed_bytes().unwrap(), b"abc");
        assert_eq!(parser.read_bytes(1).unwrap(), b"d");
        assert!(parser.read_bytes(1).is_err());
    }

    #[test]
    fn test_truncated_prefix() {
        let data = [0x00, 0x05, b'a'];
        let mut parser = Parser::new(&data);
        assert!(matches!(
            parser.read_prefixed_bytes(),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
