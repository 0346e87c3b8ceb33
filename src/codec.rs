//! Cursor-addressed little-endian byte buffer.
//!
//! [`ByteBuffer`] wraps a fixed-capacity backing sequence and exposes the byte
//! range `[start, start + length)` through a cursor. Every multi-byte field in
//! the protocol is little-endian, so the accessors are named for their width
//! and byte order and nothing else.
//!
//! Capacity never changes after construction. A write or read that would
//! cross the end of the range fails with [`LinkError::OutOfBounds`] and leaves
//! the cursor where it was.
//!
//! ```rust
//! use eyerobot_link::codec::ByteBuffer;
//!
//! let mut buf = ByteBuffer::new([0u8; 12]);
//! buf.put_i64_le(42)?;
//! buf.put_i32_le(-7)?;
//!
//! buf.set_position(0)?;
//! assert_eq!(buf.get_i64_le()?, 42);
//! assert_eq!(buf.get_i32_le()?, -7);
//! # Ok::<(), eyerobot_link::LinkError>(())
//! ```

use crate::{LinkError, Result};

/// Fixed-capacity byte buffer with a sequential read/write cursor.
///
/// Positions passed to and returned from the buffer are relative to the
/// start of its range.
#[derive(Debug, Clone)]
pub struct ByteBuffer<B> {
    data: B,
    start: usize,
    len: usize,
    position: usize,
}

impl<B: AsRef<[u8]>> ByteBuffer<B> {
    /// Wrap the whole backing sequence.
    pub fn new(data: B) -> Self {
        let len = data.as_ref().len();
        Self { data, start: 0, len, position: 0 }
    }

    /// Wrap `length` bytes of the backing sequence starting at `start`.
    ///
    /// Fails with [`LinkError::InvalidOffset`] if the range does not fit.
    pub fn with_range(data: B, start: usize, length: usize) -> Result<Self> {
        let capacity = data.as_ref().len();
        match start.checked_add(length) {
            Some(end) if end <= capacity => Ok(Self { data, start, len: length, position: 0 }),
            _ => Err(LinkError::InvalidOffset { offset: start, start: 0, end: capacity }),
        }
    }

    /// Length of the addressable range in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the addressable range is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left between the cursor and the end of the range.
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Move the cursor. `offset == len()` is allowed and means "at the end".
    pub fn set_position(&mut self, offset: usize) -> Result<()> {
        if offset > self.len {
            return Err(LinkError::InvalidOffset { offset, start: 0, end: self.len });
        }
        self.position = offset;
        Ok(())
    }

    /// The addressable range.
    pub fn as_slice(&self) -> &[u8] {
        &self.data.as_ref()[self.start..self.start + self.len]
    }

    /// Consume the buffer and return the backing sequence.
    pub fn into_inner(self) -> B {
        self.data
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    pub fn get_i32_le(&mut self) -> Result<i32> {
        self.take().map(i32::from_le_bytes)
    }

    pub fn get_i64_le(&mut self) -> Result<i64> {
        self.take().map(i64::from_le_bytes)
    }

    pub fn get_f32_le(&mut self) -> Result<f32> {
        self.take().map(f32::from_le_bytes)
    }

    /// Copy `length` bytes from the cursor into `destination[dest_offset..]`
    /// and advance the cursor.
    pub fn copy_into(
        &mut self,
        destination: &mut [u8],
        dest_offset: usize,
        length: usize,
    ) -> Result<()> {
        let source = self.span(length)?;
        let dest_len = destination.len();
        let target = dest_offset
            .checked_add(length)
            .filter(|end| *end <= dest_len)
            .map(|end| &mut destination[dest_offset..end])
            .ok_or(LinkError::OutOfBounds { position: dest_offset, width: length, end: dest_len })?;

        target.copy_from_slice(&self.data.as_ref()[source.clone()]);
        self.position += length;
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let range = self.span(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data.as_ref()[range]);
        self.position += N;
        Ok(bytes)
    }

    /// Absolute backing range for `width` bytes at the cursor.
    fn span(&self, width: usize) -> Result<std::ops::Range<usize>> {
        if width > self.remaining() {
            return Err(LinkError::OutOfBounds { position: self.position, width, end: self.len });
        }
        let begin = self.start + self.position;
        Ok(begin..begin + width)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteBuffer<B> {
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put([value])
    }

    pub fn put_i32_le(&mut self, value: i32) -> Result<()> {
        self.put(value.to_le_bytes())
    }

    pub fn put_i64_le(&mut self, value: i64) -> Result<()> {
        self.put(value.to_le_bytes())
    }

    pub fn put_f32_le(&mut self, value: f32) -> Result<()> {
        self.put(value.to_le_bytes())
    }

    /// Write raw bytes at the cursor.
    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let range = self.span(bytes.len())?;
        self.data.as_mut()[range].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    fn put<const N: usize>(&mut self, bytes: [u8; N]) -> Result<()> {
        self.put_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_little_endian() {
        let mut buf = ByteBuffer::new([0u8; 16]);
        buf.put_i32_le(0x0102_0304).unwrap();
        buf.put_i64_le(-2).unwrap();
        buf.put_f32_le(1.0).unwrap();

        let bytes = buf.into_inner();
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..12], &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn reads_advance_the_cursor() {
        let data = [0x2A, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut buf = ByteBuffer::new(&data[..]);

        assert_eq!(buf.get_i64_le().unwrap(), 42);
        assert_eq!(buf.position(), 8);
        assert_eq!(buf.get_i32_le().unwrap(), -1);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn write_past_end_is_out_of_bounds() {
        let mut buf = ByteBuffer::new([0u8; 6]);
        buf.put_i32_le(1).unwrap();

        let err = buf.put_i32_le(2).unwrap_err();
        assert!(matches!(err, LinkError::OutOfBounds { position: 4, width: 4, end: 6 }));
        // Failed write leaves the cursor untouched
        assert_eq!(buf.position(), 4);
    }

    #[test]
    fn read_past_end_is_out_of_bounds() {
        let mut buf = ByteBuffer::new([0u8; 7]);
        assert!(matches!(buf.get_i64_le(), Err(LinkError::OutOfBounds { .. })));
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn range_restricts_access() {
        // Opcode byte followed by an 8-byte number; the buffer sees only the number
        let mut data = [0u8; 9];
        data[0] = 0x03;
        data[1] = 5;
        let mut buf = ByteBuffer::with_range(&data[..], 1, 8).unwrap();

        assert_eq!(buf.len(), 8);
        assert_eq!(buf.get_i64_le().unwrap(), 5);
        assert!(buf.get_u8().is_err());
    }

    #[test]
    fn invalid_range_is_rejected() {
        let data = [0u8; 4];
        assert!(matches!(
            ByteBuffer::with_range(&data[..], 2, 3),
            Err(LinkError::InvalidOffset { offset: 2, .. })
        ));
        assert!(ByteBuffer::with_range(&data[..], usize::MAX, 2).is_err());
    }

    #[test]
    fn set_position_checks_range() {
        let mut buf = ByteBuffer::new([0u8; 4]);
        buf.set_position(4).unwrap();
        assert_eq!(buf.remaining(), 0);

        let err = buf.set_position(5).unwrap_err();
        assert!(matches!(err, LinkError::InvalidOffset { offset: 5, start: 0, end: 4 }));
        assert_eq!(buf.position(), 4);
    }

    #[test]
    fn copy_into_splices_after_prefix() {
        let mut payload = ByteBuffer::new([0u8; 8]);
        payload.put_i64_le(0x0807_0605_0403_0201).unwrap();
        payload.set_position(0).unwrap();

        let mut datagram = [0u8; 9];
        datagram[0] = 0x02;
        payload.copy_into(&mut datagram, 1, 8).unwrap();

        assert_eq!(datagram, [0x02, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(payload.remaining(), 0);
    }

    #[test]
    fn copy_into_checks_both_sides() {
        let mut source = ByteBuffer::new([1u8; 4]);
        let mut small = [0u8; 3];
        assert!(source.copy_into(&mut small, 0, 4).is_err());
        assert!(matches!(
            source.copy_into(&mut small, 2, 2),
            Err(LinkError::OutOfBounds { position: 2, width: 2, end: 3 })
        ));
        assert_eq!(source.position(), 0);

        let mut large = [0u8; 16];
        assert!(source.copy_into(&mut large, 0, 5).is_err());
        source.copy_into(&mut large, 10, 4).unwrap();
        assert_eq!(&large[10..14], &[1, 1, 1, 1]);
    }
}
