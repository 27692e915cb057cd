//! Fixed-capacity tile command buffers
//!
//! A [`TileBuffer`] is the producer side: an append-only byte region with a
//! write cursor. A [`TileView`] is the consumer side: a read-only slice of the
//! written bytes that can be decoded any number of times.
//!
//! Capacity is checked before every write. Commands other than `End` keep
//! [`END_LEN`] bytes in reserve, so a buffer that accepted a command can always
//! be terminated and a rejected append never leaves a partial record behind.

use crate::command::{Command, END_LEN};
use finetile_core::{TileError, TileResult, TILE_BUF_SIZE};
use glam::Vec2;
use smallvec::SmallVec;
use std::iter::FusedIterator;

/// Backing memory for a tile buffer.
///
/// The encoder only needs a byte slice, so the same code runs over a stack
/// array in tests, a heap allocation, or a window into a grid-wide arena.
pub trait TileStorage {
    /// The whole backing region
    fn bytes(&self) -> &[u8];

    /// The whole backing region, mutably
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl<const N: usize> TileStorage for [u8; N] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl TileStorage for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl TileStorage for Box<[u8]> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl TileStorage for &mut [u8] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// Append-only command buffer for one tile
#[derive(Debug, Clone)]
pub struct TileBuffer<S = [u8; TILE_BUF_SIZE]> {
    storage: S,
    len: usize,
    terminated: bool,
}

impl TileBuffer<[u8; TILE_BUF_SIZE]> {
    /// Empty buffer with the default per-tile budget
    pub fn new() -> Self {
        Self::with_storage([0; TILE_BUF_SIZE])
    }
}

impl Default for TileBuffer<[u8; TILE_BUF_SIZE]> {
    fn default() -> Self {
        Self::new()
    }
}

impl TileBuffer<Box<[u8]>> {
    /// Empty heap-backed buffer with `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_storage(vec![0; capacity].into_boxed_slice())
    }
}

impl<S: TileStorage> TileBuffer<S> {
    /// Empty buffer over `storage`; its whole length is the capacity.
    ///
    /// Existing contents are ignored: only bytes written through this buffer
    /// are ever decoded.
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            len: 0,
            terminated: false,
        }
    }

    /// Fixed byte budget
    pub fn capacity(&self) -> usize {
        self.storage.bytes().len()
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes still unwritten
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Whether `End` has been appended
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Append one command at the cursor.
    ///
    /// On error the buffer is unchanged.
    pub fn append(&mut self, command: Command) -> TileResult<()> {
        if self.terminated {
            return Err(TileError::AlreadyTerminated);
        }

        let needed = command.encoded_len();
        let reserve = if command.is_end() { 0 } else { END_LEN };
        let available = self.remaining().saturating_sub(reserve);
        if needed > available {
            return Err(TileError::CapacityExceeded {
                needed,
                remaining: available,
                capacity: self.capacity(),
            });
        }

        let start = self.len;
        let written = command.encode_into(&mut self.storage.bytes_mut()[start..start + needed])?;
        self.len += written;
        self.terminated = command.is_end();
        Ok(())
    }

    /// Append a stroked segment
    pub fn segment(
        &mut self,
        a: impl Into<Vec2>,
        b: impl Into<Vec2>,
        width: f32,
    ) -> TileResult<()> {
        self.append(Command::segment(a, b, width))
    }

    /// Append a fill edge
    pub fn line_fill(&mut self, a: impl Into<Vec2>, b: impl Into<Vec2>) -> TileResult<()> {
        self.append(Command::line_fill(a, b))
    }

    /// Append a quadratic fill edge
    pub fn bez_fill(
        &mut self,
        a: impl Into<Vec2>,
        b: impl Into<Vec2>,
        c: impl Into<Vec2>,
    ) -> TileResult<()> {
        self.append(Command::bez_fill(a, b, c))
    }

    /// Append a color change
    pub fn solid(&mut self, color: i32) -> TileResult<()> {
        self.append(Command::solid(color))
    }

    /// Terminate the sequence
    pub fn end(&mut self) -> TileResult<()> {
        self.append(Command::End)
    }

    /// Logically empty the buffer for the next pass
    pub fn reset(&mut self) {
        self.len = 0;
        self.terminated = false;
    }

    /// Replace the contents with bytes produced elsewhere.
    ///
    /// The bytes are not validated; decode errors surface when the tile is
    /// read. The buffer is treated as terminated and accepts no appends.
    pub fn load(&mut self, bytes: &[u8]) -> TileResult<()> {
        let capacity = self.capacity();
        if bytes.len() > capacity {
            return Err(TileError::CapacityExceeded {
                needed: bytes.len(),
                remaining: capacity,
                capacity,
            });
        }

        self.storage.bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        self.terminated = true;
        Ok(())
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[..self.len]
    }

    /// Read-only view for consumers
    pub fn view(&self) -> TileView<'_> {
        TileView {
            bytes: self.as_bytes(),
        }
    }

    /// Decode the written commands
    pub fn decode(&self) -> Decoder<'_> {
        self.view().decode()
    }

    /// Give back the backing storage
    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Read-only view of a tile's written command bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileView<'a> {
    bytes: &'a [u8],
}

impl<'a> TileView<'a> {
    /// View the first `len` bytes of a tile region
    pub fn new(bytes: &'a [u8], len: usize) -> TileResult<Self> {
        match bytes.get(..len) {
            Some(bytes) => Ok(Self { bytes }),
            None => Err(TileError::CapacityExceeded {
                needed: len,
                remaining: bytes.len(),
                capacity: bytes.len(),
            }),
        }
    }

    /// Written length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the view holds no bytes (and so no `End`)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw written bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Walk the commands from offset 0
    pub fn decode(&self) -> Decoder<'a> {
        Decoder {
            bytes: self.bytes,
            offset: 0,
            done: false,
        }
    }

    /// Decode the whole sequence once, `End` included
    pub fn commands(&self) -> TileResult<SmallVec<[Command; 8]>> {
        self.decode().collect()
    }
}

/// Sequential decoder over a tile's command bytes.
///
/// Yields commands up to and including `End`, or a single error, then stops.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl Decoder<'_> {
    /// Byte offset of the next command
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for Decoder<'_> {
    type Item = TileResult<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match Command::decode_at(self.bytes, self.offset) {
            Ok((command, len)) => {
                self.offset += len;
                self.done = command.is_end();
                Some(Ok(command))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Decoder<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let tile = TileBuffer::new();
        assert_eq!(tile.capacity(), 64);
        assert!(tile.is_empty());
        assert!(!tile.is_terminated());
        assert_eq!(tile.as_bytes(), &[] as &[u8]);
    }

    #[test]
    fn test_cursor_advances_by_encoded_length() {
        let mut tile = TileBuffer::new();
        tile.solid(1).unwrap();
        assert_eq!(tile.len(), 8);
        tile.line_fill((0.0, 0.0), (1.0, 1.0)).unwrap();
        assert_eq!(tile.len(), 20);
        tile.bez_fill((0.0, 0.0), (1.0, 1.0), (2.0, 0.0)).unwrap();
        assert_eq!(tile.len(), 36);
        tile.segment((0.0, 0.0), (1.0, 1.0), 0.5).unwrap();
        assert_eq!(tile.len(), 52);
        tile.end().unwrap();
        assert_eq!(tile.len(), 56);
        assert!(tile.is_terminated());
    }

    #[test]
    fn test_append_after_end_fails() {
        let mut tile = TileBuffer::new();
        tile.end().unwrap();
        assert_eq!(tile.solid(1), Err(TileError::AlreadyTerminated));
        assert_eq!(tile.end(), Err(TileError::AlreadyTerminated));
        assert_eq!(tile.len(), 4);
    }

    #[test]
    fn test_end_reserve_is_kept() {
        let mut tile = TileBuffer::with_capacity(12);
        // 8 + 4 reserved: fits exactly.
        tile.solid(1).unwrap();
        let err = tile.solid(2).unwrap_err();
        assert_eq!(
            err,
            TileError::CapacityExceeded {
                needed: 8,
                remaining: 0,
                capacity: 12
            }
        );
        tile.end().unwrap();
        assert_eq!(tile.remaining(), 0);
    }

    #[test]
    fn test_capacity_too_small_for_end() {
        let mut tile = TileBuffer::with_storage([0u8; 2]);
        assert!(matches!(
            tile.end(),
            Err(TileError::CapacityExceeded { needed: 4, .. })
        ));
    }

    #[test]
    fn test_reset_reuses_storage() {
        let mut tile = TileBuffer::new();
        tile.solid(4).unwrap();
        tile.end().unwrap();
        tile.reset();
        assert!(tile.is_empty());
        assert!(!tile.is_terminated());
        tile.solid(5).unwrap();
        tile.end().unwrap();
        let commands = tile.view().commands().unwrap();
        assert_eq!(commands.as_slice(), &[Command::solid(5), Command::End]);
    }

    #[test]
    fn test_stale_bytes_are_not_decoded() {
        let mut tile = TileBuffer::new();
        tile.solid(4).unwrap();
        tile.end().unwrap();
        tile.reset();
        tile.solid(9).unwrap();

        // The old End is still in memory past the cursor; it must not count.
        let decoded: Vec<_> = tile.decode().collect();
        assert_eq!(
            decoded,
            vec![
                Ok(Command::solid(9)),
                Err(TileError::UnterminatedBuffer { offset: 8 })
            ]
        );
    }

    #[test]
    fn test_decoder_tracks_offset_and_fuses() {
        let mut tile = TileBuffer::new();
        tile.solid(1).unwrap();
        tile.line_fill((0.0, 0.0), (4.0, 4.0)).unwrap();
        tile.end().unwrap();

        let mut decoder = tile.decode();
        assert_eq!(decoder.offset(), 0);
        decoder.next();
        assert_eq!(decoder.offset(), 8);
        decoder.next();
        assert_eq!(decoder.offset(), 20);
        assert_eq!(decoder.next(), Some(Ok(Command::End)));
        assert_eq!(decoder.offset(), tile.len());
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn test_slice_storage() {
        let mut arena = [0u8; 32];
        {
            let (first, _) = arena.split_at_mut(16);
            let mut tile = TileBuffer::with_storage(first);
            tile.solid(3).unwrap();
            tile.end().unwrap();
        }
        let view = TileView::new(&arena[..16], 12).unwrap();
        assert_eq!(
            view.commands().unwrap().as_slice(),
            &[Command::solid(3), Command::End]
        );
    }

    #[test]
    fn test_view_length_checked() {
        let bytes = [0u8; 8];
        assert!(TileView::new(&bytes, 8).is_ok());
        assert!(TileView::new(&bytes, 9).is_err());
    }

    #[test]
    fn test_load_makes_buffer_read_only() {
        let mut source = TileBuffer::new();
        source.solid(2).unwrap();
        source.end().unwrap();

        let mut tile = TileBuffer::with_capacity(64);
        tile.load(source.as_bytes()).unwrap();
        assert!(tile.is_terminated());
        assert_eq!(tile.as_bytes(), source.as_bytes());
        assert_eq!(tile.solid(1), Err(TileError::AlreadyTerminated));

        let mut small = TileBuffer::with_capacity(8);
        assert!(small.load(source.as_bytes()).is_err());
        assert!(small.is_empty());
    }

    #[test]
    fn test_empty_view_is_unterminated() {
        let tile = TileBuffer::new();
        let mut decoder = tile.decode();
        assert_eq!(
            decoder.next(),
            Some(Err(TileError::UnterminatedBuffer { offset: 0 }))
        );
        assert_eq!(decoder.next(), None);
    }
}
