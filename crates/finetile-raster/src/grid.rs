//! Tile grid and pass lifecycle
//!
//! A [`TileGrid`] owns one fixed-capacity buffer per tile, carved out of a
//! single arena. Producers bin commands into it; [`TileGrid::seal`] hands the
//! arena to readers as a [`SealedGrid`], and [`SealedGrid::reset`] gives it
//! back for the next pass. The split is enforced by ownership, so no tile can
//! be written while it is being evaluated.

use crate::buffer::{TileBuffer, TileView};
use crate::command::{Command, Op, END_LEN};
use finetile_core::logging::LogCategory;
use finetile_core::{
    finetile_debug, finetile_warn, finetile_warn_rate_limited, ErrorContext, FinetileError, OverflowPolicy,
    Result, TileConfig, TileCoord, TileError, TileResult,
};
use std::collections::HashMap;

/// Outcome of binning one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Nothing binned this pass; holds only `End`.
    Empty,
    /// Every command fit.
    Encoded,
    /// Overflowed under [`OverflowPolicy::Truncate`]; `dropped` commands lost.
    Truncated { dropped: usize },
    /// Overflowed under [`OverflowPolicy::Fallback`], or held a point outside
    /// the fixed-point range under either policy; rendered from the retained
    /// command list instead of the buffer.
    Fallback,
    /// Bytes installed with [`TileGrid::load_raw`], not validated.
    Raw,
}

/// Grid dimensions shared by both phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    width_px: u32,
    height_px: u32,
    width_tiles: u32,
    height_tiles: u32,
    tile_size: u32,
    capacity: usize,
}

impl Layout {
    fn tile_count(&self) -> usize {
        self.width_tiles as usize * self.height_tiles as usize
    }

    fn index(&self, coord: TileCoord, operation: &str) -> Result<usize> {
        if coord.x >= self.width_tiles || coord.y >= self.height_tiles {
            return Err(FinetileError::grid_with_context(
                format!(
                    "tile {} outside {}x{} grid",
                    coord, self.width_tiles, self.height_tiles
                ),
                ErrorContext::new(operation, "TileGrid").with_metadata("coord", coord),
            ));
        }
        Ok(coord.y as usize * self.width_tiles as usize + coord.x as usize)
    }

    fn coord(&self, index: usize) -> TileCoord {
        let width = self.width_tiles as usize;
        TileCoord::new((index % width) as u32, (index / width) as u32)
    }

    fn range(&self, index: usize) -> std::ops::Range<usize> {
        index * self.capacity..(index + 1) * self.capacity
    }
}

/// Tile storage for one pass
#[derive(Debug, Clone)]
pub struct TileGrid {
    layout: Layout,
    policy: OverflowPolicy,
    arena: Vec<u8>,
    lengths: Vec<u32>,
    status: Vec<TileStatus>,
    fallback: HashMap<usize, Vec<Command>>,
}

impl TileGrid {
    /// Create a grid covering `width_px` by `height_px` pixels
    pub fn new(width_px: u32, height_px: u32, config: &TileConfig) -> Result<Self> {
        config.validate()?;
        if width_px == 0 || height_px == 0 {
            return Err(FinetileError::configuration(format!(
                "frame {}x{} has no pixels",
                width_px, height_px
            )));
        }

        let width_tiles = width_px.div_ceil(config.tile_size);
        let height_tiles = height_px.div_ceil(config.tile_size);
        if width_tiles > config.max_tiles_width {
            return Err(FinetileError::configuration(format!(
                "frame width {} needs {} tiles, limit is {}",
                width_px, width_tiles, config.max_tiles_width
            )));
        }
        if height_tiles > config.max_tiles_height {
            return Err(FinetileError::configuration(format!(
                "frame height {} needs {} tiles, limit is {}",
                height_px, height_tiles, config.max_tiles_height
            )));
        }

        let layout = Layout {
            width_px,
            height_px,
            width_tiles,
            height_tiles,
            tile_size: config.tile_size,
            capacity: config.capacity,
        };
        let count = layout.tile_count();
        let arena_len = count.checked_mul(config.capacity).ok_or_else(|| {
            FinetileError::configuration(format!(
                "{} tiles of {} bytes overflow the address space",
                count, config.capacity
            ))
        })?;

        let mut grid = Self {
            layout,
            policy: OverflowPolicy::Fallback,
            arena: vec![0; arena_len],
            lengths: vec![0; count],
            status: vec![TileStatus::Empty; count],
            fallback: HashMap::new(),
        };
        grid.clear();

        finetile_debug!(
            LogCategory::Grid,
            "created {}x{} tile grid ({} bytes per tile)",
            width_tiles,
            height_tiles,
            config.capacity
        );
        Ok(grid)
    }

    /// Set how overflowing tiles are recovered
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current overflow policy
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Grid width in tiles
    pub fn width_tiles(&self) -> u32 {
        self.layout.width_tiles
    }

    /// Grid height in tiles
    pub fn height_tiles(&self) -> u32 {
        self.layout.height_tiles
    }

    /// Status of a tile so far this pass
    pub fn status(&self, coord: TileCoord) -> Result<TileStatus> {
        let index = self.layout.index(coord, "status")?;
        Ok(self.status[index])
    }

    /// Encode `commands` into the tile at `coord` and terminate it.
    ///
    /// Commands after an explicit `End` are ignored. A tile can be binned
    /// once per pass. A point the wire format cannot represent sends the tile
    /// to the fallback path whatever the overflow policy, so the geometry is
    /// never clamped.
    pub fn bin(&mut self, coord: TileCoord, commands: &[Command]) -> Result<TileStatus> {
        let index = self.claim(coord, "bin")?;
        let policy = self.policy;
        let commands = match commands.iter().position(Command::is_end) {
            Some(end) => &commands[..end],
            None => commands,
        };

        let range = self.layout.range(index);
        let mut tile = TileBuffer::with_storage(&mut self.arena[range]);
        let mut status = TileStatus::Encoded;

        for (i, command) in commands.iter().enumerate() {
            let Err(err) = tile.append(*command) else {
                continue;
            };

            if let TileError::CoordinateOutOfRange { .. } = err {
                tile.reset();
                status = TileStatus::Fallback;
                finetile_warn!(
                    LogCategory::Grid,
                    "tile {} command {} cannot be encoded: {}",
                    coord,
                    i,
                    err
                );
                break;
            }

            status = match policy {
                OverflowPolicy::Truncate => TileStatus::Truncated {
                    dropped: commands.len() - i,
                },
                OverflowPolicy::Fallback => {
                    tile.reset();
                    TileStatus::Fallback
                }
            };
            finetile_warn_rate_limited!(
                LogCategory::Grid,
                "tile {} overflowed at command {} of {}: {} ({:?})",
                coord,
                i,
                commands.len(),
                err,
                policy
            );
            break;
        }

        tile.end()?;
        let len = tile.len();

        self.lengths[index] = len as u32;
        self.status[index] = status;
        if status == TileStatus::Fallback {
            self.fallback.insert(index, commands.to_vec());
        }

        finetile_debug!(
            LogCategory::Encode,
            "binned {} commands into tile {} ({} bytes, {:?})",
            commands.len(),
            coord,
            len,
            status
        );
        Ok(status)
    }

    /// Install tile bytes produced elsewhere, without validation
    pub fn load_raw(&mut self, coord: TileCoord, bytes: &[u8]) -> Result<()> {
        let index = self.claim(coord, "load_raw")?;
        let range = self.layout.range(index);
        let mut tile = TileBuffer::with_storage(&mut self.arena[range]);
        tile.load(bytes)?;

        self.lengths[index] = bytes.len() as u32;
        self.status[index] = TileStatus::Raw;
        Ok(())
    }

    /// End the writing phase
    pub fn seal(self) -> SealedGrid {
        let (encoded, fallback) = self.status.iter().fold((0, 0), |(e, f), s| match s {
            TileStatus::Empty => (e, f),
            TileStatus::Fallback => (e, f + 1),
            _ => (e + 1, f),
        });
        finetile_debug!(
            LogCategory::Grid,
            "sealed grid: {} of {} tiles binned, {} fallback",
            encoded + fallback,
            self.status.len(),
            fallback
        );

        SealedGrid {
            layout: self.layout,
            policy: self.policy,
            arena: self.arena,
            lengths: self.lengths,
            status: self.status,
            fallback: self.fallback,
        }
    }

    fn claim(&self, coord: TileCoord, operation: &str) -> Result<usize> {
        let index = self.layout.index(coord, operation)?;
        if self.status[index] != TileStatus::Empty {
            return Err(FinetileError::grid_with_context(
                format!("tile {} already written this pass", coord),
                ErrorContext::new(operation, "TileGrid")
                    .with_metadata("coord", coord)
                    .with_metadata("status", format!("{:?}", self.status[index])),
            ));
        }
        Ok(index)
    }

    /// Every tile back to a bare `End`
    fn clear(&mut self) {
        let end = Op::End.tag().to_ne_bytes();
        for index in 0..self.layout.tile_count() {
            let start = index * self.layout.capacity;
            self.arena[start..start + END_LEN].copy_from_slice(&end);
        }
        self.lengths.fill(END_LEN as u32);
        self.status.fill(TileStatus::Empty);
        self.fallback.clear();
    }
}

/// Read-only grid for the evaluation phase
#[derive(Debug, Clone)]
pub struct SealedGrid {
    layout: Layout,
    policy: OverflowPolicy,
    arena: Vec<u8>,
    lengths: Vec<u32>,
    status: Vec<TileStatus>,
    fallback: HashMap<usize, Vec<Command>>,
}

impl SealedGrid {
    /// Frame width in pixels
    pub fn width_px(&self) -> u32 {
        self.layout.width_px
    }

    /// Frame height in pixels
    pub fn height_px(&self) -> u32 {
        self.layout.height_px
    }

    /// Grid width in tiles
    pub fn width_tiles(&self) -> u32 {
        self.layout.width_tiles
    }

    /// Grid height in tiles
    pub fn height_tiles(&self) -> u32 {
        self.layout.height_tiles
    }

    /// Tile edge length in pixels
    pub fn tile_size(&self) -> u32 {
        self.layout.tile_size
    }

    /// Bytes per tile
    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    /// Number of tiles
    pub fn tile_count(&self) -> usize {
        self.layout.tile_count()
    }

    /// Policy the tiles were binned under
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Read-only view of one tile
    pub fn tile(&self, coord: TileCoord) -> Result<TileView<'_>> {
        let index = self.layout.index(coord, "tile")?;
        Ok(self.view(index)?)
    }

    /// Status recorded when the tile was binned
    pub fn status(&self, coord: TileCoord) -> Result<TileStatus> {
        let index = self.layout.index(coord, "status")?;
        Ok(self.status[index])
    }

    /// Retained commands of a fallback tile
    pub fn fallback_commands(&self, coord: TileCoord) -> Option<&[Command]> {
        let index = self.layout.index(coord, "fallback_commands").ok()?;
        self.fallback.get(&index).map(Vec::as_slice)
    }

    /// The whole arena, `capacity()` bytes per tile in row-major order
    pub fn as_bytes(&self) -> &[u8] {
        &self.arena
    }

    /// Written length of every tile, row-major
    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    /// Tile lengths as raw bytes, for upload next to [`SealedGrid::as_bytes`]
    pub fn length_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lengths)
    }

    /// Coordinates of every tile, row-major
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.tile_count()).map(|index| self.layout.coord(index))
    }

    /// Start a new pass over the same storage
    pub fn reset(self) -> TileGrid {
        let mut grid = TileGrid {
            layout: self.layout,
            policy: self.policy,
            arena: self.arena,
            lengths: self.lengths,
            status: self.status,
            fallback: self.fallback,
        };
        grid.clear();
        grid
    }

    pub(crate) fn coord_of(&self, index: usize) -> TileCoord {
        self.layout.coord(index)
    }

    pub(crate) fn view(&self, index: usize) -> TileResult<TileView<'_>> {
        TileView::new(&self.arena[self.layout.range(index)], self.lengths[index] as usize)
    }

    pub(crate) fn status_at(&self, index: usize) -> TileStatus {
        self.status[index]
    }

    pub(crate) fn fallback_at(&self, index: usize) -> Option<&[Command]> {
        self.fallback.get(&index).map(Vec::as_slice)
    }
}
