use std::fs;
use std::io::Cursor;
use std::path::Path;

use binread::BinRead;
use thiserror::Error;
use tracing::{debug, warn};

/// Bytes per map row in the overlay data this pipeline ships.
///
/// The original format notes describe a 1001x500 world map, but the
/// extracted overlay assets carry 29x16 rows. Dimensions live on the
/// [`PakFile`] instance, so either layout decodes through
/// [`PakFile::with_dimensions`].
pub const PAK_WIDTH: usize = 29;
/// Map rows per overlay, see [`PAK_WIDTH`].
pub const PAK_HEIGHT: usize = 16;

/// File names the overlay data ships under. Anything else is rejected
/// before any I/O happens.
const PAK_NAMES: [&str; 2] = ["CLIMATE.PAK", "POLITIC.PAK"];

#[derive(Error, Debug)]
pub enum PakError {
    #[error("not a pak overlay: {0}")]
    InvalidName(String),
    #[error("failed to read pak file")]
    Open(#[source] std::io::Error),
    #[error("pak stream truncated: {0}")]
    Truncated(#[from] binread::Error),
}

/// One run record: `value` repeated `count` times into the current row.
#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
struct PakRun {
    count: u16,
    value: u8,
}

/// Row start positions, packed at the front of the stream one u32 per row.
#[derive(BinRead, Debug)]
#[br(little, import(rows: usize))]
struct OffsetTable {
    #[br(count = rows)]
    offsets: Vec<u32>,
}

/// Decoded overlay in the shape an indexed bitmap consumer expects: each
/// byte is a palette index, rows are `width` bytes, packed row-major.
#[derive(Debug, Clone, Copy)]
pub struct PakBitmap<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

/// Reader for the run length encoded world map overlays, CLIMATE.PAK and
/// POLITIC.PAK.
///
/// The on-disk layout is an offset table of one little endian u32 per
/// row, followed by each row's run stream of (u16 count, u8 value)
/// records. Row offsets are independent and may point anywhere in the
/// file, including at shared run data.
#[derive(Debug, Clone)]
pub struct PakFile {
    width: usize,
    height: usize,
    buffer: Vec<u8>,
}

impl Default for PakFile {
    fn default() -> Self {
        Self::new()
    }
}

impl PakFile {
    /// Empty overlay at the stock dimensions, ready for [`PakFile::load`].
    pub fn new() -> Self {
        Self::with_dimensions(PAK_WIDTH, PAK_HEIGHT)
    }

    /// Empty overlay with caller supplied dimensions.
    pub fn with_dimensions(width: usize, height: usize) -> Self {
        PakFile {
            width,
            height,
            buffer: vec![0; width * height],
        }
    }

    /// Load constructor. An overlay that fails to load is returned anyway
    /// holding its zeroed buffer; check [`PakFile::load`] directly when
    /// the failure reason matters.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let mut pak = PakFile::new();
        if let Err(e) = pak.load(path) {
            warn!("pak load failed: {e}");
        }
        pak
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Decode the overlay at `path` into the buffer.
    ///
    /// The file name must be one of the recognized overlay names, compared
    /// case insensitively against the terminal path component. The file is
    /// slurped into memory and expanded row by row; the live buffer is
    /// only replaced once every row decoded, so any failure leaves the
    /// previous contents untouched.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PakError> {
        let path = path.as_ref();

        let recognized = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| PAK_NAMES.iter().any(|pak| name.eq_ignore_ascii_case(pak)))
            .unwrap_or(false);

        if !recognized {
            return Err(PakError::InvalidName(path.display().to_string()));
        }

        let file = fs::read(path).map_err(PakError::Open)?;

        self.buffer = self.decode(&file)?;

        debug!("decoded {} rows from {}", self.height, path.display());

        Ok(())
    }

    fn decode(&self, file: &[u8]) -> Result<Vec<u8>, PakError> {
        let mut table_reader = Cursor::new(file);
        let mut row_reader = Cursor::new(file);

        let table = OffsetTable::read_args(&mut table_reader, (self.height,))?;

        let mut out = vec![0u8; self.width * self.height];

        for (row, offset) in table.offsets.iter().enumerate() {
            row_reader.set_position(*offset as u64);

            let start = row * self.width;
            let mut row_pos = 0;

            while row_pos < self.width {
                let run = PakRun::read(&mut row_reader)?;

                // Run counts are supposed to sum to exactly one row.
                // Clamp anything oversized at the row boundary.
                let len = (run.count as usize).min(self.width - row_pos);
                if len < run.count as usize {
                    warn!(
                        "row {row} run of {} clamped to {len} remaining cells",
                        run.count
                    );
                }

                out[start + row_pos..start + row_pos + len].fill(run.value);
                row_pos += len;
            }
        }

        Ok(out)
    }

    /// Current contents as an indexed bitmap. Pure accessor, no decoding.
    pub fn get_bitmap(&self) -> PakBitmap<'_> {
        PakBitmap {
            width: self.width,
            height: self.height,
            data: &self.buffer,
        }
    }

    /// Palette index at `(x, y)`, or -1 for any coordinate outside the
    /// map. Decoded values always sit in 0..=255, so the sentinel never
    /// collides with real data.
    pub fn get_value(&self, x: i32, y: i32) -> i32 {
        if x < 0 || x as usize >= self.width {
            return -1;
        }
        if y < 0 || y as usize >= self.height {
            return -1;
        }

        self.buffer[y as usize * self.width + x as usize] as i32
    }

    /// Replace the buffer wholesale, for tests and tools that synthesize
    /// overlay data. The replacement is resized to `width * height` so
    /// lookups stay in bounds.
    pub fn set_buffer(&mut self, mut buffer: Vec<u8>) {
        buffer.resize(self.width * self.height, 0);
        self.buffer = buffer;
    }
}
