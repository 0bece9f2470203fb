//! `COLR` table parsing.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/colr>
//!
//! The table is validated once by [ColrTable::load] and then traversed lazily. Version 0 glyphs
//! are a flat list of (glyph, palette index) layers. Version 1 glyphs have a list of layers each
//! filled with a [Paint](paint::Paint).

pub mod paint;

pub use paint::{
    Affine, ColorIndex, ColorLine, ColorStop, ColorStops, Extend, LinearGradient, Paint,
    PaintCursor, PaintLayer, PaintLayers, PaintSolid, Point, RadialGradient,
};

use crate::binary::read::{
    ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope, ReadUnchecked,
};
use crate::binary::{U16Be, U32Be};
use crate::error::{ColrError, ParseError};
use crate::{size, GlyphId, SafeFrom};

use log::warn;
use std::fmt;
use std::iter::FusedIterator;

/// Palette index that selects the foreground colour instead of a palette entry.
pub const FOREGROUND_PALETTE_INDEX: u16 = 0xFFFF;

const COLR_HEADER_SIZE: usize = 14;
const COLR_V1_HEADER_SIZE: usize = COLR_HEADER_SIZE + size::U32;

/// The `COLR` colour table.
///
/// Owns the table bytes. Every offset and count held here has been checked against the length of
/// the data so cursors derived from the table only need to validate what they read.
pub struct ColrTable {
    data: Box<[u8]>,
    version: u16,
    base_glyph_records: RecordArray,
    layer_records: RecordArray,
    base_glyphs_v1: Option<BaseGlyphV1Array>,
}

/// Location of a validated array of fixed size records.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct RecordArray {
    offset: usize,
    len: usize,
}

/// The BaseGlyphV1 array. Layer array offsets in its records are relative to `offset`, which
/// points at the 32-bit record count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct BaseGlyphV1Array {
    offset: usize,
    records: RecordArray,
}

struct ColrHeader {
    version: u16,
    num_base_glyphs: u16,
    base_glyph_records_offset: u32,
    layer_records_offset: u32,
    num_layers: u16,
    base_glyphs_v1_offset: Option<u32>,
}

/// Font-wide limits that every decoded layer is validated against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerLimits {
    /// Total number of glyphs in the font.
    pub num_glyphs: u16,
    /// Number of entries in each `CPAL` palette.
    pub num_palette_entries: u16,
}

/// A v0 base glyph record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaseGlyphRecord {
    pub glyph_id: GlyphId,
    pub first_layer_index: u16,
    pub num_layers: u16,
}

/// A v1 base glyph record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaseGlyphV1Record {
    pub glyph_id: GlyphId,
    /// Offset to the LayerV1 array, from the start of the BaseGlyphV1 array.
    pub layer_array_offset: u32,
}

/// A v0 colour layer: the outline of `glyph_id` filled with a palette colour.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layer {
    pub glyph_id: GlyphId,
    pub palette_index: u16,
}

/// Lazy cursor over the v0 layers of one base glyph.
///
/// The first call to `next_layer` looks up the base glyph. Later calls only advance. Once the
/// layers are exhausted, or any read fails, the cursor is finished and returns `Ok(None)`.
#[derive(Debug, Clone, Default)]
pub struct LayerCursor {
    state: CursorState,
}

#[derive(Debug, Copy, Clone, Default)]
enum CursorState {
    #[default]
    Unstarted,
    Active {
        offset: usize,
        layer: u16,
        num_layers: u16,
    },
    Finished,
}

/// Iterator over the v0 layers of a base glyph.
///
/// See [ColrTable::layers].
#[derive(Clone)]
pub struct Layers<'a> {
    colr: &'a ColrTable,
    glyph_id: GlyphId,
    limits: LayerLimits,
    cursor: LayerCursor,
}

impl ColrTable {
    /// Validate `data` and build the table.
    ///
    /// Any structural problem yields `ColrError::InvalidTable` and no table. The specific cause is
    /// logged.
    pub fn load(data: impl Into<Box<[u8]>>) -> Result<ColrTable, ColrError> {
        let data = data.into();
        let header = match ReadScope::new(&data).read::<ColrHeader>() {
            Ok(header) => header,
            Err(err) => {
                warn!("invalid COLR header: {}", err);
                return Err(ColrError::InvalidTable);
            }
        };
        match Self::validate(&data, &header) {
            Ok((base_glyph_records, layer_records, base_glyphs_v1)) => Ok(ColrTable {
                data,
                version: header.version,
                base_glyph_records,
                layer_records,
                base_glyphs_v1,
            }),
            Err(err) => {
                warn!("invalid COLR table: {}", err);
                Err(ColrError::InvalidTable)
            }
        }
    }

    fn validate(
        data: &[u8],
        header: &ColrHeader,
    ) -> Result<(RecordArray, RecordArray, Option<BaseGlyphV1Array>), ParseError> {
        let table_size = data.len();
        let base_glyph_records = RecordArray::checked(
            table_size,
            usize::safe_from(header.base_glyph_records_offset),
            usize::from(header.num_base_glyphs),
            BaseGlyphRecord::SIZE,
        )?;
        let layer_records = RecordArray::checked(
            table_size,
            usize::safe_from(header.layer_records_offset),
            usize::from(header.num_layers),
            Layer::SIZE,
        )?;
        let base_glyphs_v1 = match header.base_glyphs_v1_offset {
            Some(offset) => {
                let offset = usize::safe_from(offset);
                if offset >= table_size {
                    return Err(ParseError::BadOffset);
                }
                let scope = ReadScope::new(data).offset(offset);
                let count = usize::safe_from(scope.read::<U32Be>()?);
                let records = RecordArray::checked(
                    table_size,
                    offset + size::U32,
                    count,
                    BaseGlyphV1Record::SIZE,
                )?;
                Some(BaseGlyphV1Array { offset, records })
            }
            None => None,
        };
        Ok((base_glyph_records, layer_records, base_glyphs_v1))
    }

    /// The table version, 0 or 1.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// The raw table data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn scope(&self) -> ReadScope<'_> {
        ReadScope::new(&self.data)
    }

    pub fn num_base_glyphs(&self) -> usize {
        self.base_glyph_records.len
    }

    pub fn num_layers(&self) -> usize {
        self.layer_records.len
    }

    pub fn num_base_glyphs_v1(&self) -> usize {
        self.base_glyphs_v1.map_or(0, |array| array.records.len)
    }

    fn record_array<T: ReadUnchecked>(&self, records: RecordArray) -> ReadArray<'_, T> {
        // Arrays were validated to fit at load.
        self.scope()
            .offset(records.offset)
            .ctxt()
            .read_array::<T>(records.len)
            .unwrap_or_else(|_| ReadArray::empty())
    }

    /// Find the v0 base glyph record for `glyph_id`.
    ///
    /// Records must be sorted by glyph id. Absent glyphs, including those hidden by an unsorted
    /// array, return `None`.
    pub fn find_base_glyph(&self, glyph_id: GlyphId) -> Option<BaseGlyphRecord> {
        let records = self.record_array::<BaseGlyphRecord>(self.base_glyph_records);
        records
            .binary_search_by(|record| record.glyph_id.cmp(&glyph_id))
            .ok()
            .and_then(|index| records.get_item(index))
    }

    /// Find the v1 base glyph record for `glyph_id`.
    pub fn find_base_glyph_v1(&self, glyph_id: GlyphId) -> Option<BaseGlyphV1Record> {
        let array = self.base_glyphs_v1?;
        let records = self.record_array::<BaseGlyphV1Record>(array.records);
        records
            .binary_search_by(|record| record.glyph_id.cmp(&glyph_id))
            .ok()
            .and_then(|index| records.get_item(index))
    }

    /// Offset of the BaseGlyphV1 array, if this is a version 1 table.
    pub(crate) fn base_glyphs_v1_offset(&self) -> Option<usize> {
        self.base_glyphs_v1.map(|array| array.offset)
    }

    /// Iterate over the v0 colour layers of `glyph_id`.
    pub fn layers(&self, glyph_id: GlyphId, limits: LayerLimits) -> Layers<'_> {
        Layers {
            colr: self,
            glyph_id,
            limits,
            cursor: LayerCursor::new(),
        }
    }

    /// Offset of the first layer record of `glyph_id` and the number of layers.
    fn layer_range(&self, glyph_id: GlyphId) -> Result<Option<(usize, u16)>, ParseError> {
        let Some(base_glyph) = self.find_base_glyph(glyph_id) else {
            return Ok(None);
        };
        if base_glyph.num_layers == 0 {
            return Ok(None);
        }
        let start = usize::from(base_glyph.first_layer_index) * Layer::SIZE;
        let length = usize::from(base_glyph.num_layers) * Layer::SIZE;
        let end = self
            .layer_records
            .offset
            .checked_add(start + length)
            .ok_or(ParseError::LimitExceeded)?;
        if end > self.data.len() {
            return Err(ParseError::BadOffset);
        }
        Ok(Some((self.layer_records.offset + start, base_glyph.num_layers)))
    }
}

impl RecordArray {
    /// Check that `len` records of `record_size` bytes at `offset` fit in a table of
    /// `table_size` bytes.
    fn checked(
        table_size: usize,
        offset: usize,
        len: usize,
        record_size: usize,
    ) -> Result<RecordArray, ParseError> {
        if offset >= table_size {
            return Err(ParseError::BadOffset);
        }
        let byte_len = len
            .checked_mul(record_size)
            .ok_or(ParseError::LimitExceeded)?;
        if byte_len > table_size - offset {
            return Err(ParseError::BadEof);
        }
        Ok(RecordArray { offset, len })
    }
}

impl ReadBinary for ColrHeader {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let table_size = ctxt.scope().data().len();
        if table_size < COLR_HEADER_SIZE {
            return Err(ParseError::BadEof);
        }
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version <= 1)?;
        let num_base_glyphs = ctxt.read_u16be()?;
        let base_glyph_records_offset = ctxt.read_u32be()?;
        let layer_records_offset = ctxt.read_u32be()?;
        let num_layers = ctxt.read_u16be()?;
        let base_glyphs_v1_offset = if version == 1 {
            if table_size < COLR_V1_HEADER_SIZE {
                return Err(ParseError::BadEof);
            }
            Some(ctxt.read_u32be()?)
        } else {
            None
        };

        Ok(ColrHeader {
            version,
            num_base_glyphs,
            base_glyph_records_offset,
            layer_records_offset,
            num_layers,
            base_glyphs_v1_offset,
        })
    }
}

impl ReadFrom for BaseGlyphRecord {
    type ReadType = (U16Be, U16Be, U16Be);

    fn read_from((glyph_id, first_layer_index, num_layers): (u16, u16, u16)) -> Self {
        BaseGlyphRecord {
            glyph_id,
            first_layer_index,
            num_layers,
        }
    }
}

impl ReadFrom for BaseGlyphV1Record {
    type ReadType = (U16Be, U32Be);

    fn read_from((glyph_id, layer_array_offset): (u16, u32)) -> Self {
        BaseGlyphV1Record {
            glyph_id,
            layer_array_offset,
        }
    }
}

impl ReadFrom for Layer {
    type ReadType = (U16Be, U16Be);

    fn read_from((glyph_id, palette_index): (u16, u16)) -> Self {
        Layer {
            glyph_id,
            palette_index,
        }
    }
}

/// A layer record validated against the font's glyph count and palette size.
struct CheckedLayer;

impl ReadBinaryDep for CheckedLayer {
    type Args<'a> = LayerLimits;
    type HostType<'a> = Layer;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        limits: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let layer = ctxt.read::<Layer>()?;
        ctxt.check_index(limits.contains_glyph(layer.glyph_id))?;
        ctxt.check_index(limits.contains_palette_index(layer.palette_index))?;
        Ok(layer)
    }
}

impl LayerLimits {
    pub fn new(num_glyphs: u16, num_palette_entries: u16) -> Self {
        LayerLimits {
            num_glyphs,
            num_palette_entries,
        }
    }

    pub fn contains_glyph(&self, glyph_id: GlyphId) -> bool {
        glyph_id < self.num_glyphs
    }

    /// True if `palette_index` is the foreground sentinel or a valid palette entry.
    pub fn contains_palette_index(&self, palette_index: u16) -> bool {
        palette_index == FOREGROUND_PALETTE_INDEX || palette_index < self.num_palette_entries
    }
}

impl Layer {
    /// True if this layer is filled with the foreground colour.
    pub fn is_foreground(&self) -> bool {
        self.palette_index == FOREGROUND_PALETTE_INDEX
    }
}

impl LayerCursor {
    pub fn new() -> Self {
        LayerCursor::default()
    }

    /// Read the next layer of `glyph_id`.
    ///
    /// Returns `Ok(None)` when the glyph has no (more) layers. An error finishes the cursor.
    pub fn next_layer(
        &mut self,
        colr: &ColrTable,
        glyph_id: GlyphId,
        limits: LayerLimits,
    ) -> Result<Option<Layer>, ParseError> {
        let result = self.advance(colr, glyph_id, limits);
        if !matches!(result, Ok(Some(_))) {
            self.state = CursorState::Finished;
        }
        result
    }

    fn advance(
        &mut self,
        colr: &ColrTable,
        glyph_id: GlyphId,
        limits: LayerLimits,
    ) -> Result<Option<Layer>, ParseError> {
        if let CursorState::Unstarted = self.state {
            self.state = match colr.layer_range(glyph_id)? {
                Some((offset, num_layers)) => CursorState::Active {
                    offset,
                    layer: 0,
                    num_layers,
                },
                None => CursorState::Finished,
            };
        }
        let CursorState::Active {
            offset,
            layer,
            num_layers,
        } = &mut self.state
        else {
            return Ok(None);
        };
        if *layer >= *num_layers {
            return Ok(None);
        }
        let record = colr.scope().offset(*offset).read_dep::<CheckedLayer>(limits)?;
        *offset += Layer::SIZE;
        *layer += 1;
        Ok(Some(record))
    }

    /// True once the cursor will return no more layers.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, CursorState::Finished)
    }
}

impl<'a> Iterator for Layers<'a> {
    type Item = Result<Layer, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next_layer(self.colr, self.glyph_id, self.limits)
            .transpose()
    }
}

impl FusedIterator for Layers<'_> {}

impl fmt::Debug for ColrTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColrTable")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("num_base_glyphs", &self.num_base_glyphs())
            .field("num_layers", &self.num_layers())
            .field("num_base_glyphs_v1", &self.num_base_glyphs_v1())
            .finish()
    }
}
