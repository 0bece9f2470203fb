//! COLRv1 paints.
//!
//! Each BaseGlyphV1 record points at a LayerV1 array. Every layer in that array pairs a glyph
//! outline with a paint: a solid fill, or a linear or radial gradient along a colour line.
//! Offsets inside a paint are relative to the start of that paint. Variation indices are skipped.

use super::{ColrTable, LayerLimits};
use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom, ReadScope, ReadUnchecked};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::{F2Dot14, Fixed};
use crate::{size, GlyphId, SafeFrom};

use pathfinder_geometry::transform2d::{Matrix2x2F, Transform2F};
use pathfinder_geometry::vector::Vector2F;
use std::convert::TryFrom;
use std::iter::FusedIterator;

const PAINT_FORMAT_SOLID: u16 = 1;
const PAINT_FORMAT_LINEAR_GRADIENT: u16 = 2;
const PAINT_FORMAT_RADIAL_GRADIENT: u16 = 3;

/// A decoded paint.
#[derive(Debug, Clone)]
pub enum Paint<'a> {
    Solid(PaintSolid),
    LinearGradient(LinearGradient<'a>),
    RadialGradient(RadialGradient<'a>),
}

/// Fill with a single colour.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaintSolid {
    pub color: ColorIndex,
}

/// A palette entry reference with an alpha multiplier.
///
/// A palette index of `0xFFFF` selects the foreground colour.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ColorIndex {
    pub palette_index: u16,
    pub alpha: F2Dot14,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

/// Linear gradient through `p0` and `p1`, with `p2` giving the rotation of the gradient.
#[derive(Debug, Clone)]
pub struct LinearGradient<'a> {
    pub color_line: ColorLine<'a>,
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
}

/// Radial gradient between two circles.
///
/// Radial gradients carry a transform of gradient space. When the font supplies none it is the
/// identity. Linear gradients have no transform.
#[derive(Debug, Clone)]
pub struct RadialGradient<'a> {
    pub color_line: ColorLine<'a>,
    pub c0: Point,
    pub r0: u16,
    pub c1: Point,
    pub r1: u16,
    pub affine: Affine,
}

/// Linear part of a 2D transform in 16.16 fixed point. There is no translation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Affine {
    pub xx: Fixed,
    pub xy: Fixed,
    pub yx: Fixed,
    pub yy: Fixed,
}

/// How a gradient is drawn outside its defined range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extend {
    /// Use nearest color stop.
    Pad,
    /// Repeat from farthest color stop.
    Repeat,
    /// Mirror color line from nearest end.
    Reflect,
}

/// The colour stops of a gradient and its extend mode.
#[derive(Debug, Clone)]
pub struct ColorLine<'a> {
    pub extend: Extend,
    stops: ColorStops<'a>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ColorStop {
    /// Position on the colour line, nominally 0 to 1.
    pub stop_offset: F2Dot14,
    pub color: ColorIndex,
}

/// Lazy iterator over the stops of a colour line.
///
/// Before each read it checks that every remaining stop fits in the table. After an error or the
/// last stop it yields `None`.
#[derive(Debug, Clone)]
pub struct ColorStops<'a> {
    scope: ReadScope<'a>,
    index: u16,
    num_stops: u16,
}

/// A v1 colour layer.
#[derive(Debug, Clone)]
pub struct PaintLayer<'a> {
    pub glyph_id: GlyphId,
    pub paint: Paint<'a>,
}

/// A LayerV1 record. The paint offset is relative to the start of its LayerV1 array.
struct LayerV1Record {
    glyph_id: GlyphId,
    paint_offset: u32,
}

/// Lazy cursor over the v1 layers of one base glyph.
///
/// Behaves like [LayerCursor](super::LayerCursor): the first call looks up the glyph; after the
/// last layer or an error the cursor is finished.
#[derive(Debug, Clone, Default)]
pub struct PaintCursor {
    state: PaintCursorState,
}

#[derive(Debug, Copy, Clone, Default)]
enum PaintCursorState {
    #[default]
    Unstarted,
    Active {
        layer_array: usize,
        offset: usize,
        layer: u32,
        num_layers: u32,
    },
    Finished,
}

/// Iterator over the v1 layers of a base glyph.
///
/// See [ColrTable::paint_layers].
#[derive(Clone)]
pub struct PaintLayers<'a> {
    colr: &'a ColrTable,
    glyph_id: GlyphId,
    limits: LayerLimits,
    cursor: PaintCursor,
}

impl ColrTable {
    /// Iterate over the v1 colour layers of `glyph_id`.
    pub fn paint_layers(&self, glyph_id: GlyphId, limits: LayerLimits) -> PaintLayers<'_> {
        PaintLayers {
            colr: self,
            glyph_id,
            limits,
            cursor: PaintCursor::new(),
        }
    }

    /// Locate the LayerV1 array of `glyph_id`, returning its offset and the number of layers.
    fn layer_array(&self, glyph_id: GlyphId) -> Result<Option<(usize, u32)>, ParseError> {
        let Some(base_glyphs_v1) = self.base_glyphs_v1_offset() else {
            return Ok(None);
        };
        let Some(record) = self.find_base_glyph_v1(glyph_id) else {
            return Ok(None);
        };
        if record.layer_array_offset == 0 {
            return Err(ParseError::BadOffset);
        }
        let table_size = self.data().len();
        let layer_array = base_glyphs_v1
            .checked_add(usize::safe_from(record.layer_array_offset))
            .ok_or(ParseError::LimitExceeded)?;
        if layer_array >= table_size {
            return Err(ParseError::BadOffset);
        }
        let mut ctxt = self.scope().offset(layer_array).ctxt();
        let num_layers = ctxt.read_u32be()?;
        // All the records must be in the table, not only the count.
        let records_len = usize::safe_from(num_layers)
            .checked_mul(LayerV1Record::SIZE)
            .ok_or(ParseError::LimitExceeded)?;
        ctxt.skip(records_len)?;
        Ok(Some((layer_array, num_layers)))
    }
}

impl PaintCursor {
    pub fn new() -> Self {
        PaintCursor::default()
    }

    /// Read the next layer of `glyph_id` and decode its paint.
    ///
    /// Returns `Ok(None)` when the glyph has no (more) layers. An error finishes the cursor.
    pub fn next_layer<'a>(
        &mut self,
        colr: &'a ColrTable,
        glyph_id: GlyphId,
        limits: LayerLimits,
    ) -> Result<Option<PaintLayer<'a>>, ParseError> {
        let result = self.advance(colr, glyph_id, limits);
        if !matches!(result, Ok(Some(_))) {
            self.state = PaintCursorState::Finished;
        }
        result
    }

    fn advance<'a>(
        &mut self,
        colr: &'a ColrTable,
        glyph_id: GlyphId,
        limits: LayerLimits,
    ) -> Result<Option<PaintLayer<'a>>, ParseError> {
        if let PaintCursorState::Unstarted = self.state {
            self.state = match colr.layer_array(glyph_id)? {
                Some((layer_array, num_layers)) => PaintCursorState::Active {
                    layer_array,
                    offset: layer_array + size::U32,
                    layer: 0,
                    num_layers,
                },
                None => PaintCursorState::Finished,
            };
        }
        let PaintCursorState::Active {
            layer_array,
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

        let scope = colr.scope();
        let record = scope.offset(*offset).read::<LayerV1Record>()?;
        if !limits.contains_glyph(record.glyph_id) {
            return Err(ParseError::BadIndex);
        }
        let paint_offset = layer_array
            .checked_add(usize::safe_from(record.paint_offset))
            .ok_or(ParseError::LimitExceeded)?;
        let paint = scope.offset(paint_offset).read::<Paint<'_>>()?;

        *offset += LayerV1Record::SIZE;
        *layer += 1;
        Ok(Some(PaintLayer {
            glyph_id: record.glyph_id,
            paint,
        }))
    }

    /// True once the cursor will return no more layers.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, PaintCursorState::Finished)
    }
}

impl<'a> Iterator for PaintLayers<'a> {
    type Item = Result<PaintLayer<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next_layer(self.colr, self.glyph_id, self.limits)
            .transpose()
    }
}

impl FusedIterator for PaintLayers<'_> {}

impl ReadFrom for LayerV1Record {
    type ReadType = (U16Be, U32Be);

    fn read_from((glyph_id, paint_offset): (u16, u32)) -> Self {
        LayerV1Record {
            glyph_id,
            paint_offset,
        }
    }
}

impl ReadBinary for Paint<'_> {
    type HostType<'a> = Paint<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let paint_scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        match format {
            PAINT_FORMAT_SOLID => {
                let color = ctxt.read::<ColorIndex>()?;
                ctxt.skip(size::U32)?;
                Ok(Paint::Solid(PaintSolid { color }))
            }
            PAINT_FORMAT_LINEAR_GRADIENT => {
                let color_line = read_color_line(paint_scope, ctxt)?;
                let p0 = read_point(ctxt)?;
                let p1 = read_point(ctxt)?;
                let p2 = read_point(ctxt)?;
                Ok(Paint::LinearGradient(LinearGradient {
                    color_line,
                    p0,
                    p1,
                    p2,
                }))
            }
            PAINT_FORMAT_RADIAL_GRADIENT => {
                let color_line = read_color_line(paint_scope, ctxt)?;
                let c0 = read_point(ctxt)?;
                let r0 = read_var_u16(ctxt)?;
                let c1 = read_point(ctxt)?;
                let r1 = read_var_u16(ctxt)?;
                let affine_offset = ctxt.read_u32be()?;
                let affine = if affine_offset == 0 {
                    Affine::IDENTITY
                } else {
                    paint_scope
                        .offset(usize::safe_from(affine_offset))
                        .read::<Affine>()?
                };
                Ok(Paint::RadialGradient(RadialGradient {
                    color_line,
                    c0,
                    r0,
                    c1,
                    r1,
                    affine,
                }))
            }
            _ => Err(ParseError::BadValue),
        }
    }
}

/// Read an offset to a colour line and decode the colour line it points at.
fn read_color_line<'a>(
    paint_scope: ReadScope<'a>,
    ctxt: &mut ReadCtxt<'a>,
) -> Result<ColorLine<'a>, ParseError> {
    let offset = ctxt.read_u32be()?;
    paint_scope
        .offset(usize::safe_from(offset))
        .read::<ColorLine<'_>>()
}

/// Read a coordinate pair, each followed by a variation index.
fn read_point(ctxt: &mut ReadCtxt<'_>) -> Result<Point, ParseError> {
    let x = ctxt.read_i16be()?;
    ctxt.skip(size::U32)?;
    let y = ctxt.read_i16be()?;
    ctxt.skip(size::U32)?;
    Ok(Point { x, y })
}

fn read_var_u16(ctxt: &mut ReadCtxt<'_>) -> Result<u16, ParseError> {
    let value = ctxt.read_u16be()?;
    ctxt.skip(size::U32)?;
    Ok(value)
}

impl ReadFrom for ColorIndex {
    type ReadType = (U16Be, F2Dot14);

    fn read_from((palette_index, alpha): (u16, F2Dot14)) -> Self {
        ColorIndex {
            palette_index,
            alpha,
        }
    }
}

impl ReadFrom for ColorStop {
    type ReadType = (F2Dot14, U32Be, ColorIndex, U32Be);

    fn read_from(
        (stop_offset, _var_index, color, _alpha_var_index): (F2Dot14, u32, ColorIndex, u32),
    ) -> Self {
        ColorStop { stop_offset, color }
    }
}

impl ReadFrom for Affine {
    type ReadType = ((Fixed, U32Be), (Fixed, U32Be), (Fixed, U32Be), (Fixed, U32Be));

    fn read_from(
        ((xx, _), (xy, _), (yx, _), (yy, _)): (
            (Fixed, u32),
            (Fixed, u32),
            (Fixed, u32),
            (Fixed, u32),
        ),
    ) -> Self {
        Affine { xx, xy, yx, yy }
    }
}

impl ReadBinary for ColorLine<'_> {
    type HostType<'a> = ColorLine<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let extend = Extend::try_from(ctxt.read_u16be()?)?;
        let num_stops = ctxt.read_u16be()?;
        Ok(ColorLine {
            extend,
            stops: ColorStops {
                scope: ctxt.scope(),
                index: 0,
                num_stops,
            },
        })
    }
}

impl TryFrom<u16> for Extend {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Extend::Pad),
            1 => Ok(Extend::Repeat),
            2 => Ok(Extend::Reflect),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> ColorLine<'a> {
    pub fn num_stops(&self) -> u16 {
        self.stops.num_stops
    }

    /// Iterate over the stops from the first.
    pub fn stops(&self) -> ColorStops<'a> {
        self.stops.clone()
    }
}

impl<'a> ColorStops<'a> {
    /// Read the next stop. Errors leave the iterator unchanged; callers finish it.
    fn next_stop(&mut self) -> Result<Option<ColorStop>, ParseError> {
        if self.index >= self.num_stops {
            return Ok(None);
        }
        let remaining = usize::from(self.num_stops - self.index);
        if remaining * ColorStop::SIZE > self.scope.data().len() {
            return Err(ParseError::BadEof);
        }
        let stop = self.scope.read::<ColorStop>()?;
        self.scope = self.scope.offset(ColorStop::SIZE);
        self.index += 1;
        Ok(Some(stop))
    }
}

impl Iterator for ColorStops<'_> {
    type Item = Result<ColorStop, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_stop() {
            Ok(stop) => stop.map(Ok),
            Err(err) => {
                self.index = self.num_stops;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(usize::from(self.num_stops - self.index)))
    }
}

impl FusedIterator for ColorStops<'_> {}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        xx: Fixed::ONE,
        xy: Fixed::ZERO,
        yx: Fixed::ZERO,
        yy: Fixed::ONE,
    };
}

impl From<Affine> for Transform2F {
    fn from(affine: Affine) -> Self {
        Transform2F {
            matrix: Matrix2x2F::row_major(
                affine.xx.into(),
                affine.xy.into(),
                affine.yx.into(),
                affine.yy.into(),
            ),
            vector: Vector2F::zero(),
        }
    }
}
