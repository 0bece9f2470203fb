//! Compositing colour layers into a BGRA canvas.
//!
//! Each layer of a colour glyph is rasterized to a greyscale coverage bitmap by the caller. The
//! bitmap is blended into a [Canvas] with the layer's colour using source-over compositing in
//! 8-bit integer arithmetic. The canvas grows to the union of all layer footprints.
//!
//! Coordinates are in pixels with y increasing upwards: `top` is the row above the bitmap and
//! rows extend downwards from it.

use crate::error::{BlendError, ComposeError};
use crate::tables::colr::{ColorIndex, ColrTable, LayerLimits, FOREGROUND_PALETTE_INDEX};
use crate::tables::cpal::{ColorRecord, Palette, PaletteFlags};
use crate::{GlyphId, SafeFrom};

use log::{debug, warn};
use pathfinder_geometry::rect::RectI;
use pathfinder_geometry::vector::vec2i;
use std::convert::TryFrom;

/// Largest accepted magnitude of a bitmap origin coordinate.
const MAX_COORDINATE: i32 = 1 << 28;
/// Largest accepted bitmap width or height.
const MAX_DIMENSION: u32 = 1 << 28;

const BGRA_SIZE: usize = 4;

/// Destination of compositing: a BGRA bitmap with 8 bits per channel, not premultiplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Canvas {
    left: i32,
    top: i32,
    width: u32,
    rows: u32,
    pitch: usize,
    buffer: Vec<u8>,
}

/// An 8-bit coverage bitmap for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreyBitmap {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub rows: u32,
    /// Bytes from the start of one row to the next.
    pub pitch: usize,
    pub data: Vec<u8>,
}

/// Source of palette colours for layer colour resolution.
pub trait ColorPalette {
    fn num_entries(&self) -> u16;

    fn entry(&self, index: u16) -> Option<ColorRecord>;

    fn flags(&self) -> PaletteFlags;
}

/// Resolves layer palette indices to colours, applying the foreground colour for `0xFFFF`.
pub struct ColorResolver<'a, P: ?Sized> {
    palette: &'a P,
    foreground: Option<ColorRecord>,
}

/// Renders the outline of a layer glyph to a coverage bitmap.
pub trait LayerRasterizer {
    type Error;

    /// Rasterize `glyph_id`. `None` means the glyph has no pixels.
    fn rasterize(&mut self, glyph_id: GlyphId) -> Result<Option<GreyBitmap>, Self::Error>;
}

impl Canvas {
    /// An empty canvas. The first blended layer sets its bounds.
    pub fn new() -> Self {
        Canvas::default()
    }

    fn allocate(rect: RectI) -> Result<Canvas, BlendError> {
        let width = u32::try_from(rect.width()).map_err(|_| BlendError::TooLarge)?;
        let rows = u32::try_from(rect.height()).map_err(|_| BlendError::TooLarge)?;
        let pitch = usize::safe_from(width)
            .checked_mul(BGRA_SIZE)
            .ok_or(BlendError::TooLarge)?;
        let len = pitch
            .checked_mul(usize::safe_from(rows))
            .ok_or(BlendError::TooLarge)?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| BlendError::AllocFailed)?;
        buffer.resize(len, 0);
        Ok(Canvas {
            left: rect.min_x(),
            top: rect.max_y(),
            width,
            rows,
            pitch,
            buffer,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.rows == 0
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Bytes from the start of one row to the next.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// The pixels, BGRA, row by row from the top.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// The BGRA pixel `x` columns from the left and `y` rows down from the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.rows {
            return None;
        }
        let start = usize::safe_from(y) * self.pitch + usize::safe_from(x) * BGRA_SIZE;
        self.buffer.get(start..start + BGRA_SIZE)?.try_into().ok()
    }

    /// Bounds of the canvas. Only meaningful when not empty.
    pub fn rect(&self) -> RectI {
        footprint(self.left, self.top, self.width, self.rows)
    }

    /// Replace this canvas with one covering `rect`, which must contain the current bounds.
    fn grow(&mut self, rect: RectI) -> Result<(), BlendError> {
        let mut grown = Canvas::allocate(rect)?;
        debug!(
            "growing canvas from {}x{} to {}x{}",
            self.width, self.rows, grown.width, grown.rows
        );
        // Both differences are non-negative as `rect` contains the current bounds.
        let row_offset = usize::safe_from((grown.top - self.top) as u32);
        let column_offset = usize::safe_from((self.left - grown.left) as u32) * BGRA_SIZE;
        let row_len = usize::safe_from(self.width) * BGRA_SIZE;
        for (y, row) in self.buffer.chunks_exact(self.pitch).enumerate() {
            let start = (row_offset + y) * grown.pitch + column_offset;
            grown.buffer[start..start + row_len].copy_from_slice(&row[..row_len]);
        }
        *self = grown;
        Ok(())
    }
}

impl GreyBitmap {
    /// A bitmap with rows packed without padding.
    pub fn new(left: i32, top: i32, width: u32, rows: u32, data: Vec<u8>) -> Self {
        GreyBitmap {
            left,
            top,
            width,
            rows,
            pitch: usize::safe_from(width),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.rows == 0
    }

    fn check(&self) -> Result<(), BlendError> {
        if self.width > MAX_DIMENSION
            || self.rows > MAX_DIMENSION
            || self.left.unsigned_abs() > MAX_COORDINATE as u32
            || self.top.unsigned_abs() > MAX_COORDINATE as u32
        {
            return Err(BlendError::TooLarge);
        }
        let width = usize::safe_from(self.width);
        if self.pitch < width {
            return Err(BlendError::BadBitmap);
        }
        let required = self
            .pitch
            .checked_mul(usize::safe_from(self.rows) - 1)
            .and_then(|len| len.checked_add(width))
            .ok_or(BlendError::TooLarge)?;
        if self.data.len() < required {
            return Err(BlendError::BadBitmap);
        }
        Ok(())
    }

    fn rect(&self) -> RectI {
        footprint(self.left, self.top, self.width, self.rows)
    }
}

fn footprint(left: i32, top: i32, width: u32, rows: u32) -> RectI {
    // Callers keep dimensions within MAX_DIMENSION so the casts are lossless.
    RectI::from_points(
        vec2i(left, top - rows as i32),
        vec2i(left + width as i32, top),
    )
}

/// Smallest rectangle containing both `a` and `b`.
fn union(a: RectI, b: RectI) -> RectI {
    RectI::from_points(
        a.origin().min(b.origin()),
        a.lower_right().max(b.lower_right()),
    )
}

/// Blend `source` into `canvas` using `color`.
///
/// The canvas is created from or grown to cover the source footprint. Zero-area sources leave the
/// canvas untouched. On error the canvas is unchanged.
pub fn blend_layer(
    canvas: &mut Canvas,
    color: ColorRecord,
    source: &GreyBitmap,
) -> Result<(), BlendError> {
    if source.is_empty() {
        return Ok(());
    }
    source.check()?;

    let rect = source.rect();
    if canvas.is_empty() {
        *canvas = Canvas::allocate(rect)?;
    } else {
        let bounds = union(canvas.rect(), rect);
        if bounds != canvas.rect() {
            canvas.grow(bounds)?;
        }
    }

    let row_offset = usize::safe_from((canvas.top - source.top) as u32);
    let column_offset = usize::safe_from((source.left - canvas.left) as u32) * BGRA_SIZE;
    let width = usize::safe_from(source.width);
    for y in 0..usize::safe_from(source.rows) {
        let src_start = y * source.pitch;
        let src_row = &source.data[src_start..src_start + width];
        let dst_start = (row_offset + y) * canvas.pitch + column_offset;
        let dst_row = &mut canvas.buffer[dst_start..dst_start + width * BGRA_SIZE];
        for (&coverage, pixel) in src_row.iter().zip(dst_row.chunks_exact_mut(BGRA_SIZE)) {
            blend_pixel(pixel, color, coverage);
        }
    }
    Ok(())
}

/// Source-over one BGRA pixel with truncating integer division.
fn blend_pixel(pixel: &mut [u8], color: ColorRecord, coverage: u8) {
    let fa = u32::from(color.alpha) * u32::from(coverage) / 255;
    let inv = 255 - fa;
    let channel = |dst: u8, src: u8| {
        let fc = u32::from(src) * fa / 255;
        (u32::from(dst) * inv / 255 + fc) as u8
    };
    pixel[0] = channel(pixel[0], color.blue);
    pixel[1] = channel(pixel[1], color.green);
    pixel[2] = channel(pixel[2], color.red);
    pixel[3] = (u32::from(pixel[3]) * inv / 255 + fa) as u8;
}

impl ColorPalette for Palette<'_, '_> {
    fn num_entries(&self) -> u16 {
        Palette::num_entries(self)
    }

    fn entry(&self, index: u16) -> Option<ColorRecord> {
        self.color(index)
    }

    fn flags(&self) -> PaletteFlags {
        Palette::flags(self)
    }
}

impl<'a, P: ColorPalette + ?Sized> ColorResolver<'a, P> {
    pub fn new(palette: &'a P, foreground: Option<ColorRecord>) -> Self {
        ColorResolver {
            palette,
            foreground,
        }
    }

    /// The colour used for the foreground palette index.
    ///
    /// Without an explicit foreground this is opaque white for palettes meant for dark
    /// backgrounds, and opaque black otherwise.
    pub fn foreground(&self) -> ColorRecord {
        self.foreground.unwrap_or_else(|| {
            if self
                .palette
                .flags()
                .contains(PaletteFlags::USABLE_WITH_DARK_BACKGROUND)
            {
                ColorRecord::WHITE
            } else {
                ColorRecord::BLACK
            }
        })
    }

    /// Resolve a layer palette index.
    pub fn resolve(&self, palette_index: u16) -> Option<ColorRecord> {
        if palette_index == FOREGROUND_PALETTE_INDEX {
            Some(self.foreground())
        } else {
            self.palette.entry(palette_index)
        }
    }

    /// Resolve a paint colour, multiplying its alpha into the colour's alpha.
    ///
    /// The alpha is clamped to the range 0 to 1.
    pub fn resolve_color_index(&self, color: ColorIndex) -> Option<ColorRecord> {
        let mut record = self.resolve(color.palette_index)?;
        let scale = i32::from(color.alpha.raw_value() as i16).clamp(0, 0x4000) as u32;
        record.alpha = (u32::from(record.alpha) * scale / 0x4000) as u8;
        Some(record)
    }
}

/// Composite the v0 colour layers of `glyph_id`.
///
/// Returns `Ok(None)` when the glyph has no colour layers, or when its layers fail to decode, in
/// which case the glyph should be drawn from its outline. Otherwise returns the canvas, which is
/// empty if every layer rasterized to nothing.
pub fn compose_glyph<P, R>(
    colr: &ColrTable,
    glyph_id: GlyphId,
    limits: LayerLimits,
    resolver: &ColorResolver<'_, P>,
    rasterizer: &mut R,
) -> Result<Option<Canvas>, ComposeError<R::Error>>
where
    P: ColorPalette + ?Sized,
    R: LayerRasterizer,
{
    let mut canvas = Canvas::new();
    let mut num_layers = 0;
    for layer in colr.layers(glyph_id, limits) {
        let layer = match layer {
            Ok(layer) => layer,
            Err(err) => {
                warn!("glyph {}: invalid colour layer: {}", glyph_id, err);
                return Ok(None);
            }
        };
        num_layers += 1;
        let Some(color) = resolver.resolve(layer.palette_index) else {
            warn!(
                "glyph {}: palette index {} out of range",
                glyph_id, layer.palette_index
            );
            return Ok(None);
        };
        let bitmap = rasterizer
            .rasterize(layer.glyph_id)
            .map_err(ComposeError::Rasterize)?;
        if let Some(bitmap) = bitmap {
            blend_layer(&mut canvas, color, &bitmap)?;
        }
    }

    if num_layers == 0 {
        return Ok(None);
    }
    debug!(
        "glyph {}: composed {} layers into {}x{}",
        glyph_id, num_layers, canvas.width, canvas.rows
    );
    Ok(Some(canvas))
}
