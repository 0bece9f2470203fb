// Builders for synthetic COLR, CPAL, and maxp tables.
//
// Layouts follow the binary formats read by this crate. Variation index fields are filled with
// junk so tests notice if they are ever interpreted.

use byteorder::{BigEndian, WriteBytesExt};

pub const JUNK_VAR_INDEX: u32 = 0xDEAD_BEEF;

pub const PAINT_SOLID: u16 = 1;
pub const PAINT_LINEAR_GRADIENT: u16 = 2;
pub const PAINT_RADIAL_GRADIENT: u16 = 3;

/// BaseGlyphV1 record: glyph id and its layers, each a layer glyph id and the bytes of a paint.
pub type GlyphPaints = (u16, Vec<(u16, Vec<u8>)>);

/// A version 0 `COLR` table.
///
/// `base_glyphs` are (glyph id, first layer index, num layers), `layers` are (glyph id,
/// palette index).
pub fn colr_v0(base_glyphs: &[(u16, u16, u16)], layers: &[(u16, u16)]) -> Vec<u8> {
    let base_glyph_offset = 14;
    let layer_offset = base_glyph_offset + 6 * base_glyphs.len() as u32;

    let mut data = Vec::new();
    data.write_u16::<BigEndian>(0).unwrap(); // version
    data.write_u16::<BigEndian>(base_glyphs.len() as u16).unwrap();
    data.write_u32::<BigEndian>(base_glyph_offset).unwrap();
    data.write_u32::<BigEndian>(layer_offset).unwrap();
    data.write_u16::<BigEndian>(layers.len() as u16).unwrap();
    write_v0_records(&mut data, base_glyphs, layers);
    data
}

fn write_v0_records(data: &mut Vec<u8>, base_glyphs: &[(u16, u16, u16)], layers: &[(u16, u16)]) {
    for &(glyph_id, first_layer_index, num_layers) in base_glyphs {
        data.write_u16::<BigEndian>(glyph_id).unwrap();
        data.write_u16::<BigEndian>(first_layer_index).unwrap();
        data.write_u16::<BigEndian>(num_layers).unwrap();
    }
    for &(glyph_id, palette_index) in layers {
        data.write_u16::<BigEndian>(glyph_id).unwrap();
        data.write_u16::<BigEndian>(palette_index).unwrap();
    }
}

/// A version 1 `COLR` table with v0 records followed by a BaseGlyphV1 array.
pub fn colr_v1(
    base_glyphs: &[(u16, u16, u16)],
    layers: &[(u16, u16)],
    glyphs: &[GlyphPaints],
) -> Vec<u8> {
    let base_glyph_offset = 18;
    let layer_offset = base_glyph_offset + 6 * base_glyphs.len() as u32;
    let base_glyphs_v1_offset = layer_offset + 4 * layers.len() as u32;

    let mut data = Vec::new();
    data.write_u16::<BigEndian>(1).unwrap(); // version
    data.write_u16::<BigEndian>(base_glyphs.len() as u16).unwrap();
    data.write_u32::<BigEndian>(base_glyph_offset).unwrap();
    data.write_u32::<BigEndian>(layer_offset).unwrap();
    data.write_u16::<BigEndian>(layers.len() as u16).unwrap();
    data.write_u32::<BigEndian>(base_glyphs_v1_offset).unwrap();
    write_v0_records(&mut data, base_glyphs, layers);
    assert_eq!(data.len(), base_glyphs_v1_offset as usize);
    data.extend(base_glyph_v1_array(glyphs));
    data
}

/// A BaseGlyphV1 array: count, records, then each glyph's LayerV1 array.
pub fn base_glyph_v1_array(glyphs: &[GlyphPaints]) -> Vec<u8> {
    let layer_arrays = glyphs
        .iter()
        .map(|(_, layers)| layer_v1_array(layers))
        .collect::<Vec<_>>();

    let mut data = Vec::new();
    data.write_u32::<BigEndian>(glyphs.len() as u32).unwrap();
    let mut layer_array_offset = 4 + 6 * glyphs.len() as u32;
    for ((glyph_id, _), layer_array) in glyphs.iter().zip(&layer_arrays) {
        data.write_u16::<BigEndian>(*glyph_id).unwrap();
        data.write_u32::<BigEndian>(layer_array_offset).unwrap();
        layer_array_offset += layer_array.len() as u32;
    }
    for layer_array in layer_arrays {
        data.extend(layer_array);
    }
    data
}

/// A LayerV1 array: count, records, then the paints. Paint offsets are from the array start.
pub fn layer_v1_array(layers: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u32::<BigEndian>(layers.len() as u32).unwrap();
    let mut paint_offset = 4 + 6 * layers.len() as u32;
    for (glyph_id, paint) in layers {
        data.write_u16::<BigEndian>(*glyph_id).unwrap();
        data.write_u32::<BigEndian>(paint_offset).unwrap();
        paint_offset += paint.len() as u32;
    }
    for (_, paint) in layers {
        data.extend_from_slice(paint);
    }
    data
}

pub fn solid_paint(palette_index: u16, alpha: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<BigEndian>(PAINT_SOLID).unwrap();
    data.write_u16::<BigEndian>(palette_index).unwrap();
    data.write_u16::<BigEndian>(alpha).unwrap();
    data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
    data
}

/// A ColorLine with stops of (stop offset, palette index, alpha).
pub fn color_line(extend: u16, stops: &[(u16, u16, u16)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<BigEndian>(extend).unwrap();
    data.write_u16::<BigEndian>(stops.len() as u16).unwrap();
    for &(stop_offset, palette_index, alpha) in stops {
        data.write_u16::<BigEndian>(stop_offset).unwrap();
        data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
        data.write_u16::<BigEndian>(palette_index).unwrap();
        data.write_u16::<BigEndian>(alpha).unwrap();
        data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
    }
    data
}

fn write_coord(data: &mut Vec<u8>, value: i16) {
    data.write_i16::<BigEndian>(value).unwrap();
    data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
}

/// The size of a linear gradient paint record, not including its colour line.
pub const LINEAR_GRADIENT_SIZE: usize = 2 + 4 + 6 * 6;
/// The size of a radial gradient paint record, not including its colour line and affine.
pub const RADIAL_GRADIENT_SIZE: usize = 2 + 4 + 6 * 6 + 4;

/// A linear gradient with its colour line placed directly after the paint record.
pub fn linear_paint(color_line: &[u8], points: [(i16, i16); 3]) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<BigEndian>(PAINT_LINEAR_GRADIENT).unwrap();
    data.write_u32::<BigEndian>(LINEAR_GRADIENT_SIZE as u32)
        .unwrap();
    for (x, y) in points {
        write_coord(&mut data, x);
        write_coord(&mut data, y);
    }
    assert_eq!(data.len(), LINEAR_GRADIENT_SIZE);
    data.extend_from_slice(color_line);
    data
}

/// A radial gradient followed by its colour line and, if present, its affine.
pub fn radial_paint(
    color_line: &[u8],
    c0: (i16, i16),
    r0: u16,
    c1: (i16, i16),
    r1: u16,
    affine: Option<[i32; 4]>,
) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<BigEndian>(PAINT_RADIAL_GRADIENT).unwrap();
    data.write_u32::<BigEndian>(RADIAL_GRADIENT_SIZE as u32)
        .unwrap();
    write_coord(&mut data, c0.0);
    write_coord(&mut data, c0.1);
    data.write_u16::<BigEndian>(r0).unwrap();
    data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
    write_coord(&mut data, c1.0);
    write_coord(&mut data, c1.1);
    data.write_u16::<BigEndian>(r1).unwrap();
    data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
    let affine_offset = match affine {
        Some(_) => (RADIAL_GRADIENT_SIZE + color_line.len()) as u32,
        None => 0,
    };
    data.write_u32::<BigEndian>(affine_offset).unwrap();
    assert_eq!(data.len(), RADIAL_GRADIENT_SIZE);
    data.extend_from_slice(color_line);
    if let Some(components) = affine {
        for component in components {
            data.write_i32::<BigEndian>(component).unwrap();
            data.write_u32::<BigEndian>(JUNK_VAR_INDEX).unwrap();
        }
    }
    data
}

/// A `maxp` version 0.5 table.
pub fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u32::<BigEndian>(0x0000_5000).unwrap();
    data.write_u16::<BigEndian>(num_glyphs).unwrap();
    data
}

/// A `CPAL` table. Colours are (blue, green, red, alpha). Supplying `palette_types` produces a
/// version 1 table.
pub fn cpal(palettes: &[&[(u8, u8, u8, u8)]], palette_types: Option<&[u32]>) -> Vec<u8> {
    let num_palette_entries = palettes.first().map_or(0, |palette| palette.len());
    let num_color_records = palettes.iter().map(|palette| palette.len()).sum::<usize>();
    let version = if palette_types.is_some() { 1 } else { 0 };
    let header_size = 12 + 2 * palettes.len() + if version == 1 { 12 } else { 0 };
    let color_records_offset = header_size;
    let palette_types_offset = color_records_offset + 4 * num_color_records;

    let mut data = Vec::new();
    data.write_u16::<BigEndian>(version).unwrap();
    data.write_u16::<BigEndian>(num_palette_entries as u16)
        .unwrap();
    data.write_u16::<BigEndian>(palettes.len() as u16).unwrap();
    data.write_u16::<BigEndian>(num_color_records as u16).unwrap();
    data.write_u32::<BigEndian>(color_records_offset as u32)
        .unwrap();
    let mut first_record = 0;
    for palette in palettes {
        data.write_u16::<BigEndian>(first_record).unwrap();
        first_record += palette.len() as u16;
    }
    if version == 1 {
        data.write_u32::<BigEndian>(palette_types_offset as u32)
            .unwrap();
        data.write_u32::<BigEndian>(0).unwrap(); // palette labels
        data.write_u32::<BigEndian>(0).unwrap(); // palette entry labels
    }
    assert_eq!(data.len(), header_size);
    for palette in palettes {
        for &(blue, green, red, alpha) in palette.iter() {
            data.extend_from_slice(&[blue, green, red, alpha]);
        }
    }
    if let Some(types) = palette_types {
        for &palette_type in types {
            data.write_u32::<BigEndian>(palette_type).unwrap();
        }
    }
    data
}

/// Deterministic xorshift generator for mutation sweeps.
pub struct XorShift(pub u64);

impl XorShift {
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}
