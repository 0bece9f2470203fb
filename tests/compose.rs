#[allow(dead_code)]
mod common;

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;

use colr_layers::compose::{Canvas, GreyBitmap, LayerRasterizer};
use colr_layers::error::ParseError;
use colr_layers::font::ColorFont;
use colr_layers::tables::colr::{Extend, Paint};
use colr_layers::tables::cpal::ColorRecord;
use colr_layers::tables::FontTableProvider;
use colr_layers::tag;
use colr_layers::GlyphId;

use crate::common::{color_line, colr_v1, cpal, linear_paint, maxp, radial_paint, solid_paint};

struct Tables(HashMap<u32, Vec<u8>>);

impl FontTableProvider for Tables {
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError> {
        Ok(self.0.get(&tag).map(|data| Cow::from(&data[..])))
    }

    fn has_table(&self, tag: u32) -> bool {
        self.0.contains_key(&tag)
    }
}

const RED: (u8, u8, u8, u8) = (0, 0, 255, 255);
const BLUE: (u8, u8, u8, u8) = (255, 0, 0, 255);
const TRANSLUCENT_GREEN: (u8, u8, u8, u8) = (0, 255, 0, 128);

// Glyph 10 is a red square under a foreground square offset one pixel right.
// Glyph 11 references palette entry 5 which no palette has.
// Glyph 12 has v1 paints only.
fn font() -> ColorFont {
    let base_glyphs = [(10, 0, 2), (11, 2, 1), (13, 3, 1)];
    let layers = [(20, 0), (21, 0xFFFF), (20, 5), (21, 2)];
    let gradient_line = color_line(1, &[(0, 0, 0x4000), (0x4000, 1, 0x2000)]);
    let glyphs = [(
        12,
        vec![
            (20, solid_paint(1, 0x4000)),
            (21, linear_paint(&gradient_line, [(0, 0), (100, 0), (0, 100)])),
            (22, radial_paint(&gradient_line, (0, 0), 10, (5, 5), 50, None)),
        ],
    )];
    let colr = colr_v1(&base_glyphs, &layers, &glyphs);

    let mut tables = HashMap::new();
    tables.insert(tag::COLR, colr);
    tables.insert(
        tag::CPAL,
        cpal(&[&[RED, BLUE, TRANSLUCENT_GREEN], &[BLUE, RED, RED]], None),
    );
    tables.insert(tag::MAXP, maxp(30));
    ColorFont::load(&Tables(tables)).unwrap().unwrap()
}

/// Glyph 20 is a 2x2 block at the origin, glyph 21 the same block one pixel to the right.
struct Blocks;

impl LayerRasterizer for Blocks {
    type Error = Infallible;

    fn rasterize(&mut self, glyph_id: GlyphId) -> Result<Option<GreyBitmap>, Infallible> {
        let bitmap = match glyph_id {
            20 => GreyBitmap::new(0, 2, 2, 2, vec![255; 4]),
            21 => GreyBitmap::new(1, 2, 2, 2, vec![255; 4]),
            _ => return Ok(None),
        };
        Ok(Some(bitmap))
    }
}

fn pixels(canvas: &Canvas) -> Vec<[u8; 4]> {
    (0..canvas.rows())
        .flat_map(|y| (0..canvas.width()).map(move |x| (x, y)))
        .map(|(x, y)| canvas.pixel(x, y).unwrap())
        .collect()
}

#[test]
fn compose_with_foreground() {
    let mut font = font();
    assert!(font.has_color_layers(10));
    assert!(font.has_color_layers(12));
    assert!(!font.has_color_layers(1));

    font.set_foreground_color(Some(ColorRecord::rgba(0, 0, 0, 255)));
    let canvas = font.compose(10, &mut Blocks).unwrap().unwrap();
    assert_eq!((canvas.left(), canvas.top()), (0, 2));
    assert_eq!((canvas.width(), canvas.rows()), (3, 2));
    let red = [0, 0, 255, 255];
    let black = [0, 0, 0, 255];
    assert_eq!(pixels(&canvas), [red, black, black, red, black, black]);
}

#[test]
fn compose_second_palette() {
    let mut font = font();
    font.select_palette(1).unwrap();
    font.set_foreground_color(Some(ColorRecord::rgba(255, 255, 255, 0)));
    let canvas = font.compose(10, &mut Blocks).unwrap().unwrap();
    // Transparent foreground leaves the first layer showing.
    assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(canvas.pixel(2, 0), Some([0, 0, 0, 0]));
}

#[test]
fn compose_translucent_layer() {
    let font = font();
    let canvas = font.compose(13, &mut Blocks).unwrap().unwrap();
    assert_eq!((canvas.left(), canvas.width()), (1, 2));
    // alpha 128 at full coverage over an empty canvas
    assert_eq!(canvas.pixel(0, 0), Some([0, 128, 0, 128]));
}

#[test]
fn compose_falls_back_to_outline() {
    let font = font();
    // Unresolvable palette entry.
    assert!(font.compose(11, &mut Blocks).unwrap().is_none());
    // No colour layers.
    assert!(font.compose(12, &mut Blocks).unwrap().is_none());
    assert!(font.compose(1, &mut Blocks).unwrap().is_none());
}

#[test]
fn decode_paint_layers() {
    let font = font();
    let layers = font
        .paint_layers(12)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        layers.iter().map(|layer| layer.glyph_id).collect::<Vec<_>>(),
        [20, 21, 22]
    );

    match &layers[0].paint {
        Paint::Solid(solid) => {
            assert_eq!(solid.color.palette_index, 1);
            assert_eq!(
                font.resolver().resolve_color_index(solid.color),
                Some(ColorRecord::rgba(0, 0, 255, 255))
            );
        }
        paint => panic!("expected solid paint, got {:?}", paint),
    }

    match &layers[1].paint {
        Paint::LinearGradient(gradient) => {
            assert_eq!(gradient.color_line.extend, Extend::Repeat);
            let stops = gradient
                .color_line
                .stops()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert_eq!(stops.len(), 2);
            assert_eq!(
                font.resolver().resolve_color_index(stops[1].color),
                Some(ColorRecord::rgba(0, 0, 255, 127))
            );
        }
        paint => panic!("expected linear gradient, got {:?}", paint),
    }

    match &layers[2].paint {
        Paint::RadialGradient(gradient) => {
            assert_eq!((gradient.r0, gradient.r1), (10, 50));
            assert_eq!(gradient.color_line.num_stops(), 2);
        }
        paint => panic!("expected radial gradient, got {:?}", paint),
    }
}
