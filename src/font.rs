//! Colour glyph support for a font face.
//!
//! A [ColorFont] loads the `COLR`, `CPAL`, and `maxp` tables of a face once and holds them for
//! the lifetime of the face, along with the active palette and foreground colour.

use ouroboros::self_referencing;

use crate::binary::read::ReadScope;
use crate::compose::{self, Canvas, ColorPalette, ColorResolver, LayerRasterizer};
use crate::error::{ColrError, ComposeError, ParseError};
use crate::tables::colr::{ColrTable, LayerLimits, Layers, PaintLayers};
use crate::tables::cpal::{ColorRecord, CpalTable, PaletteFlags};
use crate::tables::{FontTableProvider, MaxpTable};
use crate::{tag, GlyphId};

use log::debug;

#[self_referencing]
struct Cpal {
    data: Box<[u8]>,
    #[borrows(data)]
    #[not_covariant]
    table: CpalTable<'this>,
}

/// The colour layer tables of a font face.
pub struct ColorFont {
    colr: ColrTable,
    cpal: Cpal,
    num_glyphs: u16,
    num_palettes: u16,
    num_palette_entries: u16,
    palette: SelectedPalette,
    foreground: Option<ColorRecord>,
}

/// The colours of the active palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPalette {
    index: u16,
    colors: Vec<ColorRecord>,
    flags: PaletteFlags,
}

impl ColorFont {
    /// Load the colour tables of a face.
    ///
    /// Returns `Ok(None)` if the face has no `COLR` table. A `COLR` table without a `CPAL` table
    /// is an error. Palette 0 is selected.
    pub fn load<T: FontTableProvider>(provider: &T) -> Result<Option<ColorFont>, ColrError> {
        let Some(colr_data) = provider.table_data(tag::COLR)? else {
            return Ok(None);
        };
        let cpal_data = provider
            .table_data(tag::CPAL)?
            .ok_or(ColrError::MissingTable(tag::CPAL))?;
        let maxp_data = provider
            .table_data(tag::MAXP)?
            .ok_or(ColrError::MissingTable(tag::MAXP))?;
        let maxp = ReadScope::new(&maxp_data).read::<MaxpTable>()?;

        let colr = ColrTable::load(colr_data.into_owned())?;
        let cpal = CpalTryBuilder {
            data: cpal_data.into_owned().into_boxed_slice(),
            table_builder: |data| ReadScope::new(data).read::<CpalTable<'_>>(),
        }
        .try_build()?;
        let (num_palettes, num_palette_entries) =
            cpal.with_table(|table| (table.num_palettes(), table.num_palette_entries()));
        let palette = select(&cpal, 0)?;
        debug!(
            "loaded COLR version {} with {} palettes of {} entries",
            colr.version(),
            num_palettes,
            num_palette_entries
        );

        Ok(Some(ColorFont {
            colr,
            cpal,
            num_glyphs: maxp.num_glyphs,
            num_palettes,
            num_palette_entries,
            palette,
            foreground: None,
        }))
    }

    pub fn colr(&self) -> &ColrTable {
        &self.colr
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn num_palettes(&self) -> u16 {
        self.num_palettes
    }

    pub fn num_palette_entries(&self) -> u16 {
        self.num_palette_entries
    }

    /// The active palette.
    pub fn palette(&self) -> &SelectedPalette {
        &self.palette
    }

    /// Make the palette at `index` active.
    ///
    /// If there is no such palette the current palette stays active.
    pub fn select_palette(&mut self, index: u16) -> Result<(), ParseError> {
        self.palette = select(&self.cpal, index)?;
        debug!("selected palette {}", index);
        Ok(())
    }

    pub fn foreground_color(&self) -> Option<ColorRecord> {
        self.foreground
    }

    /// Set the colour used for layers with the foreground palette index.
    ///
    /// With `None` a default is chosen from the active palette's flags.
    pub fn set_foreground_color(&mut self, color: Option<ColorRecord>) {
        self.foreground = color;
    }

    /// Limits for validating the layers of this face.
    pub fn limits(&self) -> LayerLimits {
        LayerLimits::new(self.num_glyphs, self.num_palette_entries)
    }

    /// True if `glyph_id` has v0 or v1 colour layer records.
    pub fn has_color_layers(&self, glyph_id: GlyphId) -> bool {
        self.colr.find_base_glyph(glyph_id).is_some()
            || self.colr.find_base_glyph_v1(glyph_id).is_some()
    }

    /// Iterate over the v0 colour layers of `glyph_id`.
    pub fn layers(&self, glyph_id: GlyphId) -> Layers<'_> {
        self.colr.layers(glyph_id, self.limits())
    }

    /// Iterate over the v1 colour layers of `glyph_id`.
    pub fn paint_layers(&self, glyph_id: GlyphId) -> PaintLayers<'_> {
        self.colr.paint_layers(glyph_id, self.limits())
    }

    /// Colour resolution with the active palette and foreground colour.
    pub fn resolver(&self) -> ColorResolver<'_, SelectedPalette> {
        ColorResolver::new(&self.palette, self.foreground)
    }

    /// Composite the v0 colour layers of `glyph_id`.
    ///
    /// See [compose_glyph](compose::compose_glyph).
    pub fn compose<R: LayerRasterizer>(
        &self,
        glyph_id: GlyphId,
        rasterizer: &mut R,
    ) -> Result<Option<Canvas>, ComposeError<R::Error>> {
        compose::compose_glyph(
            &self.colr,
            glyph_id,
            self.limits(),
            &self.resolver(),
            rasterizer,
        )
    }
}

fn select(cpal: &Cpal, index: u16) -> Result<SelectedPalette, ParseError> {
    cpal.with_table(|table| {
        let palette = table.palette(index).ok_or(ParseError::BadIndex)?;
        let colors = (0..palette.num_entries())
            .map(|entry| palette.color(entry).ok_or(ParseError::BadIndex))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SelectedPalette {
            index,
            colors,
            flags: palette.flags(),
        })
    })
}

impl SelectedPalette {
    /// Index of this palette in the `CPAL` table.
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn colors(&self) -> &[ColorRecord] {
        &self.colors
    }
}

impl ColorPalette for SelectedPalette {
    fn num_entries(&self) -> u16 {
        // Read from a u16 count.
        self.colors.len() as u16
    }

    fn entry(&self, index: u16) -> Option<ColorRecord> {
        self.colors.get(usize::from(index)).copied()
    }

    fn flags(&self) -> PaletteFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::GreyBitmap;
    use crate::tests::{colr_v0, colr_v1, cpal, maxp, solid_paint, TestProvider};

    const PALETTES: [&[(u8, u8, u8, u8)]; 2] = [
        &[(0, 0, 255, 255), (255, 0, 0, 255)],
        &[(0, 255, 0, 255), (0, 0, 0, 128)],
    ];

    fn provider(colr: Vec<u8>) -> TestProvider {
        TestProvider::default()
            .with_table(tag::COLR, colr)
            .with_table(tag::CPAL, cpal(&PALETTES, Some(&[0, 2][..])))
            .with_table(tag::MAXP, maxp(20))
    }

    struct Squares;

    impl LayerRasterizer for Squares {
        type Error = ParseError;

        fn rasterize(&mut self, glyph_id: GlyphId) -> Result<Option<GreyBitmap>, ParseError> {
            let size = u32::from(glyph_id);
            let len = usize::from(glyph_id) * usize::from(glyph_id);
            Ok(Some(GreyBitmap::new(0, size as i32, size, size, vec![255; len])))
        }
    }

    #[test]
    fn load_without_colr() {
        let provider = TestProvider::default()
            .with_table(tag::CPAL, cpal(&PALETTES, None))
            .with_table(tag::MAXP, maxp(20));
        assert!(ColorFont::load(&provider).unwrap().is_none());
    }

    #[test]
    fn load_requires_cpal() {
        let provider = TestProvider::default()
            .with_table(tag::COLR, colr_v0(&[(1, 0, 1)], &[(2, 0)]))
            .with_table(tag::MAXP, maxp(20));
        assert_eq!(
            ColorFont::load(&provider).err(),
            Some(ColrError::MissingTable(tag::CPAL))
        );
    }

    #[test]
    fn load_invalid_colr() {
        let mut colr = colr_v0(&[(1, 0, 1)], &[(2, 0)]);
        colr.truncate(16);
        assert_eq!(
            ColorFont::load(&provider(colr)).err(),
            Some(ColrError::InvalidTable)
        );
    }

    #[test]
    fn load_invalid_cpal() {
        let provider = provider(colr_v0(&[(1, 0, 1)], &[(2, 0)]))
            .with_table(tag::CPAL, cpal(&[], None));
        assert_eq!(
            ColorFont::load(&provider).err(),
            Some(ColrError::Parse(ParseError::BadValue))
        );
    }

    #[test]
    fn load_face() {
        let font = ColorFont::load(&provider(colr_v0(&[(1, 0, 1)], &[(2, 0)])))
            .unwrap()
            .unwrap();
        assert_eq!(font.num_glyphs(), 20);
        assert_eq!(font.num_palettes(), 2);
        assert_eq!(font.num_palette_entries(), 2);
        assert_eq!(font.limits(), LayerLimits::new(20, 2));
        assert_eq!(font.palette().index(), 0);
        assert_eq!(
            font.palette().colors(),
            &[
                ColorRecord::rgba(255, 0, 0, 255),
                ColorRecord::rgba(0, 0, 255, 255)
            ]
        );
        assert!(font.has_color_layers(1));
        assert!(!font.has_color_layers(2));
    }

    #[test]
    fn select_palette() {
        let mut font = ColorFont::load(&provider(colr_v0(&[(1, 0, 1)], &[(2, 0)])))
            .unwrap()
            .unwrap();
        assert_eq!(font.resolver().resolve(0xFFFF), Some(ColorRecord::BLACK));

        font.select_palette(1).unwrap();
        assert_eq!(font.palette().index(), 1);
        assert_eq!(font.resolver().resolve(0), Some(ColorRecord::rgba(0, 255, 0, 255)));
        assert_eq!(font.resolver().resolve(0xFFFF), Some(ColorRecord::WHITE));

        assert_eq!(font.select_palette(2), Err(ParseError::BadIndex));
        assert_eq!(font.palette().index(), 1);
    }

    #[test]
    fn foreground_override() {
        let mut font = ColorFont::load(&provider(colr_v0(&[(1, 0, 2)], &[(2, 0), (1, 0xFFFF)])))
            .unwrap()
            .unwrap();
        let green = ColorRecord::rgba(0, 255, 0, 255);
        font.set_foreground_color(Some(green));
        assert_eq!(font.foreground_color(), Some(green));

        let canvas = font.compose(1, &mut Squares).unwrap().unwrap();
        assert_eq!((canvas.width(), canvas.rows()), (2, 2));
        // The 1x1 foreground layer covers the bottom left pixel.
        assert_eq!(canvas.pixel(0, 1), Some([0, 255, 0, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 255, 255]));

        font.set_foreground_color(None);
        let canvas = font.compose(1, &mut Squares).unwrap().unwrap();
        assert_eq!(canvas.pixel(0, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn layer_glyphs_checked_against_maxp() {
        let font = ColorFont::load(&provider(colr_v0(&[(1, 0, 1)], &[(20, 0)])))
            .unwrap()
            .unwrap();
        assert_eq!(
            font.layers(1).collect::<Vec<_>>(),
            vec![Err(ParseError::BadIndex)]
        );
        assert_eq!(font.compose(1, &mut Squares), Ok(None));
    }

    #[test]
    fn paint_layers() {
        let glyphs = vec![(3, vec![(4, solid_paint(1, 0x4000))])];
        let font = ColorFont::load(&provider(colr_v1(&[], &[], &glyphs)))
            .unwrap()
            .unwrap();
        assert!(font.has_color_layers(3));
        let layers = font
            .paint_layers(3)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].glyph_id, 4);
        assert_eq!(font.compose(3, &mut Squares), Ok(None));
    }
}
