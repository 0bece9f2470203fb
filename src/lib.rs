#![warn(rust_2018_idioms)]

//! Decoding of `COLR` colour layers and compositing of the rendered layers.
//!
//! The `COLR` table is untrusted input. It is validated once when loaded into a
//! [ColrTable][tables::colr::ColrTable] and every subsequent traversal of layers, paints and
//! colour stops is bounds checked against the table data.

/// Reading of binary data.
pub mod binary;
pub mod compose;
pub mod error;
pub mod font;
pub mod size;
pub mod tables;
pub mod tag;

/// A glyph index.
pub type GlyphId = u16;

/// Losslessly convert `T` into `Self`.
///
/// Used for widening offsets and counts read from font data into `usize`.
pub trait SafeFrom<T>: Sized {
    /// Perform the conversion.
    fn safe_from(t: T) -> Self;
}

impl SafeFrom<u8> for usize {
    #[inline]
    fn safe_from(v: u8) -> Self {
        usize::from(v)
    }
}

impl SafeFrom<u16> for usize {
    #[inline]
    fn safe_from(v: u16) -> Self {
        usize::from(v)
    }
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl SafeFrom<u32> for usize {
    #[inline]
    fn safe_from(v: u32) -> Self {
        v as usize
    }
}
