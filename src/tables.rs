//! OpenType font table parsing.

pub mod colr;
pub mod cpal;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::{I32Be, U16Be};
use crate::error::ParseError;

use std::borrow::Cow;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// The F2DOT14 format consists of a signed, 2’s complement integer and an unsigned fraction.
///
/// To compute the actual value, take the integer and add the fraction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct F2Dot14(u16);

/// Source of the raw data of the tables in a font.
///
/// Table data is owned by the provider; callers copy out what they need to keep.
pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError>;

    fn has_table(&self, tag: u32) -> bool;
}

impl<T: FontTableProvider> FontTableProvider for Box<T> {
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError> {
        self.as_ref().table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.as_ref().has_table(tag)
    }
}

/// The `maxp` maximum profile table.
///
/// Only the glyph count is read; it bounds the glyph ids that colour layers may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxpTable {
    pub num_glyphs: u16,
}

impl ReadBinary for MaxpTable {
    type HostType<'a> = MaxpTable;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x00005000 || version == 0x00010000)?;
        let num_glyphs = ctxt.read_u16be()?;
        Ok(MaxpTable { num_glyphs })
    }
}

impl Fixed {
    /// One, in 16.16 format.
    pub const ONE: Fixed = Fixed(0x0001_0000);
    pub const ZERO: Fixed = Fixed(0);

    pub fn new(value: i32) -> Fixed {
        Fixed(value)
    }

    /// The raw 16.16 value.
    pub fn raw_value(self) -> i32 {
        self.0
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        (f64::from(value.0) / 65536.0) as f32
    }
}

impl F2Dot14 {
    /// One, in 2.14 format.
    pub const ONE: F2Dot14 = F2Dot14(0x4000);

    pub fn new(value: u16) -> Self {
        F2Dot14(value)
    }

    /// The raw 2.14 bits.
    pub fn raw_value(self) -> u16 {
        self.0
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = U16Be;

    fn read_from(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> Self {
        // The F2DOT14 format consists of a signed, 2’s complement integer and an unsigned fraction.
        let int: i8 = match value.0 >> 14 {
            0b00 => 0,
            0b01 => 1,
            0b10 => -2,
            0b11 => -1,
            _ => unreachable!(),
        };
        let fraction = value.0 & 0x3FFF;
        f32::from(int) + (f32::from(fraction) / 16384.)
    }
}
