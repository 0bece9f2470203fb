//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
///
/// During layer, paint, and colour stop traversal any of these terminates the traversal. The
/// glyph should then be treated as having no colour layers.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when loading the colour tables of a font
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ColrError {
    /// The `COLR` table failed structural validation. No part of it is retained.
    InvalidTable,
    /// A table required alongside `COLR` is absent.
    MissingTable(u32),
    /// A companion table could not be parsed.
    Parse(ParseError),
}

impl From<ParseError> for ColrError {
    fn from(error: ParseError) -> Self {
        ColrError::Parse(error)
    }
}

impl fmt::Display for ColrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColrError::InvalidTable => write!(f, "invalid COLR table"),
            ColrError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ColrError::Parse(err) => write!(f, "colour table parse: {}", err),
        }
    }
}

impl std::error::Error for ColrError {}

/// Errors that originate when blending a layer into a canvas
///
/// The canvas is left unmodified when any of these is returned.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum BlendError {
    /// The canvas buffer could not be allocated.
    AllocFailed,
    /// The layer or combined canvas geometry is outside the supported range.
    TooLarge,
    /// The source bitmap holds less data than its dimensions require.
    BadBitmap,
}

impl fmt::Display for BlendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendError::AllocFailed => write!(f, "unable to allocate canvas"),
            BlendError::TooLarge => write!(f, "canvas dimensions too large"),
            BlendError::BadBitmap => write!(f, "layer bitmap is smaller than its dimensions"),
        }
    }
}

impl std::error::Error for BlendError {}

/// Error returned when composing a colour glyph from its layers
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ComposeError<E> {
    Blend(BlendError),
    Rasterize(E),
}

impl<E> From<BlendError> for ComposeError<E> {
    fn from(error: BlendError) -> Self {
        ComposeError::Blend(error)
    }
}

impl<E: fmt::Display> fmt::Display for ComposeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Blend(err) => write!(f, "blend: {}", err),
            ComposeError::Rasterize(err) => write!(f, "rasterize layer: {}", err),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ComposeError<E> {}
