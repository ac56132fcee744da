//! Record rendering: every handler owns one `Formatter`, built from a dict-config
//! `formatters` entry or defaulted to the bare message.

mod format;

pub use format::{
    Align, DEFAULT_DATEFMT, FieldSpec, FormatSegment, FormatStyle, FormatTemplate, Formatter,
    Placeholder,
};
