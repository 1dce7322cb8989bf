//! Grid model shared by the reader, the template engine, the writer and the
//! layout engine.

mod style;
mod workbook;

pub use style::*;
pub use workbook::*;
