//! # duke-sheets-xls
//!
//! A writer for the legacy Excel binary format (`.xls`): a BIFF5/BIFF8
//! record pipeline, a small infix-to-Ptg formula compiler, and an OLE2
//! compound-document container, wrapped in a `Workbook`/`Worksheet` API.
//!
//! This crate only writes `.xls` files; it does not read them.

mod buffer;
mod cellref;
mod error;
mod format;
mod formula;
mod ole2;
mod record;
mod records;
mod sink;
mod stream;
mod workbook;
mod worksheet;

pub use cellref::CellRef;
pub use error::{XlsError, XlsResult};
pub use format::FormatDesc;
pub use sink::{FileSink, MemorySink, Sink};
pub use workbook::{create, FormatId, Workbook};
pub use worksheet::Worksheet;
