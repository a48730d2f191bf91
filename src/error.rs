//! XLS error types.

use thiserror::Error;

/// Result type for XLS writing operations.
pub type XlsResult<T> = std::result::Result<T, XlsError>;

/// Errors that can occur while building and writing an XLS file.
#[derive(Debug, Error)]
pub enum XlsError {
    /// The host's `f64` representation does not match IEEE-754 little-endian
    /// or big-endian layout, so doubles cannot be written losslessly.
    #[error("host float representation is not IEEE-754; cannot write BIFF doubles")]
    EndiannessUnsupported,

    /// A cell write addressed a row or column past the BIFF5/8 worksheet limit.
    #[error("cell address out of range: row {row} (max 65535), col {col} (max 255)")]
    OutOfRange { row: u32, col: u32 },

    /// A formula could not be compiled into a Ptg token stream.
    #[error("formula syntax error: {0}")]
    FormulaSyntax(String),

    /// The finished BIFF stream exceeds the OLE2 container's addressable size.
    #[error("workbook BIFF stream of {actual} bytes exceeds the {limit} byte limit")]
    WorkbookTooLarge { actual: usize, limit: usize },

    /// The sink reported an I/O failure.
    #[error("sink I/O error: {0}")]
    SinkIOError(#[from] std::io::Error),
}
