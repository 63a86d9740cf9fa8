// Error taxonomy and per-document diagnostics (replaces process-wide logger state).

pub mod context;
pub mod error;

pub use context::{DiagnosticsReport, ParsingContext};
pub use error::{ErrorCode, ParserError, Severity};
