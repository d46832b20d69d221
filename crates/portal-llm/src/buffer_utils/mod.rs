mod buffering;

pub use buffering::{LineBuffer, LineError, DEFAULT_MAX_LINE_LENGTH};
