//! Exit code registry — single source of truth for scripted callers.

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_IO: u8 = 3;
pub const EXIT_PARSE: u8 = 4;

// Correction workflow
pub const EXIT_GATE: u8 = 10; // local validation gate rejected the value
pub const EXIT_STILL_INVALID: u8 = 11; // backend kept the row in errors
pub const EXIT_ANOMALY: u8 = 12; // verdict had no outcome for the row
pub const EXIT_NETWORK: u8 = 13;
pub const EXIT_ERRORS_REMAIN: u8 = 14; // export/load refused, errors left
pub const EXIT_ROW_NOT_FOUND: u8 = 15;
