//! Plain-text rendering of stored tracking data.

use std::fmt::Write;

use crate::association::TrackingRecord;

pub const NO_RECORDS: &str = "No tracking data found in the database.";
pub const NO_TABLES: &str = "No tables found in the database.";

const HEADER: &str = "Frame | Object ID | X1 | Y1 | X2 | Y2 | Confidence";
const RULE: &str = "---------------------------------------------------";

/// One row per record under a fixed header, or [`NO_RECORDS`].
pub fn format_records(records: &[TrackingRecord]) -> String {
    if records.is_empty() {
        return format!("{NO_RECORDS}\n");
    }
    let mut out = format!("{HEADER}\n{RULE}\n");
    for r in records {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{:5} | {:9} | {:3} | {:3} | {:3} | {:3} | {:.2}",
            r.frame_number, r.track_id, r.x1, r.y1, r.x2, r.y2, r.confidence
        );
    }
    out
}

pub fn format_tables(tables: &[String]) -> String {
    if tables.is_empty() {
        return format!("{NO_TABLES}\n");
    }
    let mut out = String::from("Tables in the database:\n");
    for table in tables {
        let _ = writeln!(out, "- {table}");
    }
    out
}
