//! CSV/TSV table readers and writers.
pub mod csv_table;

pub use csv_table::{read_table, read_table_with, write_table, ReadOptions, RowFilter};
