//! Data ingestion: sources, CSV loading, column filtering, label encoding

pub mod filter;
pub mod labels;
pub mod loader;
pub mod matrix;
pub mod source;

pub use filter::{restrict_to, ColumnFilter, DropReason, DroppedColumn, FilteredTable};
pub use labels::ClassLabels;
pub use loader::{describe, save_csv, ColumnInfo, DataLoader, NULL_TOKENS};
pub use matrix::{columns_to_array2, MedianImputer};
pub use source::DataSource;
