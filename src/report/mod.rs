//! CSV post-processing: cell/column cleaning, scraped-table normalization
//! and cross-account consolidation.

mod clean;
mod consolidate;
mod table;

pub use clean::{clean_cell, clean_column};
pub use consolidate::consolidate;
pub use table::ScrapedTable;

/// Column cleaned in scraped order tables.
pub const STOCK_COLUMN: &str = "Stock";
