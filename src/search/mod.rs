//! Seed match handling and the block-parallel search driver.

pub mod driver;
pub mod matches;

pub use driver::{build_database, run_search, Database, QuerySet, SearchStats};
pub use matches::{hyper_sort, merge_sibling_seeds, quick_hamming, SeedMatch, SortInterval};
