//! Subject database indexing: suffix-array construction and the seed
//! lookup backends built on top of it.

pub mod sa_build;
pub mod seed_index;

pub use sa_build::{build_suffix_array, SaEntry, SaProgress};
pub use seed_index::{SeedHit, SeedIndex};
