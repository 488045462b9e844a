//! Foundation types shared by tree building and event search.

pub mod types;
