// A document's `data` payload is arbitrary YAML, which bridges losslessly
// onto serde_json::Value for the subset the wire accepts. This crate holds
// the structural operations over those values: parsed data paths with
// query / create / remove, and the recursive merge used by layering.

pub mod ptr;
pub use ptr::{ParseError, Path, Step};

mod merge;
pub use merge::deep_merge;
