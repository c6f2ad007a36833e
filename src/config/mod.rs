pub mod ai;
pub mod compliance;
