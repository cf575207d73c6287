pub mod column_type;
pub mod dataset;
pub mod filter;
pub mod station;
