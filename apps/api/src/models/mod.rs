pub mod candidate;
pub mod records;
