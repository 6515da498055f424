//! Row types for the hearing tables and their conversion into domain types.

pub mod hearing;
pub mod label;
pub mod organization;
pub mod section;
