//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! `&PgPool` (or an open transaction) as the first argument.

pub mod hearing_repo;
pub mod label_repo;
pub mod organization_repo;

pub use hearing_repo::HearingRepo;
pub use label_repo::LabelRepo;
pub use organization_repo::OrganizationRepo;
