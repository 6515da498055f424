/// Database primary keys for shared lookup rows (labels, organizations, users).
pub type DbId = i64;

/// Hearings, sections and images use opaque string identifiers.
pub type HearingId = String;
pub type SectionId = String;
pub type ImageId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
