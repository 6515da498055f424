//! Random identifiers for hearings, sections, images and preview codes.

use rand::Rng;

/// Length of generated hearing, section and image ids.
pub const ID_LENGTH: usize = 32;

/// Length of the preview code granting read access to unpublished hearings.
pub const PREVIEW_CODE_LENGTH: usize = 32;

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a new entity id.
pub fn generate_id() -> String {
    random_alphanumeric(ID_LENGTH)
}

pub fn generate_preview_code() -> String {
    random_alphanumeric(PREVIEW_CODE_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_alphanumeric_and_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), ID_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
