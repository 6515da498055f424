//! URL slug generation and collision resolution.
//!
//! Slugs are derived once from a hearing title and then left alone: later
//! title edits never re-derive them, and a soft-deleted hearing keeps its
//! slug reserved. Collisions are resolved by appending `-2`, `-3`, ….

use std::future::Future;

/// Used when a title produces no slug characters at all.
pub const FALLBACK_SLUG: &str = "hearing";

/// Fold a character to its ascii base letter(s) where a sensible one exists.
fn fold_char(c: char, out: &mut String) {
    let folded: &str = match c {
        'ä' | 'á' | 'à' | 'â' | 'ã' | 'å' | 'ā' => "a",
        'Ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Å' | 'Ā' => "a",
        'ö' | 'ó' | 'ò' | 'ô' | 'õ' | 'ø' | 'ō' => "o",
        'Ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ø' | 'Ō' => "o",
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'É' | 'È' | 'Ê' | 'Ë' | 'Ē' => "e",
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => "i",
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ç' | 'Ç' => "c",
        'ñ' | 'Ñ' => "n",
        'š' | 'Š' => "s",
        'ž' | 'Ž' => "z",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        _ => {
            out.push(c.to_ascii_lowercase());
            return;
        }
    };
    out.push_str(folded);
}

/// Generate a URL-safe slug from a title.
///
/// Folds common diacritics to ascii, lowercases, drops apostrophes, turns
/// every other non-alphanumeric character into a hyphen, collapses runs of
/// hyphens and trims them from both ends.
///
/// ```
/// use hearing_core::slug::slugify;
///
/// assert_eq!(slugify("Test purpose created hearing title 1"), "test-purpose-created-hearing-title-1");
/// assert_eq!(slugify("Töölönlahden puisto"), "toolonlahden-puisto");
/// ```
pub fn slugify(title: &str) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.chars() {
        fold_char(c, &mut folded);
    }

    let mut result = String::with_capacity(folded.len());
    let mut prev_hyphen = true;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if c == '\'' || c == '\u{2019}' {
            continue;
        } else if !prev_hyphen {
            result.push('-');
            prev_hyphen = true;
        }
    }

    let trimmed = result.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Candidate slugs in trial order: `base`, `base-2`, `base-3`, ….
fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((2u64..).map(move |n| format!("{base}-{n}")))
}

/// Return the first free slug for `base`.
///
/// `exists` must report every record holding the candidate, soft-deleted
/// ones included.
pub fn allocate(base: &str, mut exists: impl FnMut(&str) -> bool) -> String {
    candidates(base)
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Async form of [`allocate`] for lookups that hit storage.
pub async fn allocate_async<F, Fut, E>(base: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for candidate in candidates(base) {
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    unreachable!("slug candidate sequence is unbounded")
}
