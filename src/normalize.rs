// 🔤 Text normalization
// `normalize_name` is the single definition of "same name" used by matching and inference.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Typographic apostrophes folded to ASCII before stripping
const APOSTROPHES: [char; 4] = ['\u{2019}', '\'', '`', '\u{b4}'];

/// Default maximum slug length
pub const SLUG_MAX_LEN: usize = 80;

/// Normalize a venue name for comparison.
///
/// NFKC fold, lowercase, typographic apostrophes folded, everything outside
/// `[a-z0-9 &-]` dropped, whitespace collapsed.
///
/// ```
/// use place_reconciliation::normalize::normalize_name;
///
/// assert_eq!(normalize_name("  Trader Vic’s  Muscat "), "trader vics muscat");
/// assert_eq!(normalize_name("Ｃａｆé Barista & Co."), "caf barista & co");
/// ```
pub fn normalize_name(s: &str) -> String {
    let folded: String = s.trim().nfkc().collect::<String>().to_lowercase();

    let kept: String = folded
        .chars()
        .map(|c| if APOSTROPHES.contains(&c) { '\'' } else { c })
        .filter(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '&' || *c == '-'
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sort whitespace tokens and rejoin them (word-order-insensitive form)
pub fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// URL-safe slug: ascii-folded, lowercase, non-alphanumeric runs collapsed
/// to `-`, truncated to `max_len` characters.
///
/// Names with no ASCII-foldable characters at all (e.g. Arabic-only names)
/// get a stable `place-<hash>` slug instead of an empty one.
pub fn slugify(s: &str, max_len: usize) -> String {
    let ascii: String = s
        .trim()
        .nfkc()
        .collect::<String>()
        .nfkd()
        .filter(char::is_ascii)
        .filter(|c| !APOSTROPHES.contains(c))
        .collect::<String>()
        .to_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_sep = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        slug = fallback_slug(s);
    }

    let truncated: String = slug.chars().take(max_len).collect();
    truncated.trim_end_matches('-').to_string()
}

fn fallback_slug(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.trim().nfkc().collect::<String>().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("place-{}", &digest[..8])
}

// ============================================================================
// TESTS
// ============================================================================
