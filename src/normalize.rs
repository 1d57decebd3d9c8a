//! Path normalization for key comparison
//!
//! Presentation code refers to photos as `/images/Photos/Tabling/foo.jpg`
//! while the bucket stores `Tabling/foo.jpg`. Both sides are canonicalized
//! here before the matcher compares them.

use percent_encoding::percent_decode_str;

/// Local prefix for the photo tree. Checked before [`IMAGES_PREFIX`].
pub const PHOTOS_PREFIX: &str = "/images/photos/";

/// Local prefix for everything else under `public/images`
pub const IMAGES_PREFIX: &str = "/images/";

/// Canonicalize a path for comparison.
///
/// Percent-decodes, lowercases and trims. With `is_local` the
/// `/images/photos/` prefix is stripped, or failing that `/images/`. Leading
/// and trailing slashes are removed last.
///
/// Never fails. An empty result means no match is possible.
///
/// ```
/// use chapter_images::normalize::normalize;
///
/// assert_eq!(normalize("/images/Photos/Tabling/Foo%20Bar.JPG", true), "tabling/foo bar.jpg");
/// assert_eq!(normalize("/images/ASCELOGO/ASCE.png", true), "ascelogo/asce.png");
/// assert_eq!(normalize("FGM Pics/possiblefrontpage.JPG", false), "fgm pics/possiblefrontpage.jpg");
/// assert_eq!(normalize("   ", true), "");
/// ```
pub fn normalize(path: &str, is_local: bool) -> String {
    let decoded = decode_fully(path).to_lowercase();
    let mut rest = decoded.trim();

    if is_local {
        // Longer prefix first so "/images/photos/x" does not become "photos/x"
        if let Some(stripped) = rest.strip_prefix(PHOTOS_PREFIX) {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix(IMAGES_PREFIX) {
            rest = stripped;
        }
    }

    rest.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Percent-decode until the string stops changing.
///
/// Decoding `%2541` once yields `%41`; stopping there would let a second
/// normalization produce a different answer.
fn decode_fully(path: &str) -> String {
    let mut current = path.to_string();
    loop {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        if decoded == current {
            return current;
        }
        current = decoded;
    }
}

/// Last segment of a normalized path
pub fn file_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Everything before the last segment, without the joining slash
pub fn parent_path(normalized: &str) -> &str {
    match normalized.rfind('/') {
        Some(idx) => &normalized[..idx],
        None => "",
    }
}

/// True when `path` already points somewhere absolute and needs no lookup
pub fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http")
}
