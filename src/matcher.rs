//! Key matching between logical image paths and bucket keys
//!
//! The bucket's layout drifted from the site's folder structure: some photos
//! sit at the same relative path, others were re-filed under deeper
//! folders. Matching therefore runs three stages, first success wins:
//!
//! 1. **Exact** - normalized key equals the normalized local path
//! 2. **Filename** - exactly one key has the same file name
//! 3. **Tie-break** - several keys share the file name; prefer the one whose
//!    parent folder ends with the requested parent folder
//!
//! ```
//! use chapter_images::matcher::find_key;
//!
//! let keys = vec![
//!     "FGM Pics/possiblefrontpage.JPG".to_string(),
//!     "Archive/Old/FGM Pics/possiblefrontpage.JPG".to_string(),
//! ];
//! let key = find_key("/images/Photos/FGM Pics/possiblefrontpage.JPG", &keys);
//! assert_eq!(key.as_deref(), Some("FGM Pics/possiblefrontpage.JPG"));
//! ```

use crate::normalize::{file_name, normalize, parent_path};
use tracing::debug;

/// How a key was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Filename,
    TieBreak { score: i64, candidates: usize },
}

/// Matched key plus how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatch {
    pub key: String,
    pub kind: MatchKind,
}

/// Find the bucket key that best corresponds to `local_path`.
///
/// Returns the key in its original (non-normalized) form, or `None`.
pub fn find_key(local_path: &str, keys: &[String]) -> Option<String> {
    find_match(local_path, keys).map(|m| m.key)
}

/// Same as [`find_key`] but reports which stage matched
pub fn find_match(local_path: &str, keys: &[String]) -> Option<KeyMatch> {
    let local = normalize(local_path, true);
    if local.is_empty() {
        return None;
    }

    let normalized: Vec<(String, &String)> =
        keys.iter().map(|k| (normalize(k, false), k)).collect();

    if let Some((_, key)) = normalized.iter().find(|(n, _)| *n == local) {
        debug!(path = local_path, key = key.as_str(), "exact key match");
        return Some(KeyMatch {
            key: (*key).clone(),
            kind: MatchKind::Exact,
        });
    }

    let filename = file_name(&local);
    let suffix = format!("/{}", filename);
    let candidates: Vec<&(String, &String)> = normalized
        .iter()
        .filter(|(n, _)| n == filename || n.ends_with(&suffix))
        .collect();

    match candidates.len() {
        0 => {
            debug!(path = local_path, filename, "no key matches");
            None
        }
        1 => {
            let key = candidates[0].1;
            debug!(path = local_path, key = key.as_str(), "filename key match");
            Some(KeyMatch {
                key: key.clone(),
                kind: MatchKind::Filename,
            })
        }
        count => {
            let local_parent = parent_path(&local);
            let mut best: Option<(i64, &String)> = None;

            for (norm, key) in candidates.iter().map(|c| (&c.0, c.1)) {
                let score = parent_score(local_parent, parent_path(norm));
                // Strictly greater keeps the earliest candidate on ties
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, key));
                }
            }

            best.map(|(score, key)| {
                debug!(
                    path = local_path,
                    key = key.as_str(),
                    score,
                    candidates = count,
                    "tie-break key match"
                );
                KeyMatch {
                    key: key.clone(),
                    kind: MatchKind::TieBreak {
                        score,
                        candidates: count,
                    },
                }
            })
        }
    }
}

/// Length of the local parent when the candidate's parent ends with it,
/// otherwise -1.
fn parent_score(local_parent: &str, candidate_parent: &str) -> i64 {
    if candidate_parent.ends_with(local_parent) {
        local_parent.len() as i64
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_preferred_over_filename_candidates() {
        let list = keys(&[
            "Archive/Tabling/booth.jpg",
            "Tabling/booth.jpg",
            "booth.jpg",
        ]);
        let m = find_match("/images/Photos/Tabling/booth.jpg", &list).unwrap();
        assert_eq!(m.key, "Tabling/booth.jpg");
        assert_eq!(m.kind, MatchKind::Exact);
    }

    #[test]
    fn test_exact_match_returns_original_form() {
        let list = keys(&["ASCELOGO/ASCE.png"]);
        assert_eq!(
            find_key("/images/ascelogo/asce.PNG", &list).as_deref(),
            Some("ASCELOGO/ASCE.png")
        );
    }

    #[test]
    fn test_single_filename_candidate() {
        let list = keys(&["Events/2023/Banquet/table.jpg", "Events/2023/other.jpg"]);
        let m = find_match("/images/Photos/Banquet/table.jpg", &list).unwrap();
        assert_eq!(m.key, "Events/2023/Banquet/table.jpg");
        assert_eq!(m.kind, MatchKind::Filename);
    }

    #[test]
    fn test_bare_filename_matches_any_depth() {
        let list = keys(&["a/b/c/logo.png"]);
        assert_eq!(find_key("logo.png", &list).as_deref(), Some("a/b/c/logo.png"));
    }

    #[test]
    fn test_filename_must_match_whole_segment() {
        // "mylogo.png" ends with "logo.png" but not with "/logo.png"
        let list = keys(&["brand/mylogo.png"]);
        assert_eq!(find_key("/images/logo.png", &list), None);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(find_key("/images/doesnotexist.jpg", &keys(&["a/b.jpg"])), None);
        assert_eq!(find_key("/images/a.jpg", &[]), None);
    }

    #[test]
    fn test_empty_path_never_matches() {
        let list = keys(&["", "a.jpg"]);
        assert_eq!(find_key("", &list), None);
        assert_eq!(find_key("/images/", &list), None);
    }

    #[test]
    fn test_tie_break_first_stable() {
        let list = keys(&[
            "FGM Pics/possiblefrontpage.JPG",
            "Archive/Old/FGM Pics/possiblefrontpage.JPG",
        ]);
        for _ in 0..10 {
            let m = find_match("/images/Photos/FGM Pics/possiblefrontpage.JPG", &list).unwrap();
            assert_eq!(m.key, "FGM Pics/possiblefrontpage.JPG");
        }
    }

    #[test]
    fn test_tie_break_suffix_beats_non_matching_parent() {
        let list = keys(&[
            "Misc/group.jpg",
            "2019/Socials/Bowling/group.jpg",
            "Bowling-extra/group.jpg",
        ]);
        let m = find_match("/images/Photos/Socials/Bowling/group.jpg", &list).unwrap();
        assert_eq!(m.key, "2019/Socials/Bowling/group.jpg");
        assert_eq!(
            m.kind,
            MatchKind::TieBreak {
                score: "socials/bowling".len() as i64,
                candidates: 3
            }
        );
    }

    #[test]
    fn test_tie_break_all_negative_keeps_first() {
        let list = keys(&["x/photo.jpg", "y/photo.jpg"]);
        let m = find_match("/images/Photos/z/photo.jpg", &list).unwrap();
        assert_eq!(m.key, "x/photo.jpg");
        assert_eq!(
            m.kind,
            MatchKind::TieBreak {
                score: -1,
                candidates: 2
            }
        );
    }

    #[test]
    fn test_tie_break_suffix_is_string_suffix() {
        // "bowling" is a string suffix of "lawnbowling", so both candidates score
        let list = keys(&["lawnbowling/p.jpg", "bowling/p.jpg"]);
        assert_eq!(
            find_key("/images/Photos/Bowling/p.jpg", &list).as_deref(),
            Some("lawnbowling/p.jpg")
        );
    }

    #[test]
    fn test_parent_score() {
        assert_eq!(parent_score("fgm pics", "archive/old/fgm pics"), 8);
        assert_eq!(parent_score("fgm pics", "fgm pics"), 8);
        assert_eq!(parent_score("", "anything"), 0);
        assert_eq!(parent_score("tabling", "socials"), -1);
    }
}
