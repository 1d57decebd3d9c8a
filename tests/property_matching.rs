//! Property-based tests for normalization and key matching
//!
//! Uses proptest to check the matcher's invariants over random path-like
//! strings rather than a handful of hand-picked cases.

use chapter_images::{find_key, find_match, normalize, MatchKind};
use proptest::prelude::*;

/// Path-like strings: mixed case, spaces, slashes, escapes, known prefixes
fn path_like() -> impl Strategy<Value = String> {
    let segment = "[A-Za-z0-9 ._%-]{0,12}";
    (
        prop::sample::select(vec!["", "/", "//", "/images/", "/images/Photos/", "/IMAGES/photos/", " "]),
        prop::collection::vec(segment, 0..4),
        prop::sample::select(vec!["", "/", " ", "%2F"]),
    )
        .prop_map(|(prefix, segments, suffix)| format!("{}{}{}", prefix, segments.join("/"), suffix))
}

fn key_like() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9 _-]{1,8}", 1..4)
        .prop_map(|segments| format!("{}.jpg", segments.join("/")))
}

proptest! {
    #[test]
    fn prop_normalize_local_is_idempotent(path in path_like()) {
        let once = normalize(&path, true);
        prop_assert_eq!(normalize(&once, true), once);
    }

    #[test]
    fn prop_normalize_remote_is_idempotent(path in path_like()) {
        let once = normalize(&path, false);
        prop_assert_eq!(normalize(&once, false), once);
    }

    #[test]
    fn prop_normalized_has_no_edge_slashes(path in path_like()) {
        let n = normalize(&path, true);
        prop_assert!(!n.starts_with('/'));
        prop_assert!(!n.ends_with('/'));
        prop_assert_eq!(n.trim(), n.as_str());
    }

    #[test]
    fn prop_photos_prefix_stripped_before_images_prefix(rest in "[a-z0-9][a-z0-9 ]{0,9}(/[a-z0-9 ]{1,10}){0,2}\\.jpg") {
        let with_photos = format!("/images/Photos/{}", rest);
        prop_assert_eq!(normalize(&with_photos, true), normalize(&rest, true));
    }

    #[test]
    fn prop_exact_match_wins(
        key in key_like(),
        others in prop::collection::vec(key_like(), 0..8),
        position in 0usize..8,
    ) {
        // Every other key shares the filename, so they are all filename candidates
        let filename = key.rsplit('/').next().unwrap().to_string();
        let mut keys: Vec<String> = others
            .iter()
            .map(|o| format!("{}/{}", o.trim_end_matches(".jpg"), filename))
            .filter(|o| normalize(o, false) != normalize(&key, false))
            .collect();
        let position = position.min(keys.len());
        keys.insert(position, key.clone());

        let local = format!("/images/Photos/{}", key);
        let found = find_match(&local, &keys).unwrap();
        prop_assert_eq!(found.kind, MatchKind::Exact);
        prop_assert_eq!(found.key, key);
    }

    #[test]
    fn prop_match_is_deterministic_and_from_input(
        path in path_like(),
        keys in prop::collection::vec(key_like(), 0..12),
    ) {
        let first = find_key(&path, &keys);
        prop_assert_eq!(&find_key(&path, &keys), &first);
        if let Some(key) = first {
            prop_assert!(keys.contains(&key));
        }
    }

    #[test]
    fn prop_match_shares_filename(
        path in path_like(),
        keys in prop::collection::vec(key_like(), 0..12),
    ) {
        let local = normalize(&path, true);
        if let Some(key) = find_key(&path, &keys) {
            let filename = local.rsplit('/').next().unwrap();
            let normalized_key = normalize(&key, false);
            let suffix = format!("/{}", filename);
            prop_assert!(
                normalized_key == filename || normalized_key.ends_with(&suffix)
            );
        }
    }
}
