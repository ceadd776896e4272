use scout_core::{CandidateSet, MediaCandidate, SourceHint};

#[test]
fn relative_urls_are_rejected() {
    assert!(MediaCandidate::new("a.mp4", SourceHint::DirectFile).is_none());
    assert!(MediaCandidate::new("/video/a.mp4", SourceHint::DirectFile).is_none());
    assert!(MediaCandidate::new("mailto:x@y.test", SourceHint::DirectFile).is_none());
    assert!(MediaCandidate::new(" https://x.test/a.mp4 ", SourceHint::DirectFile).is_some());
}

#[test]
fn duplicates_are_collapsed_and_first_hint_wins() {
    let mut set = CandidateSet::new();
    assert!(set.insert_url("https://x.test/a.mp4", SourceHint::DirectFile));
    assert!(!set.insert_url("https://x.test/a.mp4", SourceHint::PatternMatch));
    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().next().unwrap().hint(), SourceHint::DirectFile);
}

#[test]
fn equality_ignores_insertion_order() {
    let a: CandidateSet = ["https://x.test/1.mp4", "https://x.test/2.mp4"]
        .into_iter()
        .filter_map(|u| MediaCandidate::new(u, SourceHint::DirectFile))
        .collect();
    let b: CandidateSet = ["https://x.test/2.mp4", "https://x.test/1.mp4"]
        .into_iter()
        .filter_map(|u| MediaCandidate::new(u, SourceHint::PatternMatch))
        .collect();
    assert_eq!(a, b);
}

#[test]
fn extend_merges_sets() {
    let mut a = CandidateSet::new();
    a.insert_url("https://x.test/1.mp4", SourceHint::DirectFile);
    let mut b = CandidateSet::new();
    b.insert_url("https://x.test/1.mp4", SourceHint::Embed);
    b.insert_url("https://x.test/2.mp4", SourceHint::Embed);
    a.extend(b);
    assert_eq!(a.len(), 2);
    assert!(a.contains("https://x.test/2.mp4"));
}
