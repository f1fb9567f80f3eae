//! Assertions over result sets

use fetcher::{ErrorKind, ResultSet};

/// Assert the number of distinct successes and failures
pub fn assert_counts(results: &ResultSet, successes: usize, failures: usize) {
    let got_successes = results.successes().count();
    let got_failures = results.failures().count();
    assert_eq!(
        (got_successes, got_failures),
        (successes, failures),
        "unexpected success/failure split in {:#?}",
        results.as_slice()
    );
}

/// Assert that every failure has `kind`
pub fn assert_failures_are(results: &ResultSet, kind: ErrorKind) {
    for result in results.failures() {
        let failure = result.failure_info().expect("failure entry");
        assert_eq!(failure.kind, kind, "{result:?}");
    }
}

/// Assert that no two entries share a dedup key
pub fn assert_no_duplicates(results: &ResultSet) {
    let mut keys = results.keys();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total, "result set contains duplicate entries");
}
