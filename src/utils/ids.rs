use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Builds `<PREFIX>-<unix millis>-<4 hex>`; the suffix is a wrapping
/// process-wide counter so ids minted in the same millisecond still differ.
pub fn next_id(prefix: &str) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff;
    format!("{}-{}-{:04x}", prefix, Utc::now().timestamp_millis(), seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let ids: HashSet<String> = (0..500).map(|_| next_id("SOS")).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.starts_with("SOS-")));
        assert!(ids.iter().all(|id| id.rsplit('-').next().unwrap().len() == 4));
    }
}
