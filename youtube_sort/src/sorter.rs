use crate::model::VideoEntry;

/// Orders entries newest first.
///
/// The sort is stable, so entries sharing an upload time keep their playlist
/// order. Unresolved entries sort last. The builder walks this order
/// backwards to insert oldest first.
pub fn sort_descending_by_publish_date(mut entries: Vec<VideoEntry>) -> Vec<VideoEntry> {
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    fn entry(id: &str, published: Option<u32>) -> VideoEntry {
        let mut entry = VideoEntry::new(id, id, day(28));
        entry.published_at = published.map(day);
        entry
    }

    fn ids(entries: &[VideoEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn newest_first() {
        let sorted = sort_descending_by_publish_date(vec![
            entry("v1", Some(3)),
            entry("v2", Some(1)),
            entry("v3", Some(2)),
        ]);
        assert_eq!(ids(&sorted), ["v1", "v3", "v2"]);
    }

    #[test]
    fn ties_keep_playlist_order() {
        let sorted = sort_descending_by_publish_date(vec![
            entry("a", Some(5)),
            entry("b", Some(9)),
            entry("c", Some(5)),
            entry("d", Some(9)),
            entry("e", Some(5)),
        ]);
        assert_eq!(ids(&sorted), ["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn unresolved_sort_as_oldest_in_playlist_order() {
        let sorted = sort_descending_by_publish_date(vec![
            entry("gone1", None),
            entry("a", Some(1)),
            entry("gone2", None),
            entry("b", Some(2)),
        ]);
        assert_eq!(ids(&sorted), ["b", "a", "gone1", "gone2"]);
    }

    #[test]
    fn sorting_twice_changes_nothing() {
        let once = sort_descending_by_publish_date(vec![
            entry("a", Some(2)),
            entry("b", None),
            entry("c", Some(2)),
            entry("d", Some(7)),
        ]);
        let twice = sort_descending_by_publish_date(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input() {
        assert!(sort_descending_by_publish_date(Vec::new()).is_empty());
    }
}
