//! Channel sync (§4.5): diff desired-vs-actual joined channels against the
//! managed-channels store, implemented as a short-interval poll since
//! SQLite has no native change feed (§6).

use std::collections::HashSet;

/// Result of diffing the desired set (managed, active channels) against the
/// currently-joined set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDiff {
    pub to_join: Vec<String>,
    pub to_part: Vec<String>,
}

/// Compute which channels to join and part to converge `joined` on
/// `desired_active`.
pub fn diff(joined: &HashSet<String>, desired_active: &[String]) -> ChannelDiff {
    let desired: HashSet<String> = desired_active.iter().cloned().collect();

    let mut to_join: Vec<String> = desired.difference(joined).cloned().collect();
    let mut to_part: Vec<String> = joined.difference(&desired).cloned().collect();
    to_join.sort();
    to_part.sort();

    ChannelDiff { to_join, to_part }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_active_channel_is_joined() {
        let joined = HashSet::new();
        let result = diff(&joined, &["alice".to_string()]);
        assert_eq!(result.to_join, vec!["alice".to_string()]);
        assert!(result.to_part.is_empty());
    }

    #[test]
    fn removed_channel_is_parted() {
        let joined: HashSet<String> = ["alice".to_string()].into_iter().collect();
        let result = diff(&joined, &[]);
        assert!(result.to_join.is_empty());
        assert_eq!(result.to_part, vec!["alice".to_string()]);
    }

    #[test]
    fn already_joined_channel_is_left_alone() {
        let joined: HashSet<String> = ["alice".to_string()].into_iter().collect();
        let result = diff(&joined, &["alice".to_string()]);
        assert!(result.to_join.is_empty());
        assert!(result.to_part.is_empty());
    }

    #[test]
    fn mixed_diff_joins_and_parts_independently() {
        let joined: HashSet<String> = ["alice".to_string(), "bob".to_string()].into_iter().collect();
        let result = diff(&joined, &["bob".to_string(), "carol".to_string()]);
        assert_eq!(result.to_join, vec!["carol".to_string()]);
        assert_eq!(result.to_part, vec!["alice".to_string()]);
    }
}
