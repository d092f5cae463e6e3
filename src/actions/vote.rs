use crate::models::{Id, VoteChange, VoteDirection, VoteSummary};

/// Strict toggle over mutually exclusive up/down sets.
///
/// Voting the same way twice withdraws the vote; voting the other way moves
/// the user across in a single update.
pub fn plan(direction: VoteDirection, has_upvoted: bool, has_downvoted: bool) -> VoteChange {
    match direction {
        VoteDirection::Up if has_upvoted => VoteChange { pull_up: true, ..Default::default() },
        VoteDirection::Up if has_downvoted => VoteChange { pull_down: true, add_up: true, ..Default::default() },
        VoteDirection::Up => VoteChange { add_up: true, ..Default::default() },
        VoteDirection::Down if has_downvoted => VoteChange { pull_down: true, ..Default::default() },
        VoteDirection::Down if has_upvoted => VoteChange { pull_up: true, add_down: true, ..Default::default() },
        VoteDirection::Down => VoteChange { add_down: true, ..Default::default() },
    }
}

pub fn summary(up_votes: &[Id], down_votes: &[Id], user: &str) -> VoteSummary {
    VoteSummary {
        upvotes: up_votes.len(),
        downvotes: down_votes.len(),
        has_upvoted: up_votes.iter().any(|u| u == user),
        has_downvoted: down_votes.iter().any(|u| u == user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upvote_toggles() {
        assert_eq!(plan(VoteDirection::Up, false, false), VoteChange { add_up: true, ..Default::default() });
        assert_eq!(plan(VoteDirection::Up, true, false), VoteChange { pull_up: true, ..Default::default() });
    }

    #[test]
    fn switching_sides_is_one_change() {
        let c = plan(VoteDirection::Down, true, false);
        assert!(c.pull_up && c.add_down);
        assert!(!c.add_up && !c.pull_down);

        let c = plan(VoteDirection::Up, false, true);
        assert!(c.pull_down && c.add_up);
    }

    #[test]
    fn downvote_withdraws() {
        assert_eq!(plan(VoteDirection::Down, false, true), VoteChange { pull_down: true, ..Default::default() });
    }

    #[test]
    fn summary_reports_membership() {
        let up = vec!["a".to_string(), "b".to_string()];
        let s = summary(&up, &[], "b");
        assert_eq!((s.upvotes, s.downvotes), (2, 0));
        assert!(s.has_upvoted && !s.has_downvoted);
    }
}
