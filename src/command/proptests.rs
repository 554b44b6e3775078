//! Property-based tests for command parsing
//!
//! Invariants:
//! - rounds never exceed the cap
//! - a debate prompt is never empty
//! - with a roster of at least two agents, a debate always has 2..=5
//!   distinct participants drawn from the roster
//! - one-shot targets are non-empty roster ids

use super::*;
use crate::roster::AgentIdentity;
use proptest::prelude::*;

fn roster_of(n: usize) -> Roster {
    Roster::new(
        (0..n)
            .map(|i| AgentIdentity::new(format!("agent{i}"), format!("Name{i}"), "🤖"))
            .collect(),
    )
}

/// A token that may or may not be a recognized debate argument
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        (0usize..8).prop_map(|i| format!("@agent{i}")),
        (0usize..8).prop_map(|i| format!("@name{i}")),
        (-5i32..50).prop_map(|n| format!("rounds={n}")),
        (-5i32..50).prop_map(|n| format!("rounds:{n}")),
        Just("no-synth".to_string()),
        Just("NOSYNTH".to_string()),
        (0usize..8).prop_map(|i| format!("mod=agent{i}")),
        "[a-z?!]{1,8}",
    ]
}

proptest! {
    #[test]
    fn prop_rounds_capped(tokens in proptest::collection::vec(arb_token(), 0..12)) {
        let req = parse_debate(&tokens.join(" "), &roster_of(4));
        prop_assert!(req.rounds <= MAX_ROUNDS);
    }

    #[test]
    fn prop_prompt_never_empty(tokens in proptest::collection::vec(arb_token(), 0..12)) {
        let req = parse_debate(&tokens.join(" "), &roster_of(4));
        prop_assert!(!req.prompt.trim().is_empty());
    }

    #[test]
    fn prop_participants_bounded_and_distinct(
        roster_size in 2usize..8,
        tokens in proptest::collection::vec(arb_token(), 0..12),
    ) {
        let roster = roster_of(roster_size);
        let req = parse_debate(&tokens.join(" "), &roster);

        prop_assert!(req.participants.len() >= MIN_PARTICIPANTS);
        prop_assert!(req.participants.len() <= MAX_PARTICIPANTS);
        for (i, id) in req.participants.iter().enumerate() {
            prop_assert!(roster.get(id).is_some());
            prop_assert!(!req.participants[..i].contains(id));
        }
        prop_assert!(req.moderator.is_some());
    }

    #[test]
    fn prop_one_shot_targets_in_roster(
        roster_size in 1usize..6,
        text in "[a-z @0-9]{0,40}",
    ) {
        let roster = roster_of(roster_size);
        match parse(&text, &roster) {
            Dispatch::OneShot(req) => {
                prop_assert!(!req.targets.is_empty());
                for id in &req.targets {
                    prop_assert!(roster.get(id).is_some());
                }
            }
            Dispatch::Debate(_) => prop_assert!(false, "plain text parsed as debate"),
        }
    }
}
