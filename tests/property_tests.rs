//! Property-based tests for tryon-deploy
//!
//! These tests verify:
//! - Step enum string round-trips
//! - The provisioning state machine never skips or rewinds
//! - Env file parsing of arbitrary well-formed assignments

use proptest::prelude::*;
use strum::IntoEnumIterator;

use tryon_deploy::{EnvFile, ProvisionContext, ProvisionStage, Step};

// =============================================================================
// Step Enum Property Tests
// =============================================================================

fn step_strategy() -> impl Strategy<Value = Step> {
    proptest::sample::select(Step::iter().collect::<Vec<_>>())
}

fn stage_strategy() -> impl Strategy<Value = ProvisionStage> {
    prop_oneof![
        Just(ProvisionStage::NotStarted),
        step_strategy().prop_map(ProvisionStage::for_step),
        Just(ProvisionStage::Completed),
        Just(ProvisionStage::Failed),
    ]
}

proptest! {
    /// Step: to_string → parse round-trip is identity
    #[test]
    fn step_roundtrip(step in step_strategy()) {
        let parsed: Step = step.to_string().parse().expect("Should parse");
        prop_assert_eq!(step, parsed);
    }

    /// Step numbers are 1-based and in range
    #[test]
    fn step_number_in_range(step in step_strategy()) {
        prop_assert!((1..=Step::count()).contains(&step.number()));
    }
}

// =============================================================================
// State Machine Property Tests
// =============================================================================

proptest! {
    /// Any sequence of attempted transitions leaves the history strictly
    /// increasing, apart from a final Failed entry
    #[test]
    fn transitions_are_forward_only(targets in prop::collection::vec(stage_strategy(), 0..30)) {
        let mut ctx = ProvisionContext::new();
        for target in targets {
            let before = ctx.current_stage();
            match ctx.transition_to(target) {
                Ok(now) => {
                    prop_assert_eq!(before.next(), Some(now));
                }
                Err(_) => prop_assert_eq!(ctx.current_stage(), before),
            }
        }

        let orders: Vec<u8> = ctx
            .stage_history()
            .iter()
            .map(|(stage, _)| stage.order())
            .collect();
        prop_assert!(orders.windows(2).all(|w| w[0] < w[1]));
    }

    /// fail() from any reachable non-terminal stage records that stage
    #[test]
    fn fail_records_current_stage(steps_taken in 0usize..8) {
        let mut ctx = ProvisionContext::new();
        for _ in 0..steps_taken {
            ctx.advance().unwrap();
        }
        let at = ctx.current_stage();
        prop_assume!(!at.is_terminal());
        ctx.fail().unwrap();
        prop_assert_eq!(ctx.failed_at(), Some(at));
        prop_assert!(ctx.advance().is_err());
    }
}

// =============================================================================
// Env File Property Tests
// =============================================================================

proptest! {
    /// Every assignment in a generated file is read back, last one wins
    #[test]
    fn env_file_reads_all_assignments(
        pairs in prop::collection::vec(("[A-Z][A-Z0-9_]{0,10}", "[a-z0-9:/.-]{1,20}"), 1..10)
    ) {
        let content: String = pairs
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect();
        let env = EnvFile::parse(&content).unwrap();

        for (key, _) in &pairs {
            let last = pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
            prop_assert_eq!(env.get(key), last);
        }
    }
}
