//! Property-based tests for the conversation state machine
//!
//! These tests verify key invariants hold across arbitrary command sequences.

use super::*;
use chrono::{DateTime, Duration, Local, TimeZone};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn config(limit: u32) -> ConversationConfig {
    ConversationConfig {
        agent1_model: "model-a".to_string(),
        agent2_model: "model-b".to_string(),
        topic: "topic".to_string(),
        turn_limit_minutes: limit,
        agent1_system_prompt: String::new(),
        agent2_system_prompt: String::new(),
    }
}

/// A committed turn, as the orchestrator performs it
fn commit(state: &mut ConversationState, content: &str, now: DateTime<Local>) {
    let speaker = state.current_turn();
    state.record_turn(speaker, content, now).unwrap();
    state.switch_turn();
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Advance(i64),
    Commit(String),
    Pause,
    Continue,
    Stop,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..400).prop_map(Op::Advance),
        "[a-z ]{1,20}".prop_map(Op::Commit),
        Just(Op::Pause),
        Just(Op::Continue),
        Just(Op::Stop),
    ]
}

fn expected_speaker(index: usize) -> AgentLabel {
    if index % 2 == 0 {
        AgentLabel::Agent1
    } else {
        AgentLabel::Agent2
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: every start looks the same
    #[test]
    fn prop_start_shape(topic in "[a-zA-Z ]{1,40}", limit in 0u32..120) {
        let mut cfg = config(limit);
        cfg.topic = topic.clone();
        let state = ConversationState::start(cfg, t0());

        prop_assert_eq!(state.history().len(), 1);
        prop_assert_eq!(state.current_turn(), AgentLabel::Agent2);
        prop_assert_eq!(state.status(), ConvStatus::Running);
        prop_assert_eq!(&state.history()[0].content, &topic);
    }

    // Invariant 2: successful turns alternate strictly, one message each
    #[test]
    fn prop_turns_alternate(replies in proptest::collection::vec("[a-z]{1,10}", 0..30)) {
        let mut state = ConversationState::start(config(0), t0());

        for (i, reply) in replies.iter().enumerate() {
            let before = state.current_turn();
            let len = state.history().len();
            commit(&mut state, reply, t0());

            prop_assert_eq!(state.history().len(), len + 1);
            prop_assert_eq!(state.current_turn(), before.other());
            prop_assert_eq!(state.history()[i + 1].speaker, before);
        }

        for (i, message) in state.history().iter().enumerate() {
            prop_assert_eq!(message.speaker, expected_speaker(i));
        }
    }

    // Invariant 3: unlimited conversations never hit the limit
    #[test]
    fn prop_unlimited_never_expires(seconds in 0i64..10_000_000) {
        let state = ConversationState::start(config(0), t0());
        prop_assert!(!state.is_time_limit_reached(t0() + Duration::seconds(seconds)));
    }

    // Invariant 4: the limit fires strictly after the configured minutes
    #[test]
    fn prop_limit_boundary(limit in 1u32..240, extra in 1i64..10_000) {
        let state = ConversationState::start(config(limit), t0());
        let limit_secs = i64::from(limit) * 60;
        prop_assert!(!state.is_time_limit_reached(t0() + Duration::seconds(limit_secs)));
        prop_assert!(state.is_time_limit_reached(t0() + Duration::seconds(limit_secs + extra)));
    }

    // Invariant 5: arbitrary command sequences keep the aggregate consistent
    #[test]
    fn prop_commands_preserve_invariants(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let mut state = ConversationState::start(config(2), t0());
        let mut now = t0();

        for op in ops {
            let snapshot: Vec<Message> = state.history().to_vec();

            match op {
                Op::Advance(secs) => now += Duration::seconds(secs),
                Op::Commit(text) => {
                    if state.is_running() {
                        commit(&mut state, &text, now);
                    } else {
                        let speaker = state.current_turn();
                        prop_assert!(state.record_turn(speaker, text, now).is_err());
                    }
                }
                Op::Pause => { let _ = state.pause_for_time_limit(now); }
                Op::Continue => { let _ = state.continue_conversation(now); }
                Op::Stop => { let _ = state.stop(now); }
            }

            // History is append-only
            prop_assert!(state.history().len() >= snapshot.len());
            prop_assert_eq!(&state.history()[..snapshot.len()], &snapshot[..]);

            // Status/finish-time coupling
            match state.status() {
                ConvStatus::Running | ConvStatus::PausedByTimeLimit => {
                    prop_assert!(state.finished_at().is_none());
                }
                ConvStatus::Stopped => prop_assert!(state.finished_at().is_some()),
                ConvStatus::NotStarted => prop_assert!(false, "started state reported NotStarted"),
            }

            // Turn marker tracks history parity
            let expected_next = expected_speaker(state.history().len());
            prop_assert_eq!(state.current_turn(), expected_next);
        }
    }

    // Invariant 6: stopped is terminal
    #[test]
    fn prop_stopped_is_terminal(ops in proptest::collection::vec(arb_op(), 0..30)) {
        let mut state = ConversationState::start(config(1), t0());
        state.stop(t0()).unwrap();
        let mut now = t0();

        for op in ops {
            match op {
                Op::Advance(secs) => now += Duration::seconds(secs),
                Op::Commit(text) => {
                    let speaker = state.current_turn();
                    prop_assert!(state.record_turn(speaker, text, now).is_err());
                }
                Op::Pause => prop_assert!(state.pause_for_time_limit(now).is_err()),
                Op::Continue => prop_assert!(state.continue_conversation(now).is_err()),
                Op::Stop => prop_assert!(state.stop(now).is_err()),
            }
            prop_assert_eq!(state.status(), ConvStatus::Stopped);
            prop_assert_eq!(state.history().len(), 1);
        }
    }
}
