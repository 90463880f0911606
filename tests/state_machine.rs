//! Behavioral tests for the hierarchical state machine primitive, exercised
//! through a small connection-lifecycle state set that is independent of the
//! service operator's states.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use lifeline_core::state_machine::{
    MachineState, StateMachine, StateMachineError, TransitionTable, TransitionTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    Dial,
    Handshake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Conn {
    Idle,
    Opening(Step),
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConnPhase {
    Idle,
    Opening,
    Open,
    Closed,
}

impl fmt::Display for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Opening(Step::Dial) => write!(f, "opening:dial"),
            Self::Opening(Step::Handshake) => write!(f, "opening:handshake"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl fmt::Display for ConnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Opening => write!(f, "opening"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl MachineState for Conn {
    type Phase = ConnPhase;

    fn phase(self) -> ConnPhase {
        match self {
            Self::Idle => ConnPhase::Idle,
            Self::Opening(_) => ConnPhase::Opening,
            Self::Open => ConnPhase::Open,
            Self::Closed => ConnPhase::Closed,
        }
    }
}

fn conn_table() -> TransitionTable<Conn> {
    TransitionTable::builder()
        .edges(Conn::Idle, [Conn::Opening(Step::Dial)])
        .edges(Conn::Opening(Step::Dial), [Conn::Opening(Step::Handshake), Conn::Closed])
        .edges(Conn::Opening(Step::Handshake), [Conn::Open, Conn::Closed])
        .edges(Conn::Open, [Conn::Closed])
        .edges(Conn::Closed, [Conn::Opening(Step::Dial)])
        .build()
}

fn machine_at(state: Conn) -> StateMachine<Conn> {
    StateMachine::new(state, conn_table()).expect("state is declared")
}

/// For every state and every target (exact or phase), the pure predicate must
/// agree exactly with the transition outcome, and a rejected transition must
/// not mutate the current state.
#[tokio::test]
async fn predicate_agrees_with_transition_for_all_pairs() {
    let all_states = [
        Conn::Idle,
        Conn::Opening(Step::Dial),
        Conn::Opening(Step::Handshake),
        Conn::Open,
        Conn::Closed,
    ];
    let all_phases = [
        ConnPhase::Idle,
        ConnPhase::Opening,
        ConnPhase::Open,
        ConnPhase::Closed,
    ];

    for from in all_states {
        for target in all_states {
            let machine = machine_at(from);
            let predicted = machine.can_transition(target);
            // Evaluating the predicate must not move the machine.
            assert_eq!(machine.state(), from);

            let outcome = machine.transition(target).await;
            assert_eq!(
                predicted,
                outcome.is_ok(),
                "predicate disagrees with transition for {from} -> {target}"
            );
            if outcome.is_err() {
                assert_eq!(machine.state(), from, "rejected transition mutated state");
            }
        }

        for phase in all_phases {
            let machine = machine_at(from);
            let predicted = machine.can_transition(TransitionTarget::Phase(phase));
            let outcome = machine.transition(TransitionTarget::Phase(phase)).await;
            assert_eq!(
                predicted,
                outcome.is_ok(),
                "phase predicate disagrees with transition for {from} -> {phase}"
            );
        }
    }
}

#[tokio::test]
async fn phase_target_resolves_to_first_declared_substate() {
    let machine = machine_at(Conn::Idle);
    let resolved = machine
        .transition(TransitionTarget::Phase(ConnPhase::Opening))
        .await
        .unwrap();
    assert_eq!(resolved, Conn::Opening(Step::Dial));
    assert_eq!(machine.state(), Conn::Opening(Step::Dial));
}

/// The first declared substate is skipped when it is not a legal edge from
/// the current state: from `opening:dial`, the only legal opening-phase edge
/// is `opening:handshake`.
#[tokio::test]
async fn phase_resolution_skips_illegal_substates() {
    let machine = machine_at(Conn::Opening(Step::Dial));
    let resolved = machine
        .transition(TransitionTarget::Phase(ConnPhase::Opening))
        .await
        .unwrap();
    assert_eq!(resolved, Conn::Opening(Step::Handshake));
}

#[tokio::test]
async fn invalid_transition_reports_from_and_to() {
    let machine = machine_at(Conn::Idle);
    let err = machine.transition(Conn::Open).await.unwrap_err();
    match err {
        StateMachineError::InvalidTransition { from, to } => {
            assert_eq!(from, "idle");
            assert_eq!(to, "open");
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Three listeners registered in order are invoked in that order, each fully
/// awaited before the next begins. The delays descend, so any concurrent
/// execution would record completions in reverse.
#[tokio::test]
async fn listeners_run_in_registration_order_sequentially() {
    let machine = Arc::new(machine_at(Conn::Idle));
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (name, delay_ms) in [("a", 30u64), ("b", 20), ("c", 10)] {
        let log = Arc::clone(&log);
        machine.on_transition(move |_, _| {
            let log = Arc::clone(&log);
            async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().push(name);
                Ok(())
            }
        });
    }

    machine.transition(Conn::Opening(Step::Dial)).await.unwrap();
    assert_eq!(*log.lock(), vec!["a", "b", "c"]);
}

/// Listeners observe the resolved state, which may differ from the requested
/// coarse target.
#[tokio::test]
async fn listeners_observe_resolved_target() {
    let machine = Arc::new(machine_at(Conn::Idle));
    let observed: Arc<Mutex<Vec<(Conn, Conn)>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&observed);
    machine.on_transition(move |from, to| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push((from, to));
            Ok(())
        }
    });

    machine
        .transition(TransitionTarget::Phase(ConnPhase::Opening))
        .await
        .unwrap();
    assert_eq!(*observed.lock(), vec![(Conn::Idle, Conn::Opening(Step::Dial))]);
}

/// A listener failure propagates to the transition caller, but the committed
/// state is not rolled back, and later listeners in the same transition do
/// not run.
#[tokio::test]
async fn listener_failure_propagates_without_rollback() {
    let machine = Arc::new(machine_at(Conn::Idle));
    let later_ran = Arc::new(Mutex::new(false));

    machine.on_transition(|_, _| async { Err::<(), _>(anyhow::anyhow!("listener exploded")) });
    let flag = Arc::clone(&later_ran);
    machine.on_transition(move |_, _| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock() = true;
            Ok(())
        }
    });

    let err = machine
        .transition(Conn::Opening(Step::Dial))
        .await
        .unwrap_err();
    assert!(matches!(err, StateMachineError::ListenerFailed(_)));
    assert_eq!(machine.state(), Conn::Opening(Step::Dial));
    assert!(!*later_ran.lock());
}

#[tokio::test]
async fn unsubscribed_listener_is_not_invoked() {
    let machine = Arc::new(machine_at(Conn::Idle));
    let calls = Arc::new(Mutex::new(0u32));

    let counter = Arc::clone(&calls);
    let id = machine.on_transition(move |_, _| {
        let counter = Arc::clone(&counter);
        async move {
            *counter.lock() += 1;
            Ok(())
        }
    });

    machine.transition(Conn::Opening(Step::Dial)).await.unwrap();
    assert_eq!(*calls.lock(), 1);

    assert!(machine.unsubscribe(id));
    assert!(!machine.unsubscribe(id));

    machine
        .transition(Conn::Opening(Step::Handshake))
        .await
        .unwrap();
    assert_eq!(*calls.lock(), 1);
}

/// A listener may remove itself from within its own invocation; removal only
/// affects future transitions, so listeners registered after it still run for
/// the current one.
#[tokio::test]
async fn listener_can_unsubscribe_itself_mid_invocation() {
    let machine = Arc::new(machine_at(Conn::Idle));
    let self_calls = Arc::new(Mutex::new(0u32));
    let other_calls = Arc::new(Mutex::new(0u32));

    let id_slot: Arc<Mutex<Option<lifeline_core::state_machine::ListenerId>>> =
        Arc::new(Mutex::new(None));
    let slot = Arc::clone(&id_slot);
    let counter = Arc::clone(&self_calls);
    let machine_handle = Arc::clone(&machine);
    let id = machine.on_transition(move |_, _| {
        let slot = Arc::clone(&slot);
        let counter = Arc::clone(&counter);
        let machine = Arc::clone(&machine_handle);
        async move {
            *counter.lock() += 1;
            if let Some(id) = *slot.lock() {
                machine.unsubscribe(id);
            }
            Ok(())
        }
    });
    *id_slot.lock() = Some(id);

    let counter = Arc::clone(&other_calls);
    machine.on_transition(move |_, _| {
        let counter = Arc::clone(&counter);
        async move {
            *counter.lock() += 1;
            Ok(())
        }
    });

    machine.transition(Conn::Opening(Step::Dial)).await.unwrap();
    assert_eq!(*self_calls.lock(), 1);
    assert_eq!(*other_calls.lock(), 1);

    machine
        .transition(Conn::Opening(Step::Handshake))
        .await
        .unwrap();
    assert_eq!(*self_calls.lock(), 1, "removed listener ran again");
    assert_eq!(*other_calls.lock(), 2);
}

/// No terminal-state concept: a closed connection may cycle back into the
/// opening phase.
#[tokio::test]
async fn cyclic_transitions_are_legal() {
    let machine = machine_at(Conn::Idle);
    machine.transition(Conn::Opening(Step::Dial)).await.unwrap();
    machine
        .transition(Conn::Opening(Step::Handshake))
        .await
        .unwrap();
    machine.transition(Conn::Open).await.unwrap();
    machine.transition(Conn::Closed).await.unwrap();
    let reopened = machine
        .transition(TransitionTarget::Phase(ConnPhase::Opening))
        .await
        .unwrap();
    assert_eq!(reopened, Conn::Opening(Step::Dial));
}
