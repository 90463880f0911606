//! # Hierarchical State Machine
//!
//! Generic finite-state machine with a statically declared transition table,
//! compound substate resolution, and insertion-ordered async transition
//! listeners.
//!
//! States are plain `Copy` values grouped into coarse phases. A transition may
//! target either an exact state or a phase; a phase target resolves to the
//! first declared state of that phase that is a legal edge from the current
//! state. This lets a caller request "go to starting" without naming the first
//! sub-stage, while every sub-stage stays an explicit, observable state.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::errors::{StateMachineError, StateMachineResult};

/// A state usable by [`StateMachine`].
///
/// `Phase` is the coarse grouping a state belongs to. Simple states are the
/// sole member of their phase; compound states share a phase with their
/// sibling sub-stages. This is the typed rendering of the `parent:child`
/// naming convention.
pub trait MachineState:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    type Phase: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// The coarse phase this state belongs to.
    fn phase(self) -> Self::Phase;
}

/// Target of a transition request: an exact state or a coarse phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget<S: MachineState> {
    State(S),
    Phase(S::Phase),
}

impl<S: MachineState> From<S> for TransitionTarget<S> {
    fn from(state: S) -> Self {
        Self::State(state)
    }
}

impl<S: MachineState> fmt::Display for TransitionTarget<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => write!(f, "{state}"),
            Self::Phase(phase) => write!(f, "{phase}"),
        }
    }
}

/// Static transition table: the declared state set and the only legal edges.
///
/// Declaration order is significant: phase targets resolve to the *first*
/// declared state of the phase that is also a legal edge from the current
/// state.
#[derive(Debug, Clone)]
pub struct TransitionTable<S: MachineState> {
    states: Vec<S>,
    edges: HashMap<S, Vec<S>>,
}

impl<S: MachineState> TransitionTable<S> {
    pub fn builder() -> TransitionTableBuilder<S> {
        TransitionTableBuilder {
            states: Vec::new(),
            edges: HashMap::new(),
        }
    }

    /// Whether `state` is part of the declared state set.
    pub fn is_declared(&self, state: S) -> bool {
        self.states.contains(&state)
    }

    /// Whether a direct edge `from -> to` exists.
    pub fn allows(&self, from: S, to: S) -> bool {
        self.edges
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// First declared state of `phase` that is a legal edge from `from`.
    pub fn resolve_phase(&self, from: S, phase: S::Phase) -> Option<S> {
        self.states
            .iter()
            .copied()
            .find(|state| state.phase() == phase && self.allows(from, *state))
    }

    /// All declared states, in declaration order.
    pub fn states(&self) -> &[S] {
        &self.states
    }
}

/// Builder for [`TransitionTable`]. States are declared implicitly, in order
/// of first appearance.
pub struct TransitionTableBuilder<S: MachineState> {
    states: Vec<S>,
    edges: HashMap<S, Vec<S>>,
}

impl<S: MachineState> TransitionTableBuilder<S> {
    /// Declare the legal edges out of `from`. An empty target list declares a
    /// state with no outgoing edges.
    pub fn edges(mut self, from: S, targets: impl IntoIterator<Item = S>) -> Self {
        self.declare(from);
        let entry = self.edges.entry(from).or_default();
        for target in targets {
            if !entry.contains(&target) {
                entry.push(target);
            }
        }
        let targets: Vec<S> = self.edges[&from].clone();
        for target in targets {
            self.declare(target);
        }
        self
    }

    pub fn build(self) -> TransitionTable<S> {
        TransitionTable {
            states: self.states,
            edges: self.edges,
        }
    }

    fn declare(&mut self, state: S) {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
    }
}

/// Identifier returned by [`StateMachine::on_transition`], used to detach the
/// listener again via [`StateMachine::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type TransitionListener<S> =
    Arc<dyn Fn(S, S) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Typed finite-state machine with async transition listeners.
///
/// The current state and the listener set sit behind short-lived locks;
/// listeners are invoked on a snapshot taken outside any lock, so a listener
/// may itself call [`transition`](Self::transition), subscribe, or
/// unsubscribe without deadlocking. Transition legality is checked and the
/// new state committed under a single write lock, making check-and-commit
/// atomic with respect to concurrent callers.
pub struct StateMachine<S: MachineState> {
    table: TransitionTable<S>,
    current: RwLock<S>,
    listeners: RwLock<Vec<(ListenerId, TransitionListener<S>)>>,
    next_listener_id: AtomicU64,
}

impl<S: MachineState> StateMachine<S> {
    /// Create a machine in `initial`, which must be a declared state.
    pub fn new(initial: S, table: TransitionTable<S>) -> StateMachineResult<Self> {
        if !table.is_declared(initial) {
            return Err(StateMachineError::UndeclaredState(initial.to_string()));
        }
        Ok(Self {
            table,
            current: RwLock::new(initial),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    /// Current state. Never blocks for long, never fails.
    pub fn state(&self) -> S {
        *self.current.read()
    }

    /// The transition table this machine was built with.
    pub fn table(&self) -> &TransitionTable<S> {
        &self.table
    }

    /// Pure legality predicate: whether `transition` with the same target
    /// would currently succeed. Performs no mutation.
    pub fn can_transition(&self, target: impl Into<TransitionTarget<S>>) -> bool {
        self.resolve(self.state(), target.into()).is_some()
    }

    /// Attempt a transition.
    ///
    /// On success the new state is committed first, then every registered
    /// listener is invoked with `(from, to)` and awaited in registration
    /// order; `to` is the resolved state, which may differ from the requested
    /// target when a phase target was redirected to its first sub-stage. A
    /// listener error surfaces as [`StateMachineError::ListenerFailed`] but
    /// does not roll the state back.
    pub async fn transition(
        &self,
        target: impl Into<TransitionTarget<S>>,
    ) -> StateMachineResult<S> {
        let target = target.into();

        // Check and commit atomically; listeners run outside the lock.
        let (from, to) = {
            let mut current = self.current.write();
            let from = *current;
            let to = self.resolve(from, target).ok_or_else(|| {
                StateMachineError::InvalidTransition {
                    from: from.to_string(),
                    to: target.to_string(),
                }
            })?;
            *current = to;
            (from, to)
        };
        debug!(from = %from, to = %to, "state transition committed");

        let snapshot: Vec<TransitionListener<S>> = {
            let listeners = self.listeners.read();
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            listener(from, to)
                .await
                .map_err(StateMachineError::ListenerFailed)?;
        }

        Ok(to)
    }

    /// Register a transition listener, invoked with `(from, to)` on every
    /// committed transition. Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn on_transition<F, Fut>(&self, listener: F) -> ListenerId
    where
        F: Fn(S, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let wrapped: TransitionListener<S> = Arc::new(move |from, to| listener(from, to).boxed());
        self.listeners.write().push((id, wrapped));
        trace!(listener_id = ?id, "transition listener registered");
        id
    }

    /// Detach a listener. Safe to call from within the listener's own
    /// invocation; removal only affects future transitions. Returns whether a
    /// listener was actually removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    fn resolve(&self, from: S, target: TransitionTarget<S>) -> Option<S> {
        match target {
            TransitionTarget::State(state) => self.table.allows(from, state).then_some(state),
            TransitionTarget::Phase(phase) => self.table.resolve_phase(from, phase),
        }
    }
}

impl<S: MachineState> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.state())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
