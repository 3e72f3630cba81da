//! Labelled finite automata.
//!
//! States live in a flat array and are addressed by index; state `0` is the
//! initial state. Transitions from one state are kept sorted by
//! `(label, dest)` with no duplicates, which makes path enumeration and
//! subset construction deterministic in their output order.
//!
//! Labels are bytes unless stated otherwise. Token automata carry a wider
//! label until separators and holes are rewritten into bytes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::SuggestError;

/// Index of a state inside an [`Automaton`].
pub type StateId = usize;

/// A labelled edge between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transition<L = u8> {
    /// Label consumed by this edge.
    pub label: L,
    /// Target state.
    pub dest: StateId,
}

/// One automaton state.
#[derive(Debug, Clone, PartialEq, Eq)]
struct State<L> {
    /// Whether a path ending here is accepted.
    accept: bool,
    /// Outgoing edges, sorted and unique.
    transitions: Vec<Transition<L>>,
}

impl<L> Default for State<L> {
    fn default() -> Self {
        Self {
            accept: false,
            transitions: Vec::new(),
        }
    }
}

/// A finite automaton, over bytes by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton<L = u8> {
    /// All states; index 0 is initial.
    states: Vec<State<L>>,
    /// False once any state may have two edges with the same label.
    deterministic: bool,
}

impl<L: Copy + Ord> Default for Automaton<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Copy + Ord> Automaton<L> {
    /// Creates an automaton with no states.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            deterministic: true,
        }
    }

    /// Adds a non-accepting state and returns its id.
    pub fn create_state(&mut self) -> StateId {
        self.states.push(State::default());
        self.states.len() - 1
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Marks `state` as accepting or not.
    pub fn set_accept(&mut self, state: StateId, accept: bool) {
        self.states[state].accept = accept;
    }

    /// Whether `state` is accepting.
    pub fn is_accept(&self, state: StateId) -> bool {
        self.states[state].accept
    }

    /// Outgoing edges of `state`, sorted by label.
    pub fn transitions(&self, state: StateId) -> &[Transition<L>] {
        &self.states[state].transitions
    }

    /// Whether every state has at most one edge per label.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Adds an edge `src -label-> dest`.
    pub fn add_transition(&mut self, src: StateId, dest: StateId, label: L) {
        let transitions = &mut self.states[src].transitions;
        let transition = Transition { label, dest };
        if let Err(at) = transitions.binary_search(&transition) {
            let same_label = |t: &Transition<L>| t.label == label;
            if transitions.get(at).is_some_and(same_label)
                || at
                    .checked_sub(1)
                    .and_then(|i| transitions.get(i))
                    .is_some_and(same_label)
            {
                self.deterministic = false;
            }
            transitions.insert(at, transition);
        }
    }

    /// Splices `dest` onto `src`: copies its current edges and accept flag.
    ///
    /// The copy is by value, so edges added to `dest` afterwards are not
    /// seen by `src`. Always leaves the automaton flagged non-deterministic.
    pub fn add_epsilon(&mut self, src: StateId, dest: StateId) {
        if self.states[dest].accept {
            self.states[src].accept = true;
        }
        let copied = self.states[dest].transitions.clone();
        for transition in copied {
            self.add_transition(src, transition.dest, transition.label);
        }
        self.deterministic = false;
    }

    /// Follows the first edge labelled `label` out of `state`.
    pub fn step(&self, state: StateId, label: L) -> Option<StateId> {
        let transitions = &self.states[state].transitions;
        let at = transitions.partition_point(|t| t.label < label);
        transitions
            .get(at)
            .filter(|t| t.label == label)
            .map(|t| t.dest)
    }

    /// Orders all states so every edge points forward.
    ///
    /// Returns `None` when the automaton has a cycle.
    pub fn topo_sort(&self) -> Option<Vec<StateId>> {
        let mut in_degree = vec![0usize; self.states.len()];
        for state in &self.states {
            for transition in &state.transitions {
                in_degree[transition.dest] += 1;
            }
        }

        let mut ready: VecDeque<StateId> = (0..self.states.len())
            .filter(|&s| in_degree[s] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.states.len());
        while let Some(state) = ready.pop_front() {
            order.push(state);
            for transition in &self.states[state].transitions {
                in_degree[transition.dest] -= 1;
                if in_degree[transition.dest] == 0 {
                    ready.push_back(transition.dest);
                }
            }
        }

        (order.len() == self.states.len()).then_some(order)
    }

    /// Whether the automaton accepts only finitely many strings.
    pub fn is_finite(&self) -> bool {
        self.topo_sort().is_some()
    }

    /// Subset construction.
    ///
    /// Fails with [`SuggestError::TooComplexToDeterminize`] when the result
    /// would need more than `max_states` states.
    pub fn determinize(&self, max_states: usize) -> Result<Self, SuggestError> {
        if self.deterministic || self.states.is_empty() {
            return Ok(self.clone());
        }

        let mut result = Self::new();
        let mut ids: BTreeMap<Vec<StateId>, StateId> = BTreeMap::new();
        let mut pending: VecDeque<Vec<StateId>> = VecDeque::new();

        let initial = vec![0];
        let start = result.create_state();
        ids.insert(initial.clone(), start);
        pending.push_back(initial);

        while let Some(subset) = pending.pop_front() {
            let id = ids[&subset];
            let mut by_label: BTreeMap<L, BTreeSet<StateId>> = BTreeMap::new();
            for &state in &subset {
                if self.states[state].accept {
                    result.states[id].accept = true;
                }
                for transition in &self.states[state].transitions {
                    by_label
                        .entry(transition.label)
                        .or_default()
                        .insert(transition.dest);
                }
            }

            for (label, dests) in by_label {
                let target: Vec<StateId> = dests.into_iter().collect();
                let dest = match ids.get(&target) {
                    Some(&dest) => dest,
                    None => {
                        if result.states.len() >= max_states {
                            return Err(SuggestError::TooComplexToDeterminize {
                                limit: max_states,
                            });
                        }
                        let dest = result.create_state();
                        ids.insert(target.clone(), dest);
                        pending.push_back(target);
                        dest
                    }
                };
                result.states[id].transitions.push(Transition { label, dest });
            }
        }

        Ok(result)
    }

    /// Enumerates the distinct accepted strings in label order of discovery.
    ///
    /// Stops once `limit` distinct strings are collected. Cyclic automata are
    /// rejected with [`SuggestError::InfiniteAutomaton`].
    pub fn finite_strings(&self, limit: Option<usize>) -> Result<BTreeSet<Vec<L>>, SuggestError> {
        if !self.is_finite() {
            return Err(SuggestError::InfiniteAutomaton);
        }

        let mut strings = BTreeSet::new();
        if self.states.is_empty() || limit == Some(0) {
            return Ok(strings);
        }
        let full = |strings: &BTreeSet<Vec<L>>| limit.is_some_and(|l| strings.len() >= l);

        if self.states[0].accept {
            strings.insert(Vec::new());
        }

        let mut path: Vec<L> = Vec::new();
        let mut stack: Vec<(StateId, usize)> = vec![(0, 0)];
        while let Some(&(state, next)) = stack.last() {
            if full(&strings) {
                break;
            }
            let Some(&transition) = self.states[state].transitions.get(next) else {
                stack.pop();
                path.pop();
                continue;
            };

            let depth = stack.len() - 1;
            stack[depth].1 += 1;
            path.push(transition.label);
            if self.states[transition.dest].accept {
                strings.insert(path.clone());
            }
            stack.push((transition.dest, 0));
        }

        Ok(strings)
    }
}
