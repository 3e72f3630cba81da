//! Searching the suggestion FST.
//!
//! Two primitives: [`intersect_prefix_paths`] walks the FST along every
//! string the lookup automaton accepts, and [`TopNSearcher`] runs a
//! best-first search for the cheapest completions below a set of start
//! nodes.

use std::collections::BTreeSet;

use fst::raw::{CompiledAddr, Fst, Output};
use tracing::warn;

use crate::{
    SuggestError,
    automaton::{Automaton, StateId},
};

/// An FST node reached by consuming a string accepted by the lookup automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixPath {
    /// FST node reached.
    pub node: CompiledAddr,
    /// Output accumulated along the way.
    pub output: u64,
    /// Bytes consumed.
    pub input: Vec<u8>,
    /// Automaton state reached.
    pub state: StateId,
}

/// Finds every FST node reachable by a string the automaton accepts.
///
/// A path is reported at every accepting automaton state and keeps extending
/// while the automaton has edges left, so one accepted string may be a prefix
/// of another.
pub fn intersect_prefix_paths(automaton: &Automaton, fst: &Fst<Vec<u8>>) -> Vec<PrefixPath> {
    let mut end_paths = Vec::new();
    if automaton.num_states() == 0 {
        return end_paths;
    }

    let mut stack = vec![PrefixPath {
        node: fst.root().addr(),
        output: 0,
        input: Vec::new(),
        state: 0,
    }];

    while let Some(path) = stack.pop() {
        let transitions = automaton.transitions(path.state);
        if automaton.is_accept(path.state) {
            end_paths.push(path.clone());
            if transitions.is_empty() {
                continue;
            }
        }

        let node = fst.node(path.node);
        for transition in transitions {
            let Some(i) = node.find_input(transition.label) else {
                continue;
            };
            let arc = node.transition(i);
            let mut input = path.input.clone();
            input.push(transition.label);
            stack.push(PrefixPath {
                node: arc.addr,
                output: Output::new(path.output).cat(arc.out).value(),
                input,
                state: transition.dest,
            });
        }
    }

    end_paths
}

/// Whether a queued candidate is a finished key or an unexplored node.
///
/// `Complete` sorts first so a finished key beats a node with the same bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    /// A full key; `output` is exact.
    Complete,
    /// An FST node; `output` bounds every key below it.
    Partial,
}

/// One entry of the search frontier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    /// Accumulated output.
    output: u64,
    /// Kind of entry.
    kind: Kind,
    /// Bytes consumed from the search root.
    input: Vec<u8>,
    /// FST node (unused for `Complete`).
    node: CompiledAddr,
}

/// One accepted completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// The full FST key.
    pub input: Vec<u8>,
    /// The key's output.
    pub output: u64,
}

/// Results of a top-N search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopResults {
    /// Accepted completions, cheapest first.
    pub hits: Vec<SearchHit>,
    /// False when queue pruning may have dropped a better completion.
    pub complete: bool,
}

/// Best-first search for the `top_n` cheapest completions.
///
/// The frontier holds at most `max_queue_depth` candidates; the most
/// expensive are pruned first. FST outputs never decrease along a path, so a
/// node's accumulated output bounds all of its completions.
pub struct TopNSearcher<'f> {
    /// Transducer being searched.
    fst: &'f Fst<Vec<u8>>,
    /// Completions wanted.
    top_n: usize,
    /// Frontier bound.
    max_queue_depth: usize,
    /// Frontier ordered by output.
    queue: BTreeSet<Candidate>,
}

impl<'f> TopNSearcher<'f> {
    /// Creates a searcher over `fst`.
    pub fn new(fst: &'f Fst<Vec<u8>>, top_n: usize, max_queue_depth: usize) -> Self {
        Self {
            fst,
            top_n,
            max_queue_depth,
            queue: BTreeSet::new(),
        }
    }

    /// Seeds the search with the children of `node`.
    ///
    /// With `allow_empty`, `node` itself is a candidate completion when final.
    pub fn add_start_path(&mut self, node: CompiledAddr, output: u64, input: Vec<u8>, allow_empty: bool) {
        let fst = self.fst;
        let start = fst.node(node);
        if allow_empty && start.is_final() {
            self.push(Candidate {
                output: Output::new(output).cat(start.final_output()).value(),
                kind: Kind::Complete,
                input: input.clone(),
                node,
            });
        }
        self.expand(node, output, &input);
    }

    /// Runs the search; `accept` may veto completions.
    pub fn search<F>(mut self, mut accept: F) -> Result<TopResults, SuggestError>
    where
        F: FnMut(&[u8], u64) -> Result<bool, SuggestError>,
    {
        let mut hits = Vec::new();
        let mut rejected = 0usize;

        while hits.len() < self.top_n {
            let Some(candidate) = self.queue.pop_first() else {
                break;
            };
            match candidate.kind {
                Kind::Complete => {
                    if accept(&candidate.input, candidate.output)? {
                        hits.push(SearchHit {
                            input: candidate.input,
                            output: candidate.output,
                        });
                    } else {
                        rejected += 1;
                    }
                }
                Kind::Partial => {
                    let fst = self.fst;
                    let node = fst.node(candidate.node);
                    if node.is_final() {
                        self.push(Candidate {
                            output: Output::new(candidate.output)
                                .cat(node.final_output())
                                .value(),
                            kind: Kind::Complete,
                            input: candidate.input.clone(),
                            node: candidate.node,
                        });
                    }
                    self.expand(candidate.node, candidate.output, &candidate.input);
                }
            }
        }

        let complete = rejected + self.top_n <= self.max_queue_depth;
        if !complete {
            warn!(
                rejected,
                top_n = self.top_n,
                max_queue_depth = self.max_queue_depth,
                "top-n search may be incomplete"
            );
        }
        Ok(TopResults { hits, complete })
    }

    /// Queues one partial candidate per outgoing arc of `node`.
    fn expand(&mut self, node: CompiledAddr, output: u64, input: &[u8]) {
        let fst = self.fst;
        let node = fst.node(node);
        for arc in node.transitions() {
            let mut next = input.to_vec();
            next.push(arc.inp);
            self.push(Candidate {
                output: Output::new(output).cat(arc.out).value(),
                kind: Kind::Partial,
                input: next,
                node: arc.addr,
            });
        }
    }

    /// Inserts a candidate and prunes the frontier.
    fn push(&mut self, candidate: Candidate) {
        self.queue.insert(candidate);
        if self.queue.len() > self.max_queue_depth {
            self.queue.pop_last();
        }
    }
}
