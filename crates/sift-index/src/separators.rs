//! Rewrites position separators and holes of a token automaton into bytes.

use crate::{SuggestError, automaton::Automaton, token_automaton::TokenLabel};

/// Replaces [`TokenLabel::PosSep`] and [`TokenLabel::Hole`] edges.
///
/// With `preserve_sep`, each separator edge is relabelled to `sep_byte`;
/// otherwise it is spliced away. Hole edges are always spliced away, so two
/// separators around a removed token collapse into adjacent separator bytes.
///
/// States keep their ids and accept flags. They are processed in reverse
/// topological order so a splice always copies a finished state.
pub fn replace_sep(
    automaton: &Automaton<TokenLabel>,
    preserve_sep: bool,
    sep_byte: u8,
) -> Result<Automaton, SuggestError> {
    let order = automaton
        .topo_sort()
        .ok_or(SuggestError::InfiniteAutomaton)?;

    let mut result = Automaton::new();
    for state in 0..automaton.num_states() {
        let id = result.create_state();
        result.set_accept(id, automaton.is_accept(state));
    }

    for &state in order.iter().rev() {
        for transition in automaton.transitions(state) {
            match transition.label {
                TokenLabel::PosSep if preserve_sep => {
                    result.add_transition(state, transition.dest, sep_byte);
                }
                TokenLabel::PosSep | TokenLabel::Hole => result.add_epsilon(state, transition.dest),
                TokenLabel::Byte(byte) => result.add_transition(state, transition.dest, byte),
            }
        }
    }

    Ok(result)
}
