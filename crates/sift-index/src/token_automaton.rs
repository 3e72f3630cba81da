//! Converts a token graph into a token automaton.
//!
//! Every position has an *arriving* state, where tokens ending at that
//! position land, and a *leaving* state, where tokens starting there begin.
//! The two are joined by a [`TokenLabel::PosSep`] edge. Positions skipped by
//! the token stream are bridged with [`TokenLabel::Hole`] edges. Both labels
//! sit outside the byte range and are rewritten later by
//! [`crate::separators::replace_sep`].

use sift_config::HOLE_BYTE;

use crate::{
    analyzer::GraphToken,
    automaton::{Automaton, StateId},
};

/// Byte written before a token byte that would otherwise read as a
/// separator or as another escape.
pub const ESCAPE: u8 = HOLE_BYTE;

/// Edge label of a token automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenLabel {
    /// One byte of token text.
    Byte(u8),
    /// Boundary between two token positions.
    PosSep,
    /// A position skipped by the token stream.
    Hole,
}

/// States attached to one token position.
#[derive(Debug, Clone, Copy, Default)]
struct Position {
    /// State where tokens ending here arrive.
    arriving: Option<StateId>,
    /// State where tokens starting here leave from.
    leaving: Option<StateId>,
}

/// Position table that grows on demand.
struct Positions(Vec<Position>);

impl Positions {
    /// Returns the entry for `pos`, growing the table as needed.
    fn get_mut(&mut self, pos: usize) -> &mut Position {
        if pos >= self.0.len() {
            self.0.resize(pos + 1, Position::default());
        }
        &mut self.0[pos]
    }

    /// Returns the entry for `pos`, or an empty one past the end.
    fn get(&self, pos: usize) -> Position {
        self.0.get(pos).copied().unwrap_or_default()
    }
}

/// Builds the automaton for `tokens`.
///
/// A first token with an increment above one starts after leading holes.
/// When `preserve_position_increments` is false every increment above one is
/// treated as one, so removed tokens leave no trace.
///
/// With `escape_sep` set, token bytes equal to that separator byte or to
/// [`ESCAPE`] are preceded by [`ESCAPE`], so token text can never be mistaken
/// for a preserved separator.
pub fn tokens_to_automaton(
    tokens: &[GraphToken],
    preserve_position_increments: bool,
    escape_sep: Option<u8>,
) -> Automaton<TokenLabel> {
    let mut automaton = Automaton::new();
    let start = automaton.create_state();
    let mut positions = Positions(Vec::new());
    let mut pos: Option<usize> = None;

    for token in tokens {
        let increment = if preserve_position_increments {
            token.position_increment
        } else {
            token.position_increment.min(1)
        };
        let current = pos.map_or(increment.saturating_sub(1), |p| p + increment);

        if pos != Some(current) {
            let leaving = if current == 0 { start } else { automaton.create_state() };
            let arriving = positions.get(current).arriving;
            positions.get_mut(current).leaving = Some(leaving);
            match arriving {
                Some(arriving) => {
                    automaton.add_transition(arriving, leaving, TokenLabel::PosSep);
                    if increment > 1 {
                        add_holes(&mut automaton, &mut positions, current);
                    }
                }
                None if current > 0 => add_holes(&mut automaton, &mut positions, current),
                None => {}
            }
            pos = Some(current);
        }

        let end = current + token.position_length.max(1);
        let arriving = match positions.get(end).arriving {
            Some(state) => state,
            None => {
                let state = automaton.create_state();
                positions.get_mut(end).arriving = Some(state);
                state
            }
        };

        let Some(mut state) = positions.get(current).leaving else {
            continue;
        };
        let labels = token_labels(token.text.as_bytes(), escape_sep);
        for (i, &label) in labels.iter().enumerate() {
            let next = if i + 1 == labels.len() {
                arriving
            } else {
                automaton.create_state()
            };
            automaton.add_transition(state, next, label);
            state = next;
        }
    }

    if let Some(last) = pos {
        for later in (last + 1)..positions.0.len() {
            if let Some(arriving) = positions.get(later).arriving {
                automaton.set_accept(arriving, true);
            }
        }
    }

    automaton
}

/// Byte labels for one token, escaped against `escape_sep`.
fn token_labels(bytes: &[u8], escape_sep: Option<u8>) -> Vec<TokenLabel> {
    let mut labels = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        if escape_sep.is_some_and(|sep| byte == sep || byte == ESCAPE) {
            labels.push(TokenLabel::Byte(ESCAPE));
        }
        labels.push(TokenLabel::Byte(byte));
    }
    labels
}

/// Bridges skipped positions ending at `pos` with hole edges.
///
/// Position 0 leaves from the start state, so a leading gap is a hole edge
/// out of the start state.
fn add_holes(automaton: &mut Automaton<TokenLabel>, positions: &mut Positions, mut pos: usize) {
    while pos > 0 {
        let prev = pos - 1;
        let here = positions.get(pos);
        let before = positions.get(prev);
        if here.arriving.is_some() && before.leaving.is_some() {
            break;
        }

        let arriving = match here.arriving {
            Some(state) => state,
            None => {
                let state = automaton.create_state();
                if let Some(leaving) = here.leaving {
                    automaton.add_transition(state, leaving, TokenLabel::PosSep);
                }
                positions.get_mut(pos).arriving = Some(state);
                state
            }
        };
        let prev_leaving = match before.leaving {
            Some(state) => state,
            None => {
                let state = if prev == 0 { 0 } else { automaton.create_state() };
                if let Some(prev_arriving) = before.arriving {
                    automaton.add_transition(prev_arriving, state, TokenLabel::PosSep);
                }
                positions.get_mut(prev).leaving = Some(state);
                state
            }
        };

        automaton.add_transition(prev_leaving, arriving, TokenLabel::Hole);
        pos = prev;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Accepted paths, with `|` for separators and `_` for holes.
    fn paths(automaton: &Automaton<TokenLabel>) -> Vec<String> {
        automaton
            .finite_strings(None)
            .unwrap()
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .map(|label| match label {
                        TokenLabel::Byte(byte) => char::from(byte),
                        TokenLabel::PosSep => '|',
                        TokenLabel::Hole => '_',
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn single_token() {
        let automaton = tokens_to_automaton(&[GraphToken::new("ab")], true, None);
        assert_eq!(paths(&automaton), vec!["ab"]);
    }

    #[test]
    fn tokens_are_separated() {
        let tokens = [GraphToken::new("new"), GraphToken::new("york")];
        let automaton = tokens_to_automaton(&tokens, true, None);
        assert_eq!(paths(&automaton), vec!["new|york"]);
    }

    #[test]
    fn stacked_synonyms_branch() {
        let tokens = [
            GraphToken::new("big"),
            GraphToken::new("large").with_increment(0),
            GraphToken::new("apple"),
        ];
        let automaton = tokens_to_automaton(&tokens, true, None);
        assert_eq!(paths(&automaton), vec!["big|apple", "large|apple"]);
    }

    #[test]
    fn multi_position_token_spans() {
        let tokens = [
            GraphToken::new("ny").with_length(2),
            GraphToken::new("new").with_increment(0),
            GraphToken::new("york"),
        ];
        let automaton = tokens_to_automaton(&tokens, true, None);
        assert_eq!(paths(&automaton), vec!["new|york", "ny"]);
    }

    #[test]
    fn gaps_become_holes() {
        let tokens = [GraphToken::new("a"), GraphToken::new("b").with_increment(2)];
        let automaton = tokens_to_automaton(&tokens, true, None);
        assert_eq!(paths(&automaton), vec!["a|_|b"]);
    }

    #[test]
    fn gaps_ignored_without_position_increments() {
        let tokens = [GraphToken::new("a"), GraphToken::new("b").with_increment(3)];
        let automaton = tokens_to_automaton(&tokens, false, None);
        assert_eq!(paths(&automaton), vec!["a|b"]);
    }

    #[test]
    fn leading_gap_becomes_hole() {
        let tokens = [GraphToken::new("ghost").with_increment(2)];
        assert_eq!(paths(&tokens_to_automaton(&tokens, true, None)), vec!["_|ghost"]);

        let tokens = [GraphToken::new("ghost").with_increment(3)];
        assert_eq!(paths(&tokens_to_automaton(&tokens, true, None)), vec!["_|_|ghost"]);
        assert_eq!(paths(&tokens_to_automaton(&tokens, false, None)), vec!["ghost"]);
    }

    #[test]
    fn separator_bytes_in_tokens_are_literal() {
        let tokens = [GraphToken::new("new\x1fyork"), GraphToken::new("ab\x1ecd")];
        let automaton = tokens_to_automaton(&tokens, true, None);
        let strings = automaton.finite_strings(None).unwrap();
        let path = strings.first().unwrap();
        assert_eq!(
            path.iter().filter(|l| **l == TokenLabel::PosSep).count(),
            1
        );
        assert!(!path.contains(&TokenLabel::Hole));
        assert!(path.contains(&TokenLabel::Byte(0x1f)));
        assert!(path.contains(&TokenLabel::Byte(0x1e)));
    }

    #[test]
    fn escapes_separator_and_escape_bytes() {
        let tokens = [GraphToken::new("a\x1fb\x1ec")];
        let automaton = tokens_to_automaton(&tokens, true, Some(0x1f));
        assert_eq!(paths(&automaton), vec!["a\x1e\x1fb\x1e\x1ec"]);

        let automaton = tokens_to_automaton(&[GraphToken::new("a b")], true, Some(b' '));
        assert_eq!(paths(&automaton), vec!["a\x1e b"]);
    }

    #[test]
    fn no_tokens_accepts_nothing() {
        let automaton = tokens_to_automaton(&[], true, None);
        assert!(paths(&automaton).is_empty());
    }

    #[test]
    fn result_is_acyclic() {
        let tokens = [
            GraphToken::new("a"),
            GraphToken::new("b").with_increment(3),
            GraphToken::new("c").with_increment(0).with_length(2),
            GraphToken::new("d"),
        ];
        assert!(tokens_to_automaton(&tokens, true, None).is_finite());
    }
}
