//! Extension points for customizing analysis and lookup.

use fst::raw::Fst;

use crate::{automaton::Automaton, search::PrefixPath};

/// Strategy hooks applied by a [`crate::Suggester`].
///
/// Both default to the identity.
pub trait SuggestHooks: Send + Sync {
    /// Transforms an analyzed automaton after separators are normalized.
    ///
    /// Applied at build time to every entry and at lookup time to the
    /// determinized query automaton. The result must stay finite.
    fn convert_automaton(&self, automaton: Automaton) -> Automaton {
        automaton
    }

    /// Extends the prefix paths that seed the general top-N search.
    ///
    /// Not consulted for the exact-match search.
    fn full_prefix_paths(
        &self,
        prefix_paths: Vec<PrefixPath>,
        _lookup: &Automaton,
        _fst: &Fst<Vec<u8>>,
    ) -> Vec<PrefixPath> {
        prefix_paths
    }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl SuggestHooks for DefaultHooks {}
