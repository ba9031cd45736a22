//! Joins per-fragment mapping lists of a disconnected query into global
//! mappings that never place two query atoms on one target atom.

use std::collections::HashSet;

use petgraph::graph::NodeIndex;

use crate::isomorphism::{Mapping, MappingCollector, SearchOptions};

/// Backtracks over `per_fragment` in order, emitting every disjoint
/// combination to `collector`. `atom_maps[f][j]` is the global slot of
/// fragment `f`'s local atom `j`; `num_atoms` is the global mapping length.
///
/// Returns whether anything was emitted. Stops early once the collector is
/// done.
pub fn combine_fragments<C: MappingCollector + ?Sized>(
    per_fragment: &[Vec<Mapping>],
    atom_maps: &[Vec<usize>],
    num_atoms: usize,
    collector: &mut C,
    options: SearchOptions,
) -> bool {
    if per_fragment.is_empty() || per_fragment.iter().any(Vec::is_empty) {
        return false;
    }
    let mut state = Combiner {
        per_fragment,
        atom_maps,
        global: vec![None; num_atoms],
        used: HashSet::new(),
        seen: HashSet::new(),
        unique: options.unique,
        matched: false,
    };
    state.enumerate(0, collector);
    state.matched
}

struct Combiner<'a> {
    per_fragment: &'a [Vec<Mapping>],
    atom_maps: &'a [Vec<usize>],
    global: Vec<Option<NodeIndex>>,
    used: HashSet<NodeIndex>,
    seen: HashSet<Vec<NodeIndex>>,
    unique: bool,
    matched: bool,
}

impl Combiner<'_> {
    /// Returns true when the collector asked to stop.
    fn enumerate<C: MappingCollector + ?Sized>(
        &mut self,
        fragment: usize,
        collector: &mut C,
    ) -> bool {
        if fragment == self.per_fragment.len() {
            let mapping: Mapping = self.global.iter().flatten().copied().collect();
            if self.unique {
                let mut key = mapping.clone();
                key.sort();
                if !self.seen.insert(key) {
                    return false;
                }
            }
            self.matched = true;
            collector.add(mapping);
            return collector.is_done();
        }

        let (per_fragment, atom_maps) = (self.per_fragment, self.atom_maps);
        let slots = &atom_maps[fragment];
        for candidate in &per_fragment[fragment] {
            if candidate.iter().any(|t| self.used.contains(t)) {
                continue;
            }
            for (&slot, &target) in slots.iter().zip(candidate) {
                self.global[slot] = Some(target);
                self.used.insert(target);
            }

            let stop = self.enumerate(fragment + 1, collector);

            for (&slot, target) in slots.iter().zip(candidate) {
                self.global[slot] = None;
                self.used.remove(target);
            }
            if stop {
                return true;
            }
        }
        false
    }
}
