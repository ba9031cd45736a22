//! Backtracking subgraph-isomorphism search with caller-supplied matchers.
//!
//! The search maps every query atom to a distinct target atom such that the
//! atom matcher accepts each pair and every query bond lands on a target bond
//! accepted by the bond matcher. Query atoms are visited in depth-first
//! order, so each atom after a component root is extended from the image of
//! an already-mapped neighbor.

use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// Target atom per query atom, indexed by query atom index.
pub type Mapping = Vec<NodeIndex>;

/// Receives complete mappings as the search finds them.
pub trait MappingCollector {
    fn add(&mut self, mapping: Mapping);

    /// Whether the search may stop after the mapping just added.
    fn is_done(&self) -> bool {
        false
    }
}

/// Existence query: stops at the first mapping and keeps nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoMapping {
    pub matched: bool,
}

impl MappingCollector for NoMapping {
    fn add(&mut self, _mapping: Mapping) {
        self.matched = true;
    }

    fn is_done(&self) -> bool {
        self.matched
    }
}

/// Counts every mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountMapping {
    pub count: usize,
}

impl MappingCollector for CountMapping {
    fn add(&mut self, _mapping: Mapping) {
        self.count += 1;
    }
}

/// Keeps the first mapping and stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleMapping {
    pub mapping: Option<Mapping>,
}

impl MappingCollector for SingleMapping {
    fn add(&mut self, mapping: Mapping) {
        if self.mapping.is_none() {
            self.mapping = Some(mapping);
        }
    }

    fn is_done(&self) -> bool {
        self.mapping.is_some()
    }
}

/// Keeps every mapping in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingList {
    pub maps: Vec<Mapping>,
}

impl MappingCollector for MappingList {
    fn add(&mut self, mapping: Mapping) {
        self.maps.push(mapping);
    }
}

impl<C: MappingCollector + ?Sized> MappingCollector for &mut C {
    fn add(&mut self, mapping: Mapping) {
        (**self).add(mapping);
    }

    fn is_done(&self) -> bool {
        (**self).is_done()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchOptions {
    /// Report only one mapping per distinct set of target atoms.
    pub unique: bool,
}

impl SearchOptions {
    pub fn unique() -> Self {
        Self { unique: true }
    }
}

/// Runs a full search of `query` in `target`, feeding mappings to
/// `collector`. Returns whether at least one mapping was found.
///
/// `atom_match(query_atom, target_atom)` and
/// `bond_match(query_bond, target_bond)` decide compatibility.
pub fn isomorphism_search<A1, B1, A2, B2, FA, FB, C>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
    collector: &mut C,
    options: SearchOptions,
) -> bool
where
    FA: Fn(NodeIndex, NodeIndex) -> bool,
    FB: Fn(EdgeIndex, EdgeIndex) -> bool,
    C: MappingCollector + ?Sized,
{
    if query.atom_count() > target.atom_count() {
        return false;
    }
    let mut state = Vf2::new(target, query, atom_match, bond_match, None, options);
    let mut found = false;
    state.recurse(0, &mut |m| {
        found = true;
        collector.add(m);
        collector.is_done()
    });
    found
}

/// Existence query with query atom 0 fixed on `anchor`.
pub fn anchored_search<A1, B1, A2, B2, FA, FB>(
    target: &Mol<A1, B1>,
    anchor: NodeIndex,
    query: &Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
) -> bool
where
    FA: Fn(NodeIndex, NodeIndex) -> bool,
    FB: Fn(EdgeIndex, EdgeIndex) -> bool,
{
    if query.is_empty() || anchor.index() >= target.atom_count() {
        return false;
    }
    if query.atom_count() > target.atom_count() {
        return false;
    }
    let mut state = Vf2::new(
        target,
        query,
        atom_match,
        bond_match,
        Some(anchor),
        SearchOptions::default(),
    );
    let mut found = false;
    state.recurse(0, &mut |_| {
        found = true;
        true
    });
    found
}

struct Vf2<'a, A1, B1, A2, B2, FA, FB> {
    target: &'a Mol<A1, B1>,
    query: &'a Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
    anchor: Option<NodeIndex>,
    /// Visit order: query atom plus the earlier-visited neighbor it extends from.
    order: Vec<(NodeIndex, Option<NodeIndex>)>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    unique: bool,
    seen: HashSet<Vec<NodeIndex>>,
}

impl<'a, A1, B1, A2, B2, FA, FB> Vf2<'a, A1, B1, A2, B2, FA, FB>
where
    FA: Fn(NodeIndex, NodeIndex) -> bool,
    FB: Fn(EdgeIndex, EdgeIndex) -> bool,
{
    fn new(
        target: &'a Mol<A1, B1>,
        query: &'a Mol<A2, B2>,
        atom_match: FA,
        bond_match: FB,
        anchor: Option<NodeIndex>,
        options: SearchOptions,
    ) -> Self {
        Self {
            target,
            query,
            atom_match,
            bond_match,
            anchor,
            order: dfs_order(query),
            query_map: vec![None; query.atom_count()],
            target_used: vec![false; target.atom_count()],
            unique: options.unique,
            seen: HashSet::new(),
        }
    }

    /// Returns true when the sink asked to stop.
    fn recurse(&mut self, depth: usize, sink: &mut dyn FnMut(Mapping) -> bool) -> bool {
        if depth == self.order.len() {
            let mapping: Mapping = self.query_map.iter().flatten().copied().collect();
            if self.unique {
                let mut key = mapping.clone();
                key.sort();
                if !self.seen.insert(key) {
                    return false;
                }
            }
            return sink(mapping);
        }

        let (query_node, parent) = self.order[depth];
        let candidates: Vec<NodeIndex> = match (depth, self.anchor, parent) {
            (0, Some(anchor), _) => vec![anchor],
            (_, _, Some(p)) => match self.query_map[p.index()] {
                Some(image) => self.target.neighbors(image).collect(),
                None => self.target.atoms().collect(),
            },
            _ => self.target.atoms().collect(),
        };

        for target_node in candidates {
            if self.target_used[target_node.index()] {
                continue;
            }
            if !self.is_feasible(query_node, target_node) {
                continue;
            }

            self.query_map[query_node.index()] = Some(target_node);
            self.target_used[target_node.index()] = true;

            let stop = self.recurse(depth + 1, sink);

            self.query_map[query_node.index()] = None;
            self.target_used[target_node.index()] = false;

            if stop {
                return true;
            }
        }
        false
    }

    fn is_feasible(&self, query_node: NodeIndex, target_node: NodeIndex) -> bool {
        if !(self.atom_match)(query_node, target_node) {
            return false;
        }

        for q_bond in self.query.bonds_of(query_node) {
            let Some((a, b)) = self.query.bond_endpoints(q_bond) else {
                continue;
            };
            let q_neighbor = if a == query_node { b } else { a };
            let Some(t_mapped) = self.query_map[q_neighbor.index()] else {
                continue;
            };
            match self.target.bond_between(target_node, t_mapped) {
                Some(t_bond) => {
                    if !(self.bond_match)(q_bond, t_bond) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

/// Depth-first visit order over all query components, starting from the
/// lowest unvisited atom index.
fn dfs_order<A, B>(query: &Mol<A, B>) -> Vec<(NodeIndex, Option<NodeIndex>)> {
    let n = query.atom_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(NodeIndex, Option<NodeIndex>)> = Vec::new();
    for root in query.atoms() {
        if visited[root.index()] {
            continue;
        }
        stack.push((root, None));
        while let Some((node, parent)) = stack.pop() {
            if visited[node.index()] {
                continue;
            }
            visited[node.index()] = true;
            order.push((node, parent));
            let mut next: Vec<NodeIndex> = query
                .neighbors(node)
                .filter(|nb| !visited[nb.index()])
                .collect();
            // Reverse so the lowest index is popped first.
            next.sort_by(|a, b| b.cmp(a));
            stack.extend(next.into_iter().map(|nb| (nb, Some(node))));
        }
    }
    order
}
