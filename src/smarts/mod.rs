//! SMARTS substructure queries.
//!
//! [`Smarts::compile`] turns a pattern into expression trees, one query graph
//! per connected component, plus a table of `$(...)` sub-queries. Searches
//! hand evaluator closures to [`isomorphism_search`] and, for disconnected
//! patterns, join the per-component results with [`combine_fragments`].

mod combine;
mod error;
pub mod matcher;
mod parser;
pub mod query;

pub use combine::combine_fragments;
pub use error::{SmartsError, SmartsErrorKind};
pub use matcher::MatchContext;
pub use query::{AtomExpr, BondExpr, Fragment};

use std::str::FromStr;

use petgraph::graph::NodeIndex;
use tracing::trace;

use crate::isomorphism::{
    isomorphism_search, CountMapping, Mapping, MappingCollector, MappingList, NoMapping,
    SearchOptions, SingleMapping,
};
use crate::mol::Mol;
use crate::rings::RingSet;
use crate::traits::{QueryableAtom, QueryableBond};

use matcher::{atom_matches, bond_matches};

/// A compiled SMARTS pattern.
///
/// Immutable once compiled; clone it to get an independent deep copy of
/// every expression tree. The default value is the empty query, which
/// matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Smarts {
    pub(crate) fragments: Vec<Fragment>,
    pub(crate) recursive: Vec<Smarts>,
    atom_classes: Vec<u16>,
}

impl Smarts {
    /// Compiles `text`. Never panics on malformed input.
    ///
    /// # Examples
    ///
    /// ```
    /// use chemsift::{from_smiles, Smarts};
    ///
    /// let acid = Smarts::compile("C(=O)[OH]").unwrap();
    /// assert!(acid.matches(&from_smiles("CC(=O)O").unwrap()));
    /// assert!(!acid.matches(&from_smiles("CC(=O)OC").unwrap()));
    /// ```
    pub fn compile(text: &str) -> Result<Self, SmartsError> {
        if text.is_empty() {
            return Err(SmartsError::syntax("empty SMARTS", 0, 0));
        }
        compile_at(text, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragment(&self, index: usize) -> Option<&Fragment> {
        self.fragments.get(index)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Sub-queries referenced by [`AtomExpr::Recursive`] leaves.
    pub fn recursive(&self) -> &[Smarts] {
        &self.recursive
    }

    /// Total atoms over all fragments.
    pub fn num_atoms(&self) -> usize {
        self.atom_classes.len()
    }

    /// The `:n` class of the atom at source `index`, 0 if it has none.
    pub fn atom_class(&self, index: usize) -> u16 {
        self.atom_classes.get(index).copied().unwrap_or(0)
    }

    /// Whether matching needs ring perception on the target.
    pub fn requires_cycles(&self) -> bool {
        self.fragments.iter().any(|f| {
            f.query.atoms().any(|a| f.query.atom(a).uses_rings())
                || f.query.bonds().any(|b| f.query.bond(b).uses_rings())
        }) || self.recursive.iter().any(Smarts::requires_cycles)
    }

    /// Whether the pattern tests for hydrogen atoms, which only match
    /// targets that keep hydrogens as graph atoms.
    pub fn requires_explicit_hydrogens(&self) -> bool {
        self.fragments.iter().any(|f| {
            f.query
                .atoms()
                .any(|a| f.query.atom(a).tests_hydrogen_element())
        }) || self.recursive.iter().any(Smarts::requires_explicit_hydrogens)
    }

    /// Runs the full search with unique mappings. Mappings are indexed by
    /// source atom index.
    pub fn search<A, B, C>(&self, target: &Mol<A, B>, rings: &RingSet, collector: &mut C) -> bool
    where
        A: QueryableAtom,
        B: QueryableBond,
        C: MappingCollector + ?Sized,
    {
        self.search_with(target, rings, collector, SearchOptions::unique())
    }

    pub fn search_with<A, B, C>(
        &self,
        target: &Mol<A, B>,
        rings: &RingSet,
        collector: &mut C,
        options: SearchOptions,
    ) -> bool
    where
        A: QueryableAtom,
        B: QueryableBond,
        C: MappingCollector + ?Sized,
    {
        let ctx = MatchContext::new(target, rings, &self.recursive);
        match self.fragments.as_slice() {
            [] => false,
            [single] => search_fragment(single, ctx, collector, options),
            fragments => {
                let mut per_fragment = Vec::with_capacity(fragments.len());
                for (i, fragment) in fragments.iter().enumerate() {
                    let mut list = MappingList::default();
                    search_fragment(fragment, ctx, &mut list, options);
                    trace!(fragment = i, mappings = list.maps.len(), "fragment searched");
                    if list.maps.is_empty() {
                        return false;
                    }
                    per_fragment.push(list.maps);
                }
                let atom_maps: Vec<Vec<usize>> =
                    fragments.iter().map(|f| f.atom_map.clone()).collect();
                combine_fragments(&per_fragment, &atom_maps, self.num_atoms(), collector, options)
            }
        }
    }

    /// Existence test; perceives rings itself.
    pub fn matches<A: QueryableAtom, B: QueryableBond>(&self, target: &Mol<A, B>) -> bool {
        let rings = RingSet::sssr(target);
        let mut found = NoMapping::default();
        self.search(target, &rings, &mut found)
    }

    pub fn find_first<A: QueryableAtom, B: QueryableBond>(
        &self,
        target: &Mol<A, B>,
    ) -> Option<Mapping> {
        let rings = RingSet::sssr(target);
        let mut single = SingleMapping::default();
        self.search(target, &rings, &mut single);
        single.mapping
    }

    /// Every unique mapping, in discovery order.
    pub fn find_all<A: QueryableAtom, B: QueryableBond>(&self, target: &Mol<A, B>) -> Vec<Mapping> {
        let rings = RingSet::sssr(target);
        let mut list = MappingList::default();
        self.search(target, &rings, &mut list);
        list.maps
    }

    /// Number of unique mappings.
    pub fn count<A: QueryableAtom, B: QueryableBond>(&self, target: &Mol<A, B>) -> usize {
        let rings = RingSet::sssr(target);
        let mut count = CountMapping::default();
        self.search(target, &rings, &mut count);
        count.count
    }
}

impl FromStr for Smarts {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

fn search_fragment<A, B, C>(
    fragment: &Fragment,
    ctx: MatchContext<'_, A, B>,
    collector: &mut C,
    options: SearchOptions,
) -> bool
where
    A: QueryableAtom,
    B: QueryableBond,
    C: MappingCollector + ?Sized,
{
    let query = &fragment.query;
    isomorphism_search(
        ctx.mol,
        query,
        |q, t| atom_matches(query.atom(q), ctx, t),
        |q, t| bond_matches(query.bond(q), ctx, t),
        collector,
        options,
    )
}

/// Compiles `text` found at `offset` inside the outermost pattern, `depth`
/// levels of `$(...)` down.
fn compile_at(text: &str, offset: usize, depth: usize) -> Result<Smarts, SmartsError> {
    let parsed = parser::parse(text, offset, depth)?;
    let source = parsed.mol;

    let (labels, count) = source.component_labels();
    let mut fragments: Vec<Fragment> = (0..count)
        .map(|_| Fragment {
            query: Mol::new(),
            atom_map: Vec::new(),
        })
        .collect();
    let mut local = vec![NodeIndex::end(); source.atom_count()];
    for atom in source.atoms() {
        let fragment = &mut fragments[labels[atom.index()]];
        local[atom.index()] = fragment.query.add_atom(source.atom(atom).clone());
        fragment.atom_map.push(atom.index());
    }
    for bond in source.bonds() {
        let Some((a, b)) = source.bond_endpoints(bond) else {
            continue;
        };
        fragments[labels[a.index()]].query.add_bond(
            local[a.index()],
            local[b.index()],
            source.bond(bond).clone(),
        );
    }

    let smarts = Smarts {
        fragments,
        recursive: parsed.recursive,
        atom_classes: parsed.atom_classes,
    };
    check_recursive_refs(&smarts, text, offset)?;
    Ok(smarts)
}

fn check_recursive_refs(smarts: &Smarts, text: &str, offset: usize) -> Result<(), SmartsError> {
    let mut refs = Vec::new();
    for fragment in &smarts.fragments {
        for atom in fragment.query.atoms() {
            fragment.query.atom(atom).recursive_refs(&mut refs);
        }
    }
    match refs.into_iter().find(|&i| i >= smarts.recursive.len()) {
        Some(i) => Err(SmartsError::semantics(
            format!("unresolved recursive SMARTS reference {i}"),
            offset,
            text.chars().count(),
        )),
        None => Ok(()),
    }
}

pub fn from_smarts(text: &str) -> Result<Smarts, SmartsError> {
    Smarts::compile(text)
}

pub fn has_smarts_match<A: QueryableAtom, B: QueryableBond>(
    target: &Mol<A, B>,
    query: &Smarts,
) -> bool {
    query.matches(target)
}

pub fn get_smarts_match<A: QueryableAtom, B: QueryableBond>(
    target: &Mol<A, B>,
    query: &Smarts,
) -> Option<Mapping> {
    query.find_first(target)
}

pub fn get_smarts_matches<A: QueryableAtom, B: QueryableBond>(
    target: &Mol<A, B>,
    query: &Smarts,
) -> Vec<Mapping> {
    query.find_all(target)
}
