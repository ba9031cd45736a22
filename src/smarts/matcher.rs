//! Evaluation of SMARTS expression trees against target atoms and bonds.
//!
//! Every function here takes its full context as arguments and keeps no
//! state between calls, so the recursive resolver can re-enter the
//! isomorphism search from inside an atom matcher.

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::bond::BondOrder;
use crate::isomorphism::anchored_search;
use crate::mol::Mol;
use crate::rings::RingSet;
use crate::traits::{QueryableAtom, QueryableBond};

use super::query::{AtomExpr, BondExpr};
use super::Smarts;

/// Target graph, its rings, and the recursive table of the query being
/// evaluated.
pub struct MatchContext<'a, A, B> {
    pub mol: &'a Mol<A, B>,
    pub rings: &'a RingSet,
    pub recursive: &'a [Smarts],
}

impl<A, B> Clone for MatchContext<'_, A, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, B> Copy for MatchContext<'_, A, B> {}

impl<'a, A, B> MatchContext<'a, A, B> {
    pub fn new(mol: &'a Mol<A, B>, rings: &'a RingSet, recursive: &'a [Smarts]) -> Self {
        Self {
            mol,
            rings,
            recursive,
        }
    }
}

pub fn degree<A, B>(mol: &Mol<A, B>, atom: NodeIndex) -> u8 {
    mol.degree(atom) as u8
}

/// Sum of bond orders plus implicit hydrogens. Aromatic bonds count 1 and an
/// aromatic atom adds 1.
pub fn valence<A: QueryableAtom, B: QueryableBond>(mol: &Mol<A, B>, atom: NodeIndex) -> u8 {
    let a = mol.atom(atom);
    let bonds: u8 = mol
        .bonds_of(atom)
        .map(|e| {
            let bond = mol.bond(e);
            if bond.is_aromatic() {
                1
            } else {
                bond.bond_order().as_u8()
            }
        })
        .sum();
    bonds + u8::from(a.is_aromatic()) + a.hydrogen_count()
}

pub fn connectivity<A: QueryableAtom, B>(mol: &Mol<A, B>, atom: NodeIndex) -> u8 {
    degree(mol, atom) + mol.atom(atom).hydrogen_count()
}

pub fn total_hydrogens<A: QueryableAtom, B>(mol: &Mol<A, B>, atom: NodeIndex) -> u8 {
    let explicit = mol
        .neighbors(atom)
        .filter(|&nb| mol.atom(nb).atomic_num() == 1)
        .count() as u8;
    explicit + mol.atom(atom).hydrogen_count()
}

/// Evaluates `expr` against target atom `atom`. Conjunctions and disjunctions
/// short-circuit left to right.
pub fn atom_matches<A: QueryableAtom, B: QueryableBond>(
    expr: &AtomExpr,
    ctx: MatchContext<'_, A, B>,
    atom: NodeIndex,
) -> bool {
    let mol = ctx.mol;
    let a = mol.atom(atom);
    match expr {
        AtomExpr::True => true,
        AtomExpr::False => false,
        AtomExpr::Aromatic => a.is_aromatic(),
        AtomExpr::Aliphatic => !a.is_aromatic(),
        AtomExpr::Cyclic => ctx.rings.is_atom_in_ring(atom),
        AtomExpr::Acyclic => !ctx.rings.is_atom_in_ring(atom),
        AtomExpr::Isotope(mass) => a.isotope() == *mass,
        AtomExpr::AtomicNumber(n) => a.atomic_num() == *n,
        AtomExpr::AromaticElement(n) => a.atomic_num() == *n && a.is_aromatic(),
        AtomExpr::AliphaticElement(n) => a.atomic_num() == *n && !a.is_aromatic(),
        AtomExpr::Degree(n) => degree(mol, atom) == *n,
        AtomExpr::Valence(n) => valence(mol, atom) == *n,
        AtomExpr::Connectivity(n) => connectivity(mol, atom) == *n,
        AtomExpr::TotalH(n) => total_hydrogens(mol, atom) == *n,
        AtomExpr::ImplicitH(None) => a.hydrogen_count() >= 1,
        AtomExpr::ImplicitH(Some(n)) => a.hydrogen_count() == *n,
        AtomExpr::RingMembership(n) => ctx.rings.num_rings(atom) == *n as usize,
        AtomExpr::RingSize(n) => ctx.rings.is_atom_in_ring_size(atom, *n as usize),
        AtomExpr::RingConnectivity(None) => ctx.rings.num_ring_bonds(atom) >= 1,
        AtomExpr::RingConnectivity(Some(n)) => ctx.rings.num_ring_bonds(atom) == *n as usize,
        AtomExpr::Charge(c) => a.formal_charge() == *c,
        AtomExpr::Chirality { .. } => true,
        AtomExpr::AtomClass(_) => true,
        AtomExpr::Recursive(index) => recursive_matches(*index, ctx, atom),
        AtomExpr::Not(arg) => !atom_matches(arg, ctx, atom),
        AtomExpr::AndHi(l, r) | AtomExpr::AndLo(l, r) | AtomExpr::And(l, r) => {
            atom_matches(l, ctx, atom) && atom_matches(r, ctx, atom)
        }
        AtomExpr::Or(l, r) => atom_matches(l, ctx, atom) || atom_matches(r, ctx, atom),
    }
}

pub fn bond_matches<A, B: QueryableBond>(
    expr: &BondExpr,
    ctx: MatchContext<'_, A, B>,
    bond: EdgeIndex,
) -> bool {
    let b = ctx.mol.bond(bond);
    match expr {
        BondExpr::True => true,
        BondExpr::False => false,
        BondExpr::Single => b.bond_order() == BondOrder::Single && !b.is_aromatic(),
        BondExpr::Double => b.bond_order() == BondOrder::Double && !b.is_aromatic(),
        BondExpr::Triple => b.bond_order() == BondOrder::Triple,
        BondExpr::Quadruple => b.bond_order() == BondOrder::Quadruple,
        BondExpr::Aromatic => b.is_aromatic(),
        BondExpr::Up | BondExpr::Down => true,
        BondExpr::Ring => ctx.rings.is_bond_in_ring(bond),
        BondExpr::Not(arg) => !bond_matches(arg, ctx, bond),
        BondExpr::AndHi(l, r) | BondExpr::AndLo(l, r) | BondExpr::And(l, r) => {
            bond_matches(l, ctx, bond) && bond_matches(r, ctx, bond)
        }
        BondExpr::Or(l, r) => bond_matches(l, ctx, bond) || bond_matches(r, ctx, bond),
    }
}

/// Does recursive query `index` of the current table map with its first
/// atom on `atom`?
///
/// The sub-query's own recursive table becomes the context for its
/// expressions. Panics if `index` is outside the table; compiled queries
/// never hold such references.
pub fn recursive_matches<A: QueryableAtom, B: QueryableBond>(
    index: usize,
    ctx: MatchContext<'_, A, B>,
    atom: NodeIndex,
) -> bool {
    let sub = &ctx.recursive[index];
    let Some(fragment) = sub.fragments.first() else {
        return false;
    };
    let query = &fragment.query;
    let sub_ctx = MatchContext::new(ctx.mol, ctx.rings, &sub.recursive);
    anchored_search(
        ctx.mol,
        atom,
        query,
        |q, t| atom_matches(query.atom(q), sub_ctx, t),
        |q, t| bond_matches(query.bond(q), sub_ctx, t),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;
    use crate::{Atom, Bond};

    fn target(smiles: &str) -> (Mol<Atom, Bond>, RingSet) {
        let mol = from_smiles(smiles).unwrap();
        let rings = RingSet::sssr(&mol);
        (mol, rings)
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn benzene_atom_is_aromatic_not_aliphatic() {
        let (mol, rings) = target("c1ccccc1");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(&AtomExpr::Aromatic, ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::Aliphatic, ctx, n(0)));
        assert!(atom_matches(&AtomExpr::AromaticElement(6), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::AliphaticElement(6), ctx, n(0)));
    }

    #[test]
    fn six_ring_atom_ring_predicates() {
        let (mol, rings) = target("C1CCCCC1");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(&AtomExpr::RingSize(6), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::RingSize(5), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::RingMembership(1), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::RingMembership(2), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Cyclic, ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::Acyclic, ctx, n(0)));
        assert!(atom_matches(&AtomExpr::RingConnectivity(Some(2)), ctx, n(0)));
    }

    #[test]
    fn unspecified_counts_mean_at_least_one() {
        let (mol, rings) = target("CC1CC1");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(&AtomExpr::ImplicitH(None), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::ImplicitH(Some(1)), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::ImplicitH(Some(3)), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::RingConnectivity(None), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::RingConnectivity(None), ctx, n(1)));
        assert!(!atom_matches(&AtomExpr::RingConnectivity(Some(3)), ctx, n(1)));
    }

    #[test]
    fn derived_counts() {
        let (mol, rings) = target("C=CO[H]");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        // C=C: degree 1, two implicit H
        assert!(atom_matches(&AtomExpr::Degree(1), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Valence(4), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Connectivity(3), ctx, n(0)));
        // O with one explicit hydrogen neighbor and no implicit ones
        assert!(atom_matches(&AtomExpr::TotalH(1), ctx, n(2)));
        assert!(atom_matches(&AtomExpr::ImplicitH(Some(0)), ctx, n(2)));
        assert!(atom_matches(&AtomExpr::Degree(2), ctx, n(2)));
    }

    #[test]
    fn aromatic_valence() {
        let (mol, rings) = target("c1ccncc1");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(&AtomExpr::Valence(4), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Valence(3), ctx, n(3)));
    }

    #[test]
    fn charge_isotope_and_placeholders() {
        let (mol, rings) = target("[13CH3-]");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(&AtomExpr::Charge(-1), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Isotope(13), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::Isotope(12), ctx, n(0)));
        assert!(atom_matches(&AtomExpr::Chirality { clockwise: true }, ctx, n(0)));
        assert!(atom_matches(&AtomExpr::AtomClass(4), ctx, n(0)));
    }

    #[test]
    fn and_short_circuits_on_false_left() {
        let (mol, rings) = target("C");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        // Recursive(9) would index past the empty table if evaluated.
        let poison = || AtomExpr::Recursive(9);
        assert!(!atom_matches(&AtomExpr::and_hi(AtomExpr::False, poison()), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::and_lo(AtomExpr::False, poison()), ctx, n(0)));
        assert!(!atom_matches(&AtomExpr::and(AtomExpr::False, poison()), ctx, n(0)));
    }

    #[test]
    fn or_short_circuits_on_true_left() {
        let (mol, rings) = target("C");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        assert!(atom_matches(
            &AtomExpr::or(AtomExpr::True, AtomExpr::Recursive(9)),
            ctx,
            n(0)
        ));
    }

    #[test]
    #[should_panic]
    fn unresolved_recursive_reference_panics_when_evaluated() {
        let (mol, rings) = target("C");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        atom_matches(&AtomExpr::Recursive(9), ctx, n(0));
    }

    #[test]
    fn bond_predicates() {
        let (mol, rings) = target("c1ccccc1C=C");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        let ring_bond = mol.bond_between(n(0), n(1)).unwrap();
        let exo = mol.bond_between(n(5), n(6)).unwrap();
        let double = mol.bond_between(n(6), n(7)).unwrap();

        assert!(bond_matches(&BondExpr::Aromatic, ctx, ring_bond));
        assert!(!bond_matches(&BondExpr::Single, ctx, ring_bond));
        assert!(bond_matches(&BondExpr::Ring, ctx, ring_bond));
        assert!(bond_matches(&BondExpr::implicit(), ctx, ring_bond));

        assert!(bond_matches(&BondExpr::Single, ctx, exo));
        assert!(!bond_matches(&BondExpr::Ring, ctx, exo));
        assert!(bond_matches(&BondExpr::implicit(), ctx, exo));

        assert!(bond_matches(&BondExpr::Double, ctx, double));
        assert!(!bond_matches(&BondExpr::implicit(), ctx, double));
        assert!(bond_matches(&BondExpr::not(BondExpr::Single), ctx, double));
        assert!(bond_matches(&BondExpr::Up, ctx, double));
    }

    #[test]
    fn bond_short_circuit() {
        let (mol, rings) = target("CC");
        let ctx = MatchContext::new(&mol, &rings, &[]);
        let bond = mol.bond_between(n(0), n(1)).unwrap();
        assert!(!bond_matches(&BondExpr::and_lo(BondExpr::False, BondExpr::True), ctx, bond));
        assert!(bond_matches(&BondExpr::or(BondExpr::True, BondExpr::False), ctx, bond));
    }
}
