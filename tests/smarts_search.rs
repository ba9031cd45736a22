use petgraph::graph::NodeIndex;
use serde::Deserialize;

use chemsift::smarts::matcher::{atom_matches, MatchContext};
use chemsift::smarts::AtomExpr;
use chemsift::{
    from_smiles, CountMapping, MappingList, RingSet, SearchOptions, Smarts, SmartsErrorKind,
};

fn n(i: usize) -> NodeIndex {
    NodeIndex::new(i)
}

// ---------------------------------------------------------------------------
// Approval table
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CountEntry {
    smarts: String,
    smiles: String,
    count: usize,
}

#[test]
fn approval_unique_match_counts() {
    let data: Vec<CountEntry> =
        serde_json::from_str(include_str!("approval_data/smarts_counts.json")).unwrap();
    let mut failures = Vec::new();
    for entry in &data {
        let query = Smarts::compile(&entry.smarts).unwrap();
        let mol = from_smiles(&entry.smiles).unwrap();
        let got = query.count(&mol);
        if got != entry.count {
            failures.push(format!(
                "{} in {}: expected {}, got {got}",
                entry.smarts, entry.smiles, entry.count
            ));
        }
        assert_eq!(query.matches(&mol), entry.count > 0, "{} in {}", entry.smarts, entry.smiles);
    }
    assert!(failures.is_empty(), "mismatches:\n{}", failures.join("\n"));
}

// ---------------------------------------------------------------------------
// Predicate evaluation
// ---------------------------------------------------------------------------

#[test]
fn benzene_atom_predicates() {
    let mol = from_smiles("c1ccccc1").unwrap();
    let rings = RingSet::sssr(&mol);
    let ctx = MatchContext::new(&mol, &rings, &[]);

    assert!(atom_matches(&AtomExpr::Aromatic, ctx, n(0)));
    assert!(!atom_matches(&AtomExpr::Aliphatic, ctx, n(0)));
    assert!(atom_matches(&AtomExpr::RingSize(6), ctx, n(0)));
    assert!(!atom_matches(&AtomExpr::RingMembership(2), ctx, n(0)));
    assert!(atom_matches(&AtomExpr::RingMembership(1), ctx, n(0)));
}

#[test]
fn false_left_operand_skips_right() {
    let mol = from_smiles("CC").unwrap();
    let rings = RingSet::sssr(&mol);
    // No recursive table: evaluating the reference would panic.
    let ctx = MatchContext::new(&mol, &rings, &[]);

    let and = AtomExpr::and_hi(AtomExpr::False, AtomExpr::Recursive(0));
    assert!(!atom_matches(&and, ctx, n(0)));
    let or = AtomExpr::or(AtomExpr::True, AtomExpr::Recursive(0));
    assert!(atom_matches(&or, ctx, n(0)));
}

// ---------------------------------------------------------------------------
// Recursive queries
// ---------------------------------------------------------------------------

#[test]
fn recursive_aromatic_existence() {
    let query = Smarts::compile("[$(a)]").unwrap();
    assert!(query.matches(&from_smiles("c1ccccc1").unwrap()));
    assert!(!query.matches(&from_smiles("C1CCCCC1").unwrap()));
}

#[test]
fn recursive_anchor_is_first_atom() {
    // Carbon attached to a hydroxyl, not the oxygen itself.
    let query = Smarts::compile("[$(CO);!$(C=O)]").unwrap();
    let ethanol = from_smiles("CCO").unwrap();
    assert_eq!(query.find_all(&ethanol), vec![vec![n(1)]]);
    assert_eq!(query.count(&from_smiles("CC(=O)O").unwrap()), 0);
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

#[test]
fn two_fragments_take_distinct_atoms() {
    let query = Smarts::compile("[C:1].[O:2]").unwrap();
    let mol = from_smiles("C-O").unwrap();
    let maps = query.find_all(&mol);
    assert_eq!(maps, vec![vec![n(0), n(1)]]);
    assert!(maps.iter().all(|m| m[0] != m[1]));
    assert_eq!(query.atom_class(0), 1);
    assert_eq!(query.atom_class(1), 2);

    // Two carbon fragments cannot share methanol's only carbon.
    assert!(!Smarts::compile("C.C").unwrap().matches(&mol));
}

#[test]
fn unique_option_controls_permutations() {
    let query = Smarts::compile("C.C").unwrap();
    let mol = from_smiles("C.C").unwrap();
    let rings = RingSet::sssr(&mol);

    let mut unique = CountMapping::default();
    query.search(&mol, &rings, &mut unique);
    assert_eq!(unique.count, 1);

    let mut all = MappingList::default();
    query.search_with(&mol, &rings, &mut all, SearchOptions::default());
    assert_eq!(all.maps.len(), 2);
}

#[test]
fn mappings_use_source_atom_order() {
    let query = Smarts::compile("O1.N.C1").unwrap();
    let mol = from_smiles("NCO").unwrap();
    assert_eq!(query.find_first(&mol), Some(vec![n(2), n(0), n(1)]));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn errors_carry_kind_and_span() {
    let err = Smarts::compile("C[CH3").unwrap_err();
    assert_eq!(err.kind, SmartsErrorKind::Syntax);
    assert_eq!(err.pos, 1);
    let rendered = err.render("C[CH3");
    assert_eq!(rendered.lines().nth(1), Some("C[CH3"));
    assert!(rendered.lines().nth(2).unwrap().starts_with(" ^"));

    let err = Smarts::compile("C11").unwrap_err();
    assert_eq!(err.kind, SmartsErrorKind::Semantics);

    assert!("".parse::<Smarts>().is_err());
    assert!(!Smarts::default().matches(&from_smiles("C").unwrap()));
}
