//! Minimal SMILES reader for building target molecules.
//!
//! Supports the organic subset, bracket atoms, aromatic atoms, branches, ring
//! closures and dot-separated components. Stereo marks are accepted and
//! dropped.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder};
use crate::element::{self, AROMATIC_SYMBOLS, BARE_AROMATIC_SYMBOLS};
use crate::mol::Mol;

/// Errors produced when parsing a SMILES string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    /// The input string was empty or contained only whitespace.
    EmptyInput,
    /// An unexpected character was encountered at the given position.
    UnexpectedChar { pos: usize, ch: char },
    /// Input ended in the middle of a token.
    UnexpectedEnd,
    /// An unrecognized element symbol was found.
    InvalidElement { pos: usize, text: String },
    /// A bracket atom `[` was opened but never closed with `]`.
    UnclosedBracket { pos: usize },
    /// A ring-opening digit was never matched by a ring-closing digit.
    UnclosedRing { digit: u16 },
    /// A parenthesis was opened without a matching close, or vice versa.
    UnmatchedParen { pos: usize },
    /// A ring closure or bond symbol appeared where no atom precedes it.
    DanglingBond { pos: usize },
    /// A ring closure would duplicate an existing bond or bond an atom to itself.
    InvalidRingBond { digit: u16, pos: usize },
}

impl fmt::Display for SmilesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty SMILES string"),
            Self::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character '{ch}' at position {pos}")
            }
            Self::UnexpectedEnd => write!(f, "unexpected end of SMILES"),
            Self::InvalidElement { pos, text } => {
                write!(f, "invalid element '{text}' at position {pos}")
            }
            Self::UnclosedBracket { pos } => {
                write!(f, "unclosed bracket atom starting at position {pos}")
            }
            Self::UnclosedRing { digit } => write!(f, "unclosed ring {digit}"),
            Self::UnmatchedParen { pos } => write!(f, "unmatched parenthesis at position {pos}"),
            Self::DanglingBond { pos } => {
                write!(f, "bond without preceding atom at position {pos}")
            }
            Self::InvalidRingBond { digit, pos } => {
                write!(f, "invalid ring bond {digit} at position {pos}")
            }
        }
    }
}

impl std::error::Error for SmilesError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BondSymbol {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
    Directional,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    mol: Mol<Atom, Bond>,
    /// Atoms written without brackets get implicit hydrogens afterwards.
    implicit_h: Vec<bool>,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            mol: Mol::new(),
            implicit_h: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        s.parse().ok()
    }

    fn parse(mut self) -> Result<Mol<Atom, Bond>, SmilesError> {
        let mut current: Option<NodeIndex> = None;
        let mut branches: Vec<(NodeIndex, usize)> = Vec::new();
        let mut pending: Option<(BondSymbol, usize)> = None;
        let mut rings: HashMap<u16, (NodeIndex, Option<BondSymbol>)> = HashMap::new();

        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let Some(cur) = current else {
                        return Err(SmilesError::UnmatchedParen { pos: self.pos });
                    };
                    branches.push((cur, self.pos));
                    self.pos += 1;
                }
                ')' => {
                    let Some((prev, _)) = branches.pop() else {
                        return Err(SmilesError::UnmatchedParen { pos: self.pos });
                    };
                    current = Some(prev);
                    self.pos += 1;
                }
                '.' => {
                    if let Some((_, pos)) = pending {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    current = None;
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if current.is_none() || pending.is_some() {
                        return Err(SmilesError::DanglingBond { pos: self.pos });
                    }
                    let symbol = match ch {
                        '-' => BondSymbol::Single,
                        '=' => BondSymbol::Double,
                        '#' => BondSymbol::Triple,
                        '$' => BondSymbol::Quadruple,
                        ':' => BondSymbol::Aromatic,
                        _ => BondSymbol::Directional,
                    };
                    pending = Some((symbol, self.pos));
                    self.pos += 1;
                }
                '0'..='9' | '%' => {
                    let start = self.pos;
                    let digit = self.parse_ring_digit()?;
                    let Some(cur) = current else {
                        return Err(SmilesError::DanglingBond { pos: start });
                    };
                    let symbol = pending.take().map(|(s, _)| s);
                    match rings.remove(&digit) {
                        Some((other, opening)) => {
                            if other == cur || self.mol.bond_between(cur, other).is_some() {
                                return Err(SmilesError::InvalidRingBond { digit, pos: start });
                            }
                            self.connect(other, cur, symbol.or(opening));
                        }
                        None => {
                            rings.insert(digit, (cur, symbol));
                        }
                    }
                }
                _ => {
                    let idx = if ch == '[' {
                        self.parse_bracket_atom()?
                    } else {
                        self.parse_bare_atom()?
                    };
                    if let Some(prev) = current {
                        self.connect(prev, idx, pending.take().map(|(s, _)| s));
                    }
                    current = Some(idx);
                }
            }
        }

        if let Some((_, pos)) = branches.pop() {
            return Err(SmilesError::UnmatchedParen { pos });
        }
        if let Some((_, pos)) = pending {
            return Err(SmilesError::DanglingBond { pos });
        }
        if let Some(&digit) = rings.keys().min() {
            return Err(SmilesError::UnclosedRing { digit });
        }

        self.assign_implicit_hydrogens();
        Ok(self.mol)
    }

    fn parse_ring_digit(&mut self) -> Result<u16, SmilesError> {
        let start = self.pos;
        if self.peek() == Some('%') {
            self.pos += 1;
            let d1 = self.peek().and_then(|c| c.to_digit(10));
            let d2 = self.chars.get(self.pos + 1).and_then(|c| c.to_digit(10));
            match (d1, d2) {
                (Some(a), Some(b)) => {
                    self.pos += 2;
                    Ok((a * 10 + b) as u16)
                }
                _ => Err(SmilesError::UnexpectedChar { pos: start, ch: '%' }),
            }
        } else {
            let d = self.peek().and_then(|c| c.to_digit(10)).ok_or(SmilesError::UnexpectedEnd)?;
            self.pos += 1;
            Ok(d as u16)
        }
    }

    fn connect(&mut self, a: NodeIndex, b: NodeIndex, symbol: Option<BondSymbol>) {
        let bond = match symbol {
            None => {
                if self.mol.atom(a).is_aromatic && self.mol.atom(b).is_aromatic {
                    Bond::aromatic()
                } else {
                    Bond::new(BondOrder::Single)
                }
            }
            Some(BondSymbol::Single) | Some(BondSymbol::Directional) => {
                Bond::new(BondOrder::Single)
            }
            Some(BondSymbol::Double) => Bond::new(BondOrder::Double),
            Some(BondSymbol::Triple) => Bond::new(BondOrder::Triple),
            Some(BondSymbol::Quadruple) => Bond::new(BondOrder::Quadruple),
            Some(BondSymbol::Aromatic) => Bond::aromatic(),
        };
        self.mol.add_bond(a, b, bond);
    }

    fn push_atom(&mut self, atom: Atom, implicit_h: bool) -> NodeIndex {
        self.implicit_h.push(implicit_h);
        self.mol.add_atom(atom)
    }

    fn parse_bare_atom(&mut self) -> Result<NodeIndex, SmilesError> {
        let start = self.pos;
        let ch = self.chars[start];

        if ch == '*' {
            self.pos += 1;
            return Ok(self.push_atom(Atom::default(), false));
        }

        if ch.is_ascii_lowercase() {
            for &(sym, num) in &BARE_AROMATIC_SYMBOLS {
                if ch.to_string() == sym {
                    self.pos += 1;
                    return Ok(self.push_atom(Atom::aromatic(num), true));
                }
            }
            return Err(SmilesError::UnexpectedChar { pos: start, ch });
        }

        if ch.is_ascii_uppercase() {
            // Only Cl and Br take two letters outside brackets.
            let two: String = self.chars[start..(start + 2).min(self.chars.len())]
                .iter()
                .collect();
            let (symbol, len) = if two == "Cl" || two == "Br" {
                (two, 2)
            } else {
                (ch.to_string(), 1)
            };
            let num = element::atomic_num_from_symbol(&symbol)
                .filter(|&n| element::is_organic_subset(n))
                .ok_or(SmilesError::InvalidElement { pos: start, text: symbol })?;
            self.pos += len;
            return Ok(self.push_atom(Atom::new(num), true));
        }

        Err(SmilesError::UnexpectedChar { pos: start, ch })
    }

    fn parse_bracket_atom(&mut self) -> Result<NodeIndex, SmilesError> {
        let open = self.pos;
        self.pos += 1;

        let mut atom = Atom::default();
        if let Some(iso) = self.parse_number() {
            atom.isotope = iso as u16;
        }

        let sym_start = self.pos;
        let ch = self.peek().ok_or(SmilesError::UnclosedBracket { pos: open })?;
        if ch == '*' {
            self.pos += 1;
        } else if ch.is_ascii_lowercase() {
            let rest: String = self.chars[self.pos..].iter().take(2).collect();
            let found = AROMATIC_SYMBOLS
                .iter()
                .chain(BARE_AROMATIC_SYMBOLS.iter())
                .find(|(sym, _)| rest.starts_with(sym));
            let &(sym, num) = found.ok_or(SmilesError::InvalidElement {
                pos: sym_start,
                text: ch.to_string(),
            })?;
            self.pos += sym.len();
            atom.atomic_num = num;
            atom.is_aromatic = true;
        } else if ch.is_ascii_uppercase() {
            let mut symbol = ch.to_string();
            self.pos += 1;
            if let Some(next) = self.peek().filter(|c| c.is_ascii_lowercase()) {
                symbol.push(next);
                if element::atomic_num_from_symbol(&symbol).is_some() {
                    self.pos += 1;
                } else {
                    symbol.pop();
                }
            }
            atom.atomic_num = element::atomic_num_from_symbol(&symbol)
                .ok_or(SmilesError::InvalidElement { pos: sym_start, text: symbol })?;
        } else {
            return Err(SmilesError::UnexpectedChar { pos: self.pos, ch });
        }

        while self.peek() == Some('@') {
            self.pos += 1;
        }

        if self.peek() == Some('H') {
            self.pos += 1;
            atom.hydrogen_count = self.parse_number().unwrap_or(1) as u8;
        }

        match self.peek() {
            Some(sign @ ('+' | '-')) => {
                self.pos += 1;
                let mut magnitude = 1i8;
                if let Some(n) = self.parse_number() {
                    magnitude = n as i8;
                } else {
                    while self.peek() == Some(sign) {
                        self.pos += 1;
                        magnitude += 1;
                    }
                }
                atom.formal_charge = if sign == '+' { magnitude } else { -magnitude };
            }
            _ => {}
        }

        if self.peek() == Some(':') {
            self.pos += 1;
            self.parse_number();
        }

        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(self.push_atom(atom, false))
            }
            Some(c) => Err(SmilesError::UnexpectedChar { pos: self.pos, ch: c }),
            None => Err(SmilesError::UnclosedBracket { pos: open }),
        }
    }

    fn assign_implicit_hydrogens(&mut self) {
        let atoms: Vec<NodeIndex> = self.mol.atoms().collect();
        for idx in atoms {
            if !self.implicit_h[idx.index()] {
                continue;
            }
            let mut valence: u8 = self
                .mol
                .bonds_of(idx)
                .map(|e| self.mol.bond(e).order.as_u8())
                .sum();
            if self.mol.atom(idx).is_aromatic {
                valence += 1;
            }
            let defaults = element::default_valences(self.mol.atom(idx).atomic_num);
            let h = defaults
                .iter()
                .find(|&&v| v >= valence)
                .map(|&v| v - valence)
                .unwrap_or(0);
            self.mol.atom_mut(idx).hydrogen_count = h;
        }
    }
}

pub fn from_smiles(s: &str) -> Result<Mol<Atom, Bond>, SmilesError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SmilesError::EmptyInput);
    }
    Parser::new(trimmed).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn methane() {
        let mol = from_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).hydrogen_count, 4);
    }

    #[test]
    fn ethanol_hydrogens() {
        let mol = from_smiles("CCO").unwrap();
        let h: Vec<u8> = mol.atoms().map(|i| mol.atom(i).hydrogen_count).collect();
        assert_eq!(h, vec![3, 2, 1]);
    }

    #[test]
    fn double_and_triple_bonds() {
        let mol = from_smiles("C=CC#N").unwrap();
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(e).order, BondOrder::Double);
        let e = mol.bond_between(n(2), n(3)).unwrap();
        assert_eq!(mol.bond(e).order, BondOrder::Triple);
        assert_eq!(mol.atom(n(3)).hydrogen_count, 0);
    }

    #[test]
    fn benzene_is_aromatic() {
        let mol = from_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        for idx in mol.atoms() {
            assert!(mol.atom(idx).is_aromatic);
            assert_eq!(mol.atom(idx).hydrogen_count, 1);
        }
        for e in mol.bonds() {
            assert!(mol.bond(e).is_aromatic);
        }
    }

    #[test]
    fn toluene_ipso_carbon_has_no_hydrogen() {
        let mol = from_smiles("Cc1ccccc1").unwrap();
        assert_eq!(mol.atom(n(0)).hydrogen_count, 3);
        assert_eq!(mol.atom(n(1)).hydrogen_count, 0);
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert!(!mol.bond(e).is_aromatic);
    }

    #[test]
    fn pyridine_nitrogen() {
        let mol = from_smiles("c1ccncc1").unwrap();
        assert_eq!(mol.atom(n(3)).atomic_num, 7);
        assert_eq!(mol.atom(n(3)).hydrogen_count, 0);
    }

    #[test]
    fn bracket_atom_fields() {
        let mol = from_smiles("[13CH3+]").unwrap();
        let atom = mol.atom(n(0));
        assert_eq!(atom.isotope, 13);
        assert_eq!(atom.atomic_num, 6);
        assert_eq!(atom.hydrogen_count, 3);
        assert_eq!(atom.formal_charge, 1);
    }

    #[test]
    fn bracket_charges() {
        let mol = from_smiles("[O--].[Fe+3].[NH4+]").unwrap();
        assert_eq!(mol.atom(n(0)).formal_charge, -2);
        assert_eq!(mol.atom(n(1)).formal_charge, 3);
        assert_eq!(mol.atom(n(2)).hydrogen_count, 4);
    }

    #[test]
    fn pyrrole_nh() {
        let mol = from_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(mol.atom(n(3)).hydrogen_count, 1);
        assert!(mol.atom(n(3)).is_aromatic);
    }

    #[test]
    fn branches_and_components() {
        let mol = from_smiles("CC(C)(C)O.[Na+]").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.degree(n(1)), 4);
        let (_, count) = mol.component_labels();
        assert_eq!(count, 2);
    }

    #[test]
    fn percent_ring_closure() {
        let mol = from_smiles("C%12CC%12").unwrap();
        assert_eq!(mol.bond_count(), 3);
    }

    #[test]
    fn stereo_marks_ignored() {
        let mol = from_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bond_count(), 3);
        let mol = from_smiles("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atom(n(1)).hydrogen_count, 1);
    }

    #[test]
    fn errors() {
        assert_eq!(from_smiles("  "), Err(SmilesError::EmptyInput));
        assert_eq!(from_smiles("C1CC"), Err(SmilesError::UnclosedRing { digit: 1 }));
        assert!(matches!(from_smiles("C(C"), Err(SmilesError::UnmatchedParen { .. })));
        assert!(matches!(
            from_smiles("[CH4"),
            Err(SmilesError::UnexpectedChar { .. }) | Err(SmilesError::UnclosedBracket { .. })
        ));
        assert!(matches!(from_smiles("Xc"), Err(SmilesError::InvalidElement { .. })));
        assert!(matches!(from_smiles("C11"), Err(SmilesError::InvalidRingBond { .. })));
    }
}
