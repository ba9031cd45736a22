use crate::mol::Mol;

/// Expression tree for one SMARTS atom.
///
/// Leaves test a single atom property; combinators own their operands, so
/// cloning a tree is a deep copy and dropping it frees every node once.
/// `AndHi`, `AndLo` and `And` evaluate identically and only record which
/// operator produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomExpr {
    /// `*`
    True,
    False,
    /// `a`
    Aromatic,
    /// `A`
    Aliphatic,
    /// `R` with no count, or bare `r`.
    Cyclic,
    /// `R0`
    Acyclic,
    /// Leading mass number, e.g. the `13` in `[13C]`.
    Isotope(u16),
    /// `#n`, either aromaticity.
    AtomicNumber(u8),
    /// Lowercase element symbol.
    AromaticElement(u8),
    /// Uppercase element symbol.
    AliphaticElement(u8),
    /// `Dn`: explicit connections.
    Degree(u8),
    /// `vn`: total bond order including implicit hydrogens.
    Valence(u8),
    /// `Xn`: total connections including implicit hydrogens.
    Connectivity(u8),
    /// `Hn`: implicit plus explicit hydrogens.
    TotalH(u8),
    /// `hn`; `None` (bare `h`) means at least one.
    ImplicitH(Option<u8>),
    /// `Rn`: number of SSSR rings containing the atom.
    RingMembership(u8),
    /// `rn`: member of some SSSR ring of size n.
    RingSize(u8),
    /// `xn`; `None` (bare `x`) means at least one ring bond.
    RingConnectivity(Option<u8>),
    Charge(i8),
    /// `@` or `@@`. Always true: stereo is not matched.
    Chirality { clockwise: bool },
    /// `:n`. Always true: classes label atoms, they do not constrain them.
    AtomClass(u16),
    /// `$(...)`: index into the owning query's recursive table.
    Recursive(usize),
    Not(Box<AtomExpr>),
    /// Implicit or `&` conjunction.
    AndHi(Box<AtomExpr>, Box<AtomExpr>),
    /// `;` conjunction.
    AndLo(Box<AtomExpr>, Box<AtomExpr>),
    /// Conjunction added while building the tree rather than written.
    And(Box<AtomExpr>, Box<AtomExpr>),
    Or(Box<AtomExpr>, Box<AtomExpr>),
}

/// Expression tree for one SMARTS bond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondExpr {
    /// `~`
    True,
    False,
    /// `-`
    Single,
    /// `=`
    Double,
    /// `#`
    Triple,
    /// `$`
    Quadruple,
    /// `:`
    Aromatic,
    /// `/`. Always true.
    Up,
    /// `\`. Always true.
    Down,
    /// `@`
    Ring,
    Not(Box<BondExpr>),
    AndHi(Box<BondExpr>, Box<BondExpr>),
    AndLo(Box<BondExpr>, Box<BondExpr>),
    And(Box<BondExpr>, Box<BondExpr>),
    Or(Box<BondExpr>, Box<BondExpr>),
}

impl AtomExpr {
    pub fn not(expr: AtomExpr) -> Self {
        Self::Not(Box::new(expr))
    }

    pub fn and_hi(left: AtomExpr, right: AtomExpr) -> Self {
        Self::AndHi(Box::new(left), Box::new(right))
    }

    pub fn and_lo(left: AtomExpr, right: AtomExpr) -> Self {
        Self::AndLo(Box::new(left), Box::new(right))
    }

    pub fn and(left: AtomExpr, right: AtomExpr) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: AtomExpr, right: AtomExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// Returns true if `pred` holds for this node or any node below it.
    pub fn any(&self, pred: &dyn Fn(&AtomExpr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Self::Not(arg) => arg.any(pred),
            Self::AndHi(l, r) | Self::AndLo(l, r) | Self::And(l, r) | Self::Or(l, r) => {
                l.any(pred) || r.any(pred)
            }
            _ => false,
        }
    }

    pub(crate) fn uses_rings(&self) -> bool {
        self.any(&|e| {
            matches!(
                e,
                Self::Cyclic
                    | Self::Acyclic
                    | Self::RingMembership(_)
                    | Self::RingSize(_)
                    | Self::RingConnectivity(_)
            )
        })
    }

    pub(crate) fn tests_hydrogen_element(&self) -> bool {
        self.any(&|e| {
            matches!(
                e,
                Self::AtomicNumber(1) | Self::AliphaticElement(1) | Self::AromaticElement(1)
            )
        })
    }

    /// First `:n` class found in the tree.
    pub(crate) fn atom_class(&self) -> Option<u16> {
        match self {
            Self::AtomClass(n) => Some(*n),
            Self::Not(arg) => arg.atom_class(),
            Self::AndHi(l, r) | Self::AndLo(l, r) | Self::And(l, r) | Self::Or(l, r) => {
                l.atom_class().or_else(|| r.atom_class())
            }
            _ => None,
        }
    }

    pub(crate) fn recursive_refs(&self, out: &mut Vec<usize>) {
        match self {
            Self::Recursive(i) => out.push(*i),
            Self::Not(arg) => arg.recursive_refs(out),
            Self::AndHi(l, r) | Self::AndLo(l, r) | Self::And(l, r) | Self::Or(l, r) => {
                l.recursive_refs(out);
                r.recursive_refs(out);
            }
            _ => {}
        }
    }
}

impl BondExpr {
    pub fn not(expr: BondExpr) -> Self {
        Self::Not(Box::new(expr))
    }

    pub fn and_hi(left: BondExpr, right: BondExpr) -> Self {
        Self::AndHi(Box::new(left), Box::new(right))
    }

    pub fn and_lo(left: BondExpr, right: BondExpr) -> Self {
        Self::AndLo(Box::new(left), Box::new(right))
    }

    pub fn or(left: BondExpr, right: BondExpr) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// The bond implied when SMARTS omits one: single or aromatic.
    pub fn implicit() -> Self {
        Self::or(Self::Single, Self::Aromatic)
    }

    pub(crate) fn uses_rings(&self) -> bool {
        match self {
            Self::Ring => true,
            Self::Not(arg) => arg.uses_rings(),
            Self::AndHi(l, r) | Self::AndLo(l, r) | Self::And(l, r) | Self::Or(l, r) => {
                l.uses_rings() || r.uses_rings()
            }
            _ => false,
        }
    }
}

/// One connected component of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub(crate) query: Mol<AtomExpr, BondExpr>,
    /// Source SMARTS atom index for each fragment-local atom.
    pub(crate) atom_map: Vec<usize>,
}

impl Fragment {
    /// Query graph whose atom and bond payloads are expression trees.
    pub fn query(&self) -> &Mol<AtomExpr, BondExpr> {
        &self.query
    }

    pub fn atom_map(&self) -> &[usize] {
        &self.atom_map
    }

    pub fn num_atoms(&self) -> usize {
        self.query.atom_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_deep() {
        let original = AtomExpr::and_hi(
            AtomExpr::AliphaticElement(6),
            AtomExpr::not(AtomExpr::Charge(1)),
        );
        let mut copy = original.clone();
        if let AtomExpr::AndHi(_, right) = &mut copy {
            **right = AtomExpr::Charge(-1);
        }
        assert_ne!(original, copy);
        assert_eq!(
            original,
            AtomExpr::and_hi(
                AtomExpr::AliphaticElement(6),
                AtomExpr::not(AtomExpr::Charge(1))
            )
        );
    }

    #[test]
    fn ring_usage_is_found_below_combinators() {
        let expr = AtomExpr::or(AtomExpr::Aromatic, AtomExpr::not(AtomExpr::RingSize(5)));
        assert!(expr.uses_rings());
        assert!(!AtomExpr::and_lo(AtomExpr::Aromatic, AtomExpr::Degree(2)).uses_rings());
        assert!(BondExpr::and_hi(BondExpr::Single, BondExpr::Ring).uses_rings());
        assert!(!BondExpr::implicit().uses_rings());
    }

    #[test]
    fn class_and_recursive_lookup() {
        let expr = AtomExpr::and_hi(
            AtomExpr::and_hi(AtomExpr::Recursive(0), AtomExpr::AtomClass(7)),
            AtomExpr::or(AtomExpr::Recursive(2), AtomExpr::True),
        );
        assert_eq!(expr.atom_class(), Some(7));
        let mut refs = Vec::new();
        expr.recursive_refs(&mut refs);
        assert_eq!(refs, vec![0, 2]);
    }
}
