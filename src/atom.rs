/// Default atom type for a target molecule graph node.
///
/// `Atom` stores the intrinsic properties a SMARTS primitive can test
/// directly. Graph-derived properties (degree, valence, ring membership) are
/// computed from the surrounding [`Mol`](crate::Mol) and
/// [`RingSet`](crate::RingSet) when a query asks for them.
///
/// # Examples
///
/// ```
/// use chemsift::Atom;
///
/// let carbon = Atom {
///     atomic_num: 6,
///     hydrogen_count: 3,
///     ..Atom::default()
/// };
/// assert_eq!(carbon.atomic_num, 6);
/// assert!(!carbon.is_aromatic);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    /// Atomic number (1 = H, 6 = C, 7 = N, …).
    pub atomic_num: u8,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Mass number. `0` means unspecified (natural abundance).
    pub isotope: u16,
    /// Number of implicit (suppressed) hydrogens on this atom.
    pub hydrogen_count: u8,
    /// Whether the atom was written or perceived as aromatic.
    pub is_aromatic: bool,
}

impl Atom {
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            ..Self::default()
        }
    }

    pub fn aromatic(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            is_aromatic: true,
            ..Self::default()
        }
    }
}

impl crate::traits::HasAtomicNum for Atom {
    fn atomic_num(&self) -> u8 {
        self.atomic_num
    }
}

impl crate::traits::HasFormalCharge for Atom {
    fn formal_charge(&self) -> i8 {
        self.formal_charge
    }
}

impl crate::traits::HasIsotope for Atom {
    fn isotope(&self) -> u16 {
        self.isotope
    }
}

impl crate::traits::HasHydrogenCount for Atom {
    fn hydrogen_count(&self) -> u8 {
        self.hydrogen_count
    }
}

impl crate::traits::HasAromaticity for Atom {
    fn is_aromatic(&self) -> bool {
        self.is_aromatic
    }
}
