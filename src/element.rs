//! Periodic table lookups needed by the SMILES and SMARTS readers.

static SYMBOLS: [&str; 119] = [
    "*", // dummy
    "H", "He", //
    "Li", "Be", "B", "C", "N", "O", "F", "Ne", //
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", //
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se",
    "Br", "Kr", //
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te",
    "I", "Xe", //
    "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn",
    "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No",
    "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Lowercase symbols accepted for aromatic atoms, longest first so that
/// `se` wins over `s`.
pub(crate) static AROMATIC_SYMBOLS: [(&str, u8); 8] = [
    ("se", 34),
    ("as", 33),
    ("te", 52),
    ("b", 5),
    ("c", 6),
    ("n", 7),
    ("o", 8),
    ("p", 15),
];

/// Aromatic symbols allowed outside brackets.
pub(crate) static BARE_AROMATIC_SYMBOLS: [(&str, u8); 6] =
    [("b", 5), ("c", 6), ("n", 7), ("o", 8), ("p", 15), ("s", 16)];

pub fn atomic_num_from_symbol(symbol: &str) -> Option<u8> {
    SYMBOLS
        .iter()
        .skip(1)
        .position(|&s| s == symbol)
        .map(|i| (i + 1) as u8)
}

pub fn symbol(atomic_num: u8) -> Option<&'static str> {
    match atomic_num {
        0 => None,
        n => SYMBOLS.get(n as usize).copied(),
    }
}

/// Default valences for the SMILES organic subset, in increasing order.
/// Other elements have no default and never receive implicit hydrogens.
pub fn default_valences(atomic_num: u8) -> &'static [u8] {
    match atomic_num {
        5 => &[3],
        6 => &[4],
        7 => &[3, 5],
        8 => &[2],
        9 | 17 | 35 | 53 => &[1],
        15 => &[3, 5],
        16 => &[2, 4, 6],
        _ => &[],
    }
}

pub fn is_organic_subset(atomic_num: u8) -> bool {
    !default_valences(atomic_num).is_empty()
}
