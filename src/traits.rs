//! Property capabilities the SMARTS evaluator reads from atom and bond
//! payloads. Any graph payload implementing these can be searched.

use crate::bond::BondOrder;

pub trait HasAtomicNum {
    fn atomic_num(&self) -> u8;
}

pub trait HasFormalCharge {
    fn formal_charge(&self) -> i8;
}

pub trait HasIsotope {
    fn isotope(&self) -> u16;
}

pub trait HasHydrogenCount {
    fn hydrogen_count(&self) -> u8;
}

pub trait HasAromaticity {
    fn is_aromatic(&self) -> bool;
}

pub trait HasBondOrder {
    fn bond_order(&self) -> BondOrder;
}

/// Everything an atom payload must expose to be matched by a SMARTS atom
/// expression.
pub trait QueryableAtom:
    HasAtomicNum + HasFormalCharge + HasIsotope + HasHydrogenCount + HasAromaticity
{
}

impl<T> QueryableAtom for T where
    T: HasAtomicNum + HasFormalCharge + HasIsotope + HasHydrogenCount + HasAromaticity
{
}

/// Everything a bond payload must expose to be matched by a SMARTS bond
/// expression.
pub trait QueryableBond: HasBondOrder + HasAromaticity {}

impl<T> QueryableBond for T where T: HasBondOrder + HasAromaticity {}
