pub mod atom;
pub mod bond;
pub mod element;
pub mod fileio;
pub mod fingerprint;
pub mod isomorphism;
pub mod mol;
pub mod rings;
pub mod smarts;
pub mod smiles;
pub mod traits;

pub use atom::Atom;
pub use bond::{Bond, BondOrder};
pub use fileio::{
    CandidateSet, FingerprintMetadata, IndexError, InvertedIndexCached, InvertedIndexReader,
    InvertedIndexWriter, InvertedSearch, RowMajorFingerprintStore, RowMajorFingerprintWriter,
};
pub use fingerprint::{tanimoto, words_for_bits, Fingerprint};
pub use isomorphism::{
    anchored_search, isomorphism_search, CountMapping, Mapping, MappingCollector, MappingList,
    NoMapping, SearchOptions, SingleMapping,
};
pub use mol::Mol;
pub use rings::{Ring, RingSet};
pub use smarts::{
    from_smarts, get_smarts_match, get_smarts_matches, has_smarts_match, Smarts, SmartsError,
    SmartsErrorKind,
};
pub use smiles::{from_smiles, SmilesError};
pub use traits::{
    HasAromaticity, HasAtomicNum, HasBondOrder, HasFormalCharge, HasHydrogenCount, HasIsotope,
    QueryableAtom, QueryableBond,
};
