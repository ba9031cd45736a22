use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// One ring of the smallest set of smallest rings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    /// Ring atoms in traversal order.
    pub atoms: Vec<NodeIndex>,
    /// Ring bonds; `bonds[i]` joins `atoms[i]` and `atoms[(i + 1) % len]`.
    pub bonds: Vec<EdgeIndex>,
}

impl Ring {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains_atom(&self, atom: NodeIndex) -> bool {
        self.atoms.contains(&atom)
    }
}

/// Ring perception result for one molecule (SSSR).
///
/// All membership queries are answered from tables built once at
/// construction, so a `RingSet` can be shared read-only across any number of
/// searches on the same molecule.
#[derive(Debug, Clone)]
pub struct RingSet {
    rings: Vec<Ring>,
    atom_ring_count: Vec<usize>,
    atom_ring_bonds: Vec<usize>,
    bond_in_ring: Vec<bool>,
}

impl RingSet {
    pub fn sssr<A, B>(mol: &Mol<A, B>) -> Self {
        let expected = Self::expected_ring_count(mol);
        let rings = if expected == 0 {
            Vec::new()
        } else {
            select_independent(horton_candidates(mol), expected, mol.bond_count())
        };

        let mut atom_ring_count = vec![0; mol.atom_count()];
        let mut bond_in_ring = vec![false; mol.bond_count()];
        for ring in &rings {
            for &a in &ring.atoms {
                atom_ring_count[a.index()] += 1;
            }
            for &b in &ring.bonds {
                bond_in_ring[b.index()] = true;
            }
        }

        let atom_ring_bonds = mol
            .atoms()
            .map(|a| mol.bonds_of(a).filter(|b| bond_in_ring[b.index()]).count())
            .collect();

        Self {
            rings,
            atom_ring_count,
            atom_ring_bonds,
            bond_in_ring,
        }
    }

    /// Cyclomatic number `E - V + C`.
    pub fn expected_ring_count<A, B>(mol: &Mol<A, B>) -> usize {
        let (_, components) = mol.component_labels();
        (mol.bond_count() + components).saturating_sub(mol.atom_count())
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn num_rings_total(&self) -> usize {
        self.rings.len()
    }

    pub fn is_atom_in_ring(&self, atom: NodeIndex) -> bool {
        self.num_rings(atom) > 0
    }

    /// Number of SSSR rings containing `atom`.
    pub fn num_rings(&self, atom: NodeIndex) -> usize {
        self.atom_ring_count.get(atom.index()).copied().unwrap_or(0)
    }

    pub fn is_atom_in_ring_size(&self, atom: NodeIndex, size: usize) -> bool {
        self.rings
            .iter()
            .any(|r| r.len() == size && r.contains_atom(atom))
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.rings
            .iter()
            .filter(|r| r.contains_atom(atom))
            .map(Ring::len)
            .min()
    }

    pub fn is_bond_in_ring(&self, bond: EdgeIndex) -> bool {
        self.bond_in_ring.get(bond.index()).copied().unwrap_or(false)
    }

    /// Number of ring bonds incident to `atom`.
    pub fn num_ring_bonds(&self, atom: NodeIndex) -> usize {
        self.atom_ring_bonds.get(atom.index()).copied().unwrap_or(0)
    }
}

struct Bfs {
    dist: Vec<u32>,
    parent: Vec<Option<NodeIndex>>,
}

fn bfs<A, B>(mol: &Mol<A, B>, root: NodeIndex) -> Bfs {
    let n = mol.atom_count();
    let mut dist = vec![u32::MAX; n];
    let mut parent = vec![None; n];
    let mut queue = VecDeque::new();
    dist[root.index()] = 0;
    queue.push_back(root);
    while let Some(cur) = queue.pop_front() {
        for nb in mol.neighbors(cur) {
            if dist[nb.index()] == u32::MAX {
                dist[nb.index()] = dist[cur.index()] + 1;
                parent[nb.index()] = Some(cur);
                queue.push_back(nb);
            }
        }
    }
    Bfs { dist, parent }
}

fn path_to_root(tree: &Bfs, mut node: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![node];
    while let Some(p) = tree.parent[node.index()] {
        path.push(p);
        node = p;
    }
    path.reverse();
    path
}

/// Horton candidate cycles: for every root atom and every bond `(u, v)`, the
/// shortest root→u and root→v paths closed by the bond, kept when the two
/// paths only share the root.
fn horton_candidates<A, B>(mol: &Mol<A, B>) -> Vec<Ring> {
    let mut candidates = Vec::new();
    for root in mol.atoms() {
        let tree = bfs(mol, root);
        for edge in mol.bonds() {
            let Some((u, v)) = mol.bond_endpoints(edge) else {
                continue;
            };
            let (du, dv) = (tree.dist[u.index()], tree.dist[v.index()]);
            if du == u32::MAX || dv == u32::MAX {
                continue;
            }
            // Skip tree edges: those never close a cycle through the root.
            if tree.parent[u.index()] == Some(v) || tree.parent[v.index()] == Some(u) {
                continue;
            }
            let path_u = path_to_root(&tree, u);
            let path_v = path_to_root(&tree, v);
            if path_u[1..].iter().any(|a| path_v[1..].contains(a)) {
                continue;
            }
            let mut atoms = path_u;
            atoms.extend(path_v[1..].iter().rev());
            if atoms.len() < 3 {
                continue;
            }
            let bonds = (0..atoms.len())
                .filter_map(|i| mol.bond_between(atoms[i], atoms[(i + 1) % atoms.len()]))
                .collect::<Vec<_>>();
            if bonds.len() == atoms.len() {
                candidates.push(Ring { atoms, bonds });
            }
        }
    }
    candidates.sort_by_key(Ring::len);
    candidates
}

fn edge_vector(ring: &Ring, num_edges: usize) -> Vec<u64> {
    let mut v = vec![0u64; num_edges.div_ceil(64)];
    for b in &ring.bonds {
        v[b.index() / 64] |= 1u64 << (b.index() % 64);
    }
    v
}

fn lowest_set_bit(v: &[u64]) -> Option<usize> {
    v.iter()
        .enumerate()
        .find(|(_, w)| **w != 0)
        .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}

/// Greedy GF(2) basis selection over the edge incidence vectors, shortest
/// candidates first.
fn select_independent(candidates: Vec<Ring>, expected: usize, num_edges: usize) -> Vec<Ring> {
    let mut basis: Vec<Option<Vec<u64>>> = vec![None; num_edges];
    let mut rings = Vec::with_capacity(expected);
    for ring in candidates {
        if rings.len() == expected {
            break;
        }
        let mut v = edge_vector(&ring, num_edges);
        while let Some(pivot) = lowest_set_bit(&v) {
            match &basis[pivot] {
                Some(b) => v.iter_mut().zip(b).for_each(|(x, y)| *x ^= y),
                None => {
                    basis[pivot] = Some(v);
                    rings.push(ring);
                    break;
                }
            }
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn rings_of(smiles: &str) -> (Mol<crate::Atom, crate::Bond>, RingSet) {
        let mol = from_smiles(smiles).unwrap();
        let rings = RingSet::sssr(&mol);
        (mol, rings)
    }

    #[test]
    fn acyclic_has_no_rings() {
        let (mol, rs) = rings_of("CCCC");
        assert_eq!(rs.num_rings_total(), 0);
        assert!(mol.atoms().all(|a| !rs.is_atom_in_ring(a)));
        assert!(mol.bonds().all(|b| !rs.is_bond_in_ring(b)));
    }

    #[test]
    fn benzene_single_six_ring() {
        let (mol, rs) = rings_of("c1ccccc1");
        assert_eq!(rs.num_rings_total(), 1);
        assert_eq!(rs.rings()[0].len(), 6);
        for a in mol.atoms() {
            assert_eq!(rs.num_rings(a), 1);
            assert!(rs.is_atom_in_ring_size(a, 6));
            assert!(!rs.is_atom_in_ring_size(a, 5));
            assert_eq!(rs.num_ring_bonds(a), 2);
        }
    }

    #[test]
    fn naphthalene_fusion_atoms() {
        let (mol, rs) = rings_of("c1ccc2ccccc2c1");
        assert_eq!(rs.num_rings_total(), 2);
        let fused: Vec<_> = mol.atoms().filter(|&a| rs.num_rings(a) == 2).collect();
        assert_eq!(fused.len(), 2);
        for a in fused {
            assert_eq!(rs.num_ring_bonds(a), 3);
        }
    }

    #[test]
    fn substituent_bond_not_in_ring() {
        let (mol, rs) = rings_of("CC1CC1");
        let exo = mol.bond_between(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert!(!rs.is_bond_in_ring(exo));
        assert!(!rs.is_atom_in_ring(NodeIndex::new(0)));
        assert_eq!(rs.smallest_ring_size(NodeIndex::new(1)), Some(3));
        assert_eq!(rs.smallest_ring_size(NodeIndex::new(0)), None);
    }

    #[test]
    fn spiro_atom_in_two_rings() {
        let (_, rs) = rings_of("C1CC12CCC2");
        assert_eq!(rs.num_rings_total(), 2);
        assert_eq!(rs.num_rings(NodeIndex::new(2)), 2);
        assert_eq!(rs.num_ring_bonds(NodeIndex::new(2)), 4);
    }

    #[test]
    fn cubane_has_five_rings() {
        let (_, rs) = rings_of("C12C3C4C1C5C2C3C45");
        assert_eq!(rs.num_rings_total(), 5);
        assert!(rs.rings().iter().all(|r| r.len() == 4));
    }

    #[test]
    fn disconnected_components() {
        let (_, rs) = rings_of("C1CC1.C1CCC1");
        assert_eq!(RingSet::expected_ring_count(&from_smiles("C1CC1.C1CCC1").unwrap()), 2);
        let mut sizes: Vec<_> = rs.rings().iter().map(Ring::len).collect();
        sizes.sort();
        assert_eq!(sizes, vec![3, 4]);
    }
}
