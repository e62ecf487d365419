use crate::core::account::AccountId;
use crate::detect::cycles::CycleHit;
use crate::detect::shells::ShellChain;
use crate::detect::smurfing::SmurfHit;
use crate::graph::union_find::UnionFind;
use std::collections::{BTreeSet, HashMap};

/// Maximum members of a merged cycle ring.
pub const RING_MEMBER_CAP: usize = 30;

/// The pattern family a ring was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingKind {
    Cycle,
    Smurfing,
    Shell,
}

impl RingKind {
    /// The `pattern_type` string used in the report.
    pub fn pattern_type(&self) -> &'static str {
        match self {
            RingKind::Cycle => "cycle",
            RingKind::Smurfing => "smurfing",
            RingKind::Shell => "shell",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            RingKind::Cycle => "C",
            RingKind::Smurfing => "S",
            RingKind::Shell => "SH",
        }
    }
}

/// A group of co-implicated accounts.
#[derive(Debug, Clone)]
pub struct Ring {
    /// Stable type-prefixed id, e.g. `R-C-0001`.
    pub id: String,
    pub kind: RingKind,
    /// Member accounts, ascending.
    pub members: Vec<AccountId>,
}

/// All rings of a batch plus the account → first-ring association.
#[derive(Debug, Clone, Default)]
pub struct RingSet {
    pub rings: Vec<Ring>,
    first_ring: HashMap<AccountId, usize>,
}

impl RingSet {
    /// The id of the first ring an account belongs to, if any.
    pub fn ring_id_for(&self, account: &AccountId) -> Option<&str> {
        self.first_ring
            .get(account)
            .map(|&idx| self.rings[idx].id.as_str())
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

/// Group detector output into named rings.
///
/// Cycle rings merge overlapping cycles through a size-capped
/// union-find; a merge that would push a component past
/// [`RING_MEMBER_CAP`] is refused and the refused cycle stands alone.
/// Smurfing and shell hits each map to one ring. Ids are assigned per
/// type in discovery order.
pub fn assemble_rings(
    cycles: &[CycleHit],
    smurfs: &[SmurfHit],
    shells: &[ShellChain],
) -> RingSet {
    let mut rings: Vec<Ring> = Vec::new();

    for members in cycle_ring_members(cycles) {
        push_ring(&mut rings, RingKind::Cycle, members);
    }
    for hit in smurfs {
        let mut members: BTreeSet<AccountId> = hit.counterparties.iter().cloned().collect();
        members.insert(hit.account.clone());
        push_ring(&mut rings, RingKind::Smurfing, members);
    }
    for chain in shells {
        let members: BTreeSet<AccountId> = chain.accounts.iter().cloned().collect();
        push_ring(&mut rings, RingKind::Shell, members);
    }

    let mut first_ring = HashMap::new();
    for (idx, ring) in rings.iter().enumerate() {
        for member in &ring.members {
            first_ring.entry(member.clone()).or_insert(idx);
        }
    }

    RingSet { rings, first_ring }
}

fn push_ring(rings: &mut Vec<Ring>, kind: RingKind, members: BTreeSet<AccountId>) {
    let ordinal = rings.iter().filter(|r| r.kind == kind).count() + 1;
    rings.push(Ring {
        id: format!("R-{}-{:04}", kind.id_prefix(), ordinal),
        kind,
        members: members.into_iter().collect(),
    });
}

/// Merge cycles sharing at least one account, refusing merges past the
/// member cap. Ring order follows the first contributing cycle.
fn cycle_ring_members(cycles: &[CycleHit]) -> Vec<BTreeSet<AccountId>> {
    let mut uf = UnionFind::new();
    let mut index_of: HashMap<&AccountId, usize> = HashMap::new();
    // Drafts in discovery order; absorbed drafts become `None`.
    let mut drafts: Vec<Option<BTreeSet<AccountId>>> = Vec::new();
    let mut draft_of_root: HashMap<usize, usize> = HashMap::new();

    for cycle in cycles {
        let ids: Vec<usize> = cycle
            .accounts
            .iter()
            .map(|account| *index_of.entry(account).or_insert_with(|| uf.push()))
            .collect();

        let old_roots: Vec<usize> = {
            let mut roots: Vec<usize> = ids.iter().map(|&i| uf.find(i)).collect();
            roots.sort_unstable();
            roots.dedup();
            roots
        };

        match uf.try_union_group(&ids, RING_MEMBER_CAP) {
            Some(new_root) => {
                let mut involved: Vec<usize> = old_roots
                    .iter()
                    .filter_map(|root| draft_of_root.remove(root))
                    .collect();
                involved.sort_unstable();
                involved.dedup();

                let target = match involved.first() {
                    Some(&first) => first,
                    None => {
                        drafts.push(Some(BTreeSet::new()));
                        drafts.len() - 1
                    }
                };
                for &absorbed in involved.iter().skip(1) {
                    let members = drafts[absorbed].take().unwrap_or_default();
                    if let Some(Some(target_set)) = drafts.get_mut(target) {
                        target_set.extend(members);
                    }
                }
                if let Some(Some(target_set)) = drafts.get_mut(target) {
                    target_set.extend(cycle.accounts.iter().cloned());
                }
                draft_of_root.insert(new_root, target);
            }
            None => {
                // Cap refusal: the cycle stands alone, components untouched.
                drafts.push(Some(cycle.accounts.iter().cloned().collect()));
            }
        }
    }

    drafts.into_iter().flatten().collect()
}
