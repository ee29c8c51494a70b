//! Genogram builder: flat member records to a rooted tree with union nodes.
//!
//! The builder is a pure function of its input. Each step receives the state
//! it needs (roster, union map, arena) explicitly and hands back what the next
//! step consumes; nothing survives between calls.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use generational_arena::Index;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::arena::{GenoNode, GenogramArena, NodeKind, TreeIterator};
use crate::domain::entities::{Member, MemberId};
use crate::domain::union::UnionKey;

/// Person -> spouse lookup, rendered as peer connectors.
pub type SpouseMap = BTreeMap<MemberId, MemberId>;

/// Inconsistency found in the input and the policy applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Record without usable id, skipped
    BlankId { position: usize },
    /// Second record for an id; only its relations are considered
    DuplicateMember { id: MemberId },
    /// Parent id not present in the input, ignored
    DanglingParent { member: MemberId, parent: MemberId },
    /// Member lists itself as parent, ignored
    SelfParent { member: MemberId },
    /// Member seen with another parent set; first one kept
    ConflictingParents {
        member: MemberId,
        kept: UnionKey,
        discarded: UnionKey,
    },
    /// Spouse id not present in the input, ignored
    DanglingSpouse { member: MemberId, spouse: MemberId },
    /// Person already linked to another spouse; first link kept
    ConflictingSpouse {
        member: MemberId,
        kept: MemberId,
        discarded: MemberId,
    },
    /// Parent references form a cycle; member taken out of its union
    CycleBroken { member: MemberId, union: UnionKey },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BlankId { position } => {
                write!(f, "record #{position} has no id, skipped")
            }
            Diagnostic::DuplicateMember { id } => {
                write!(f, "member {id} appears more than once, first record kept")
            }
            Diagnostic::DanglingParent { member, parent } => {
                write!(f, "member {member} references unknown parent {parent}")
            }
            Diagnostic::SelfParent { member } => {
                write!(f, "member {member} lists itself as parent")
            }
            Diagnostic::ConflictingParents {
                member,
                kept,
                discarded,
            } => write!(
                f,
                "member {member} has conflicting parent sets, kept {kept}, discarded {discarded}"
            ),
            Diagnostic::DanglingSpouse { member, spouse } => {
                write!(f, "member {member} references unknown spouse {spouse}")
            }
            Diagnostic::ConflictingSpouse {
                member,
                kept,
                discarded,
            } => write!(
                f,
                "member {member} is linked to spouse {kept}, ignored link to {discarded}"
            ),
            Diagnostic::CycleBroken { member, union } => {
                write!(f, "parent cycle: member {member} detached from {union}")
            }
        }
    }
}

/// Result of a build: the tree, its spouse map and what was repaired.
#[derive(Debug, Clone)]
pub struct Genogram {
    tree: GenogramArena,
    root: Index,
    members: HashMap<MemberId, Index>,
    unions: BTreeMap<UnionKey, Index>,
    spouses: SpouseMap,
    diagnostics: Vec<Diagnostic>,
}

impl Genogram {
    pub fn root(&self) -> Index {
        self.root
    }

    pub fn root_node(&self) -> Option<&GenoNode> {
        self.tree.get_node(self.root)
    }

    pub fn tree(&self) -> &GenogramArena {
        &self.tree
    }

    pub fn node(&self, idx: Index) -> Option<&GenoNode> {
        self.tree.get_node(idx)
    }

    pub fn member_node(&self, id: &MemberId) -> Option<Index> {
        self.members.get(id).copied()
    }

    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.node(self.member_node(id)?)?.kind.as_member()
    }

    pub fn union_node(&self, key: &UnionKey) -> Option<Index> {
        self.unions.get(key).copied()
    }

    /// Union keys in sorted order.
    pub fn unions(&self) -> impl Iterator<Item = &UnionKey> {
        self.unions.keys()
    }

    pub fn spouses(&self) -> &SpouseMap {
        &self.spouses
    }

    pub fn spouse_of(&self, id: &MemberId) -> Option<&MemberId> {
        self.spouses.get(id)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Pre-order walk from the root, each node once.
    pub fn iter(&self) -> TreeIterator<'_> {
        self.tree.iter()
    }

    /// Member ids in walk order.
    pub fn member_ids(&self) -> Vec<MemberId> {
        self.iter()
            .filter_map(|(_, node)| node.kind.as_member().map(|m| m.id.clone()))
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn leaf_members(&self) -> Vec<MemberId> {
        self.tree.leaf_members()
    }

    pub fn descendant_count(&self, id: &MemberId) -> Option<usize> {
        self.member_node(id).map(|idx| self.tree.descendant_count(idx))
    }

    /// Number of parent nodes listing `idx` as a child.
    pub fn placement_count(&self, idx: Index) -> usize {
        self.tree.placement_count(idx)
    }

    pub fn is_virtual_root(&self) -> bool {
        matches!(
            self.root_node().map(|n| &n.kind),
            Some(NodeKind::VirtualRoot)
        )
    }
}

/// Members indexed by id, in input order.
#[derive(Debug, Default)]
struct Roster {
    by_id: HashMap<MemberId, Index>,
    order: Vec<Index>,
}

/// Unions created so far and the single union each member hangs from.
#[derive(Debug, Default)]
struct UnionMap {
    nodes: BTreeMap<UnionKey, Index>,
    created: Vec<UnionKey>,
    placement: HashMap<MemberId, UnionKey>,
}

/// Rebuilds the genogram of a family from its flat member list.
///
/// Returns `None` for an input without usable members. Inconsistent relation
/// data never fails the build; it is repaired and reported through
/// [`Genogram::diagnostics`].
#[instrument(level = "debug", skip_all, fields(records = members.len()))]
pub fn build_genogram(members: &[Member]) -> Option<Genogram> {
    let mut diagnostics = Vec::new();
    let mut tree = GenogramArena::new();

    let roster = index_members(members, &mut tree, &mut diagnostics);
    if roster.order.is_empty() {
        debug!("no members, no root");
        return None;
    }

    let mut unions = link_unions(members, &roster, &mut tree, &mut diagnostics);
    attach_unions(&unions, &roster, &mut tree);

    let groups = family_groups(&roster, &unions, &tree);
    debug!("{} family group(s), {} union(s)", groups.len(), unions.created.len());

    // groups without a candidate are cyclic islands, left to the sweep
    let mut group_roots: Vec<Index> = groups
        .iter()
        .filter_map(|group| select_group_root(group, &unions, &tree))
        .collect();
    if group_roots.is_empty() {
        let root = break_cycle(&roster.order, &roster, &mut unions, &mut tree, &mut diagnostics)?;
        group_roots.push(root);
    }

    let root = match group_roots.as_slice() {
        [single] => *single,
        _ => {
            let virtual_root = tree.insert_node(NodeKind::VirtualRoot);
            for &group_root in &group_roots {
                tree.push_child(virtual_root, group_root);
            }
            virtual_root
        }
    };
    tree.set_root(root);

    sweep_unreached(root, &roster, &mut unions, &mut tree, &mut diagnostics);

    let spouses = collect_spouses(members, &roster, &mut diagnostics);

    for diagnostic in &diagnostics {
        debug!("{}", diagnostic);
    }

    Some(Genogram {
        tree,
        root,
        members: roster.by_id,
        unions: unions.nodes,
        spouses,
        diagnostics,
    })
}

#[instrument(level = "trace", skip_all)]
fn index_members(
    members: &[Member],
    tree: &mut GenogramArena,
    diagnostics: &mut Vec<Diagnostic>,
) -> Roster {
    let mut roster = Roster::default();
    for (position, member) in members.iter().enumerate() {
        if member.id.is_blank() {
            diagnostics.push(Diagnostic::BlankId { position });
            continue;
        }
        if roster.by_id.contains_key(&member.id) {
            diagnostics.push(Diagnostic::DuplicateMember {
                id: member.id.clone(),
            });
            continue;
        }
        let idx = tree.insert_node(NodeKind::Member(member.clone()));
        roster.by_id.insert(member.id.clone(), idx);
        roster.order.push(idx);
    }
    roster
}

/// Creates one union per distinct parent set and hangs each member from the
/// first union seen for it.
#[instrument(level = "trace", skip_all)]
fn link_unions(
    members: &[Member],
    roster: &Roster,
    tree: &mut GenogramArena,
    diagnostics: &mut Vec<Diagnostic>,
) -> UnionMap {
    let mut unions = UnionMap::default();

    for member in members {
        if member.parents.is_empty() {
            continue;
        }
        let Some(&child_idx) = roster.by_id.get(&member.id) else {
            continue;
        };

        let mut resolved = Vec::with_capacity(member.parents.len());
        for parent in &member.parents {
            if parent.is_blank() {
                continue;
            }
            if parent == &member.id {
                diagnostics.push(Diagnostic::SelfParent {
                    member: member.id.clone(),
                });
            } else if roster.by_id.contains_key(parent) {
                resolved.push(parent);
            } else {
                diagnostics.push(Diagnostic::DanglingParent {
                    member: member.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let Some(key) = UnionKey::from_parents(resolved) else {
            continue;
        };

        match unions.placement.get(&member.id) {
            Some(existing) if existing == &key => continue,
            Some(existing) => {
                diagnostics.push(Diagnostic::ConflictingParents {
                    member: member.id.clone(),
                    kept: existing.clone(),
                    discarded: key,
                });
                continue;
            }
            None => {}
        }

        let union_idx = match unions.nodes.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = tree.insert_node(NodeKind::Union(key.clone()));
                unions.nodes.insert(key.clone(), idx);
                unions.created.push(key.clone());
                idx
            }
        };
        tree.push_child(union_idx, child_idx);
        unions.placement.insert(member.id.clone(), key);
    }

    unions
}

/// Lists every union under each of its parents, in union creation order.
#[instrument(level = "trace", skip_all)]
fn attach_unions(unions: &UnionMap, roster: &Roster, tree: &mut GenogramArena) {
    for key in &unions.created {
        let Some(&union_idx) = unions.nodes.get(key) else {
            continue;
        };
        for parent in key.parents() {
            if let Some(&parent_idx) = roster.by_id.get(parent) {
                tree.push_child(parent_idx, union_idx);
            }
        }
    }
}

/// Members connected through unions, groups ordered by first appearance.
fn family_groups(roster: &Roster, unions: &UnionMap, tree: &GenogramArena) -> Vec<Vec<Index>> {
    let position: HashMap<Index, usize> = roster
        .order
        .iter()
        .enumerate()
        .map(|(pos, &idx)| (idx, pos))
        .collect();
    let mut sets: Vec<usize> = (0..roster.order.len()).collect();

    for key in &unions.created {
        let Some(&union_idx) = unions.nodes.get(key) else {
            continue;
        };
        let mut linked: Vec<usize> = key
            .parents()
            .iter()
            .filter_map(|p| roster.by_id.get(p))
            .filter_map(|idx| position.get(idx).copied())
            .collect();
        if let Some(node) = tree.get_node(union_idx) {
            linked.extend(node.children.iter().filter_map(|c| position.get(c).copied()));
        }
        for pair in linked.windows(2) {
            let (a, b) = (find_set(&mut sets, pair[0]), find_set(&mut sets, pair[1]));
            if a != b {
                sets[a.max(b)] = a.min(b);
            }
        }
    }

    let mut groups: Vec<Vec<Index>> = Vec::new();
    let mut slot_of: HashMap<usize, usize> = HashMap::new();
    for (pos, &idx) in roster.order.iter().enumerate() {
        let rep = find_set(&mut sets, pos);
        let slot = *slot_of.entry(rep).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(idx);
    }
    groups
}

fn find_set(sets: &mut [usize], mut x: usize) -> usize {
    while sets[x] != x {
        sets[x] = sets[sets[x]];
        x = sets[x];
    }
    x
}

/// Picks the natural root of one family group, `None` when every member of
/// the group has parents.
#[instrument(level = "trace", skip_all, fields(size = group.len()))]
fn select_group_root(group: &[Index], unions: &UnionMap, tree: &GenogramArena) -> Option<Index> {
    let member_of = |idx: Index| tree.get_node(idx).and_then(|n| n.kind.as_member());

    let candidates: Vec<Index> = group
        .iter()
        .copied()
        .filter(|&idx| member_of(idx).is_some_and(|m| !unions.placement.contains_key(&m.id)))
        .collect();

    match candidates.as_slice() {
        [] => None,
        [single] => Some(*single),
        many => many
            .iter()
            .copied()
            .find(|&idx| tree.has_grandchild(idx))
            .or_else(|| {
                many.iter().copied().min_by_key(|&idx| {
                    let m = member_of(idx);
                    let birth = m.and_then(|m| m.birth_year);
                    let created = m.and_then(|m| m.created_at);
                    (birth.is_none(), birth, created.is_none(), created)
                })
            }),
    }
}

/// Roots a family where everyone has parents: the member with the most
/// descendants, first on ties, is cut loose from its union.
fn break_cycle(
    members: &[Index],
    roster: &Roster,
    unions: &mut UnionMap,
    tree: &mut GenogramArena,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Index> {
    let mut best: Option<(Index, usize)> = None;
    for &idx in members {
        let count = tree.descendant_count(idx);
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((idx, count));
        }
    }
    let (idx, _) = best?;
    detach_from_union(idx, roster, unions, tree, diagnostics);
    Some(idx)
}

/// Takes a member out of the union it hangs from; drops the union once empty.
fn detach_from_union(
    idx: Index,
    roster: &Roster,
    unions: &mut UnionMap,
    tree: &mut GenogramArena,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(id) = tree
        .get_node(idx)
        .and_then(|n| n.kind.as_member())
        .map(|m| m.id.clone())
    else {
        return;
    };
    let Some(key) = unions.placement.remove(&id) else {
        return;
    };
    let Some(&union_idx) = unions.nodes.get(&key) else {
        return;
    };

    tree.detach_child(union_idx, idx);
    let now_empty = tree
        .get_node(union_idx)
        .is_some_and(|n| n.children.is_empty());
    if now_empty {
        for parent in key.parents() {
            if let Some(&parent_idx) = roster.by_id.get(parent) {
                tree.detach_child(parent_idx, union_idx);
            }
        }
        tree.remove_node(union_idx);
        unions.nodes.remove(&key);
        unions.created.retain(|k| k != &key);
    }
    diagnostics.push(Diagnostic::CycleBroken {
        member: id,
        union: key,
    });
}

/// Hangs every member the root cannot reach directly under the root.
#[instrument(level = "trace", skip_all)]
fn sweep_unreached(
    root: Index,
    roster: &Roster,
    unions: &mut UnionMap,
    tree: &mut GenogramArena,
    diagnostics: &mut Vec<Diagnostic>,
) {
    loop {
        let reached = tree.reachable();
        let unreached: Vec<Index> = roster
            .order
            .iter()
            .copied()
            .filter(|idx| !reached.contains(idx))
            .collect();
        let Some(&first) = unreached.first() else {
            break;
        };

        let loose: Vec<Index> = unreached
            .iter()
            .copied()
            .filter(|&idx| {
                tree.get_node(idx)
                    .and_then(|n| n.kind.as_member())
                    .is_some_and(|m| !unions.placement.contains_key(&m.id))
            })
            .collect();

        if loose.is_empty() {
            // only cyclic islands left
            detach_from_union(first, roster, unions, tree, diagnostics);
            tree.push_child(root, first);
        } else {
            debug!("attaching {} unreached member(s) to root", loose.len());
            for idx in loose {
                tree.push_child(root, idx);
            }
        }
    }
}

#[instrument(level = "trace", skip_all)]
fn collect_spouses(
    members: &[Member],
    roster: &Roster,
    diagnostics: &mut Vec<Diagnostic>,
) -> SpouseMap {
    let mut spouses = SpouseMap::new();
    for member in members {
        let Some(spouse) = member.spouse_id.as_ref() else {
            continue;
        };
        if spouse.is_blank() || spouse == &member.id || !roster.by_id.contains_key(&member.id) {
            continue;
        }
        if !roster.by_id.contains_key(spouse) {
            diagnostics.push(Diagnostic::DanglingSpouse {
                member: member.id.clone(),
                spouse: spouse.clone(),
            });
            continue;
        }
        link_spouse(&mut spouses, &member.id, spouse, diagnostics);
        link_spouse(&mut spouses, spouse, &member.id, diagnostics);
    }
    spouses
}

fn link_spouse(
    spouses: &mut SpouseMap,
    person: &MemberId,
    spouse: &MemberId,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match spouses.get(person) {
        None => {
            spouses.insert(person.clone(), spouse.clone());
        }
        Some(kept) if kept == spouse => {}
        Some(kept) => diagnostics.push(Diagnostic::ConflictingSpouse {
            member: person.clone(),
            kept: kept.clone(),
            discarded: spouse.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_has_no_root() {
        assert!(build_genogram(&[]).is_none());
    }

    #[test]
    fn test_blank_ids_only_has_no_root() {
        let members = vec![Member::new("", "nobody")];
        assert!(build_genogram(&members).is_none());
    }

    #[test]
    fn test_single_member_is_root() {
        let members = vec![Member::new("a", "A")];
        let genogram = build_genogram(&members).unwrap();
        assert_eq!(genogram.member_node(&"a".into()), Some(genogram.root()));
        assert!(!genogram.is_virtual_root());
        assert!(genogram.diagnostics().is_empty());
    }

    #[test]
    fn test_union_groups_connect_parents_and_children() {
        let members = vec![
            Member::new("a", "A"),
            Member::new("b", "B"),
            Member::new("c", "C").with_parents(["a", "b"]),
            Member::new("x", "X"),
        ];
        let mut tree = GenogramArena::new();
        let mut diagnostics = Vec::new();
        let roster = index_members(&members, &mut tree, &mut diagnostics);
        let unions = link_unions(&members, &roster, &mut tree, &mut diagnostics);
        attach_unions(&unions, &roster, &mut tree);

        let groups = family_groups(&roster, &unions, &tree);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_cyclic_group_has_no_root_candidate() {
        let members = vec![
            Member::new("a", "A"),
            Member::new("b", "B").with_parents(["c"]),
            Member::new("c", "C").with_parents(["b"]),
        ];
        let mut tree = GenogramArena::new();
        let mut diagnostics = Vec::new();
        let roster = index_members(&members, &mut tree, &mut diagnostics);
        let unions = link_unions(&members, &roster, &mut tree, &mut diagnostics);
        attach_unions(&unions, &roster, &mut tree);

        let roots: Vec<Option<Index>> = family_groups(&roster, &unions, &tree)
            .iter()
            .map(|group| select_group_root(group, &unions, &tree))
            .collect();
        assert_eq!(roots, vec![roster.by_id.get(&MemberId::from("a")).copied(), None]);
    }

    #[test]
    fn test_cyclic_pair_is_broken_once() {
        let members = vec![
            Member::new("a", "A").with_parents(["b"]),
            Member::new("b", "B").with_parents(["a"]),
        ];
        let genogram = build_genogram(&members).unwrap();
        let a = genogram.member_node(&"a".into()).unwrap();
        assert_eq!(genogram.root(), a);
        assert_eq!(genogram.member_ids(), vec![MemberId::from("a"), MemberId::from("b")]);
        assert!(genogram
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::CycleBroken { member, .. } if member.as_str() == "a")));
        // union:b lost its only child and is gone
        assert_eq!(genogram.unions().count(), 1);
    }
}
