use std::collections::HashSet;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{Member, MemberId};
use crate::domain::union::UnionKey;

/// Label of the synthetic node parenting disconnected family groups.
pub const VIRTUAL_ROOT_LABEL: &str = "@family";

/// Payload of a genogram node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A real person, carrying the record it was built from
    Member(Member),
    /// A parental pairing interposed between parents and their shared children
    Union(UnionKey),
    /// Synthetic top node when the input holds several family groups
    VirtualRoot,
}

impl NodeKind {
    pub fn as_member(&self) -> Option<&Member> {
        match self {
            NodeKind::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionKey> {
        match self {
            NodeKind::Union(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, NodeKind::Member(_))
    }

    /// Stable textual key: member id, union key or the virtual root label.
    pub fn key(&self) -> String {
        match self {
            NodeKind::Member(m) => m.id.to_string(),
            NodeKind::Union(key) => key.to_string(),
            NodeKind::VirtualRoot => VIRTUAL_ROOT_LABEL.to_string(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Member(m) => write!(f, "{} ({})", m.display_name(), m.id),
            NodeKind::Union(key) => write!(f, "⚭ {}", key),
            NodeKind::VirtualRoot => f.write_str(VIRTUAL_ROOT_LABEL),
        }
    }
}

/// Node in the arena-based genogram.
#[derive(Debug, Clone)]
pub struct GenoNode {
    pub kind: NodeKind,
    /// Unions for members, members for unions, group roots for the virtual root.
    /// A union is listed under each of its parents.
    pub children: Vec<Index>,
}

/// Arena-based genogram storage.
///
/// Relations are arena indices, never references, so spouse-of-spouse or
/// cyclic parent data cannot produce unbounded walks: every traversal here
/// carries a visited set.
#[derive(Debug, Clone, Default)]
pub struct GenogramArena {
    arena: Arena<GenoNode>,
    root: Option<Index>,
}

impl GenogramArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, kind: NodeKind) -> Index {
        self.arena.insert(GenoNode {
            kind,
            children: Vec::new(),
        })
    }

    pub fn remove_node(&mut self, idx: Index) -> Option<GenoNode> {
        if self.root == Some(idx) {
            self.root = None;
        }
        self.arena.remove(idx)
    }

    /// Appends `child` under `parent` unless it is already listed there.
    #[instrument(level = "trace", skip(self))]
    pub fn push_child(&mut self, parent: Index, child: Index) {
        if let Some(node) = self.arena.get_mut(parent) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
    }

    /// Removes `child` from `parent`'s children; true if it was listed.
    #[instrument(level = "trace", skip(self))]
    pub fn detach_child(&mut self, parent: Index, child: Index) -> bool {
        match self.arena.get_mut(parent) {
            Some(node) => {
                let before = node.children.len();
                node.children.retain(|&c| c != child);
                node.children.len() != before
            }
            None => false,
        }
    }

    pub fn set_root(&mut self, idx: Index) {
        self.root = Some(idx);
    }

    pub fn get_node(&self, idx: Index) -> Option<&GenoNode> {
        self.arena.get(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order walk from the root visiting each node once.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Indices reachable from the root.
    #[instrument(level = "trace", skip(self))]
    pub fn reachable(&self) -> HashSet<Index> {
        self.iter().map(|(idx, _)| idx).collect()
    }

    /// Members one generation below `idx`: through its unions, plus members
    /// attached directly.
    pub fn child_members(&self, idx: Index) -> Vec<Index> {
        let mut result = Vec::new();
        let Some(node) = self.get_node(idx) else {
            return result;
        };
        for &child in &node.children {
            match self.get_node(child).map(|n| &n.kind) {
                Some(NodeKind::Union(_)) => {
                    if let Some(union) = self.get_node(child) {
                        result.extend(union.children.iter().copied());
                    }
                }
                Some(_) => result.push(child),
                None => {}
            }
        }
        result
    }

    /// Number of distinct members below `idx`, bounded by a visited set.
    #[instrument(level = "trace", skip(self))]
    pub fn descendant_count(&self, idx: Index) -> usize {
        let mut seen = HashSet::from([idx]);
        let mut stack = self.child_members(idx);
        let mut count = 0;
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            count += 1;
            stack.extend(self.child_members(current));
        }
        count
    }

    /// True when some child of `idx` has children of its own.
    pub fn has_grandchild(&self, idx: Index) -> bool {
        self.child_members(idx)
            .into_iter()
            .filter(|&child| child != idx)
            .any(|child| !self.child_members(child).is_empty())
    }

    /// Number of parents listing `idx` as a child.
    pub fn placement_count(&self, idx: Index) -> usize {
        self.arena
            .iter()
            .filter(|(_, node)| node.children.contains(&idx))
            .count()
    }

    /// Number of levels below and including the root.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter_with_level()
            .map(|(_, _, level)| level + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order walk yielding the level of each node (root = 0).
    pub fn iter_with_level(&self) -> LevelIterator<'_> {
        LevelIterator::new(self)
    }

    /// Members without any member below them, in walk order.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_members(&self) -> Vec<MemberId> {
        self.iter()
            .filter_map(|(idx, node)| {
                let member = node.kind.as_member()?;
                self.child_members(idx).is_empty().then(|| member.id.clone())
            })
            .collect()
    }
}

pub struct TreeIterator<'a> {
    arena: &'a GenogramArena,
    stack: Vec<Index>,
    seen: HashSet<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a GenogramArena, start: Option<Index>) -> Self {
        Self {
            arena,
            stack: start.into_iter().collect(),
            seen: HashSet::new(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a GenoNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if !self.seen.insert(current_idx) {
                continue;
            }
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    if !self.seen.contains(&child) {
                        self.stack.push(child);
                    }
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct LevelIterator<'a> {
    arena: &'a GenogramArena,
    stack: Vec<(Index, usize)>,
    seen: HashSet<Index>,
}

impl<'a> LevelIterator<'a> {
    fn new(arena: &'a GenogramArena) -> Self {
        Self {
            arena,
            stack: arena.root().map(|r| (r, 0)).into_iter().collect(),
            seen: HashSet::new(),
        }
    }
}

impl<'a> Iterator for LevelIterator<'a> {
    type Item = (Index, &'a GenoNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, level)) = self.stack.pop() {
            if !self.seen.insert(current_idx) {
                continue;
            }
            if let Some(node) = self.arena.get_node(current_idx) {
                for &child in node.children.iter().rev() {
                    if !self.seen.contains(&child) {
                        self.stack.push((child, level + 1));
                    }
                }
                return Some((current_idx, node, level));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(arena: &mut GenogramArena, id: &str) -> Index {
        arena.insert_node(NodeKind::Member(Member::new(id, id)))
    }

    #[test]
    fn test_iter_visits_shared_union_once() {
        let mut arena = GenogramArena::new();
        let a = member(&mut arena, "a");
        let b = member(&mut arena, "b");
        let c = member(&mut arena, "c");
        let key = UnionKey::from_parents(&[MemberId::from("a"), MemberId::from("b")]).unwrap();
        let u = arena.insert_node(NodeKind::Union(key));
        arena.push_child(a, u);
        arena.push_child(b, u);
        arena.push_child(u, c);
        arena.push_child(a, b);
        arena.set_root(a);

        let order: Vec<String> = arena.iter().map(|(_, n)| n.kind.key()).collect();
        assert_eq!(order, vec!["a", "union:a:b", "c", "b"]);
        assert_eq!(arena.placement_count(u), 2);
        assert_eq!(arena.descendant_count(a), 2);
        // b reaches c through the shared union, so only c is a leaf
        assert_eq!(arena.leaf_members(), vec![MemberId::from("c")]);
    }

    #[test]
    fn test_depth_counts_union_levels() {
        let mut arena = GenogramArena::new();
        let a = member(&mut arena, "a");
        let c = member(&mut arena, "c");
        let key = UnionKey::from_parents(&[MemberId::from("a")]).unwrap();
        let u = arena.insert_node(NodeKind::Union(key));
        arena.push_child(a, u);
        arena.push_child(u, c);
        arena.set_root(a);

        assert_eq!(arena.depth(), 3);
        assert!(!arena.has_grandchild(a));
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let mut arena = GenogramArena::new();
        let a = member(&mut arena, "a");
        let b = member(&mut arena, "b");
        arena.push_child(a, b);
        arena.push_child(b, a);
        arena.set_root(a);

        assert_eq!(arena.iter().count(), 2);
        assert_eq!(arena.descendant_count(a), 1);
    }

    #[test]
    fn test_empty_arena() {
        let arena = GenogramArena::new();
        assert!(arena.is_empty());
        assert_eq!(arena.depth(), 0);
        assert!(arena.leaf_members().is_empty());
    }
}
