/*
Terminal rendering of a genogram through termtree.

A union is listed under each of its parents. Only the first listing is expanded,
later ones print as a back reference so every member shows up once.
 */
use std::collections::HashSet;

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{Genogram, GenogramArena, NodeKind};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for GenogramArena {
    fn to_tree_string(&self) -> Tree<String> {
        render(self, |kind| kind.to_string())
    }
}

// Genogram adds the spouse of each member to its line
impl TreeNodeConvert for Genogram {
    fn to_tree_string(&self) -> Tree<String> {
        render(self.tree(), |kind| {
            let mut label = kind.to_string();
            if let Some(suffix) = spouse_suffix(self, kind) {
                label.push_str(&suffix);
            }
            label
        })
    }
}

#[instrument(level = "debug", skip_all)]
fn render<F>(arena: &GenogramArena, label: F) -> Tree<String>
where
    F: Fn(&NodeKind) -> String,
{
    let Some(root_idx) = arena.root() else {
        return Tree::new("Empty family".to_string());
    };
    let Some(root) = arena.get_node(root_idx) else {
        return Tree::new("Empty family".to_string());
    };

    fn build_tree<F: Fn(&NodeKind) -> String>(
        arena: &GenogramArena,
        node_idx: Index,
        parent_tree: &mut Tree<String>,
        seen: &mut HashSet<Index>,
        label: &F,
    ) {
        let Some(node) = arena.get_node(node_idx) else {
            return;
        };
        for &child_idx in &node.children {
            let Some(child) = arena.get_node(child_idx) else {
                continue;
            };
            if !seen.insert(child_idx) {
                parent_tree.push(Tree::new(format!("↺ {}", child.kind.key())));
                continue;
            }
            let mut child_tree = Tree::new(label(&child.kind));
            build_tree(arena, child_idx, &mut child_tree, seen, label);
            parent_tree.push(child_tree);
        }
    }

    let mut seen = HashSet::from([root_idx]);
    let mut tree = Tree::new(label(&root.kind));
    build_tree(arena, root_idx, &mut tree, &mut seen, &label);
    tree
}

/// Spouse suffix for member lines, e.g. ` ⚭ b`.
pub fn spouse_suffix(genogram: &Genogram, kind: &NodeKind) -> Option<String> {
    let member = kind.as_member()?;
    genogram.spouse_of(&member.id).map(|s| format!(" ⚭ {s}"))
}
