//! Level/position assignment for a built genogram.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use generational_arena::Index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::arena::NodeKind;
use crate::domain::builder::Genogram;
use crate::domain::entities::MemberId;

/// Canvas margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 50.0,
            right: 50.0,
            bottom: 50.0,
            left: 50.0,
        }
    }
}

/// Canvas geometry used to place nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Canvas width available to the tree
    pub width: f64,
    /// Diameter of a member node, passed through to renderers
    pub node_size: f64,
    /// Vertical distance between levels
    pub level_gap: f64,
    pub margin: Margin,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            width: 1200.0,
            node_size: 80.0,
            level_gap: 120.0,
            margin: Margin::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacedKind {
    Member,
    Union,
    VirtualRoot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    /// Member id, union key or virtual root label
    pub key: String,
    pub kind: PlacedKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub level: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub node_size: f64,
    pub nodes: Vec<PlacedNode>,
    /// Parent -> child links; a union appears once per parent
    pub edges: Vec<Edge>,
    /// Spouse pairs, each once, both ends placed
    pub spouse_links: Vec<Edge>,
}

impl Layout {
    pub fn node(&self, key: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn levels(&self) -> usize {
        self.nodes.iter().map(|n| n.level + 1).max().unwrap_or(0)
    }
}

/// Places every node reachable from the root.
///
/// Levels follow the pre-order walk (root 0, +1 per union or child step); a
/// union shared by two parents sits where it is first reached. Nodes of one
/// level are spread evenly across the usable width in walk order.
#[instrument(level = "debug", skip_all)]
pub fn layout(genogram: &Genogram, params: &LayoutParams) -> Layout {
    let tree = genogram.tree();
    let mut levels: BTreeMap<usize, Vec<Index>> = BTreeMap::new();
    let mut level_of: HashMap<Index, usize> = HashMap::new();
    for (idx, _, level) in tree.iter_with_level() {
        levels.entry(level).or_default().push(idx);
        level_of.insert(idx, level);
    }

    let usable = (params.width - params.margin.left - params.margin.right).max(0.0);
    let mut nodes = Vec::with_capacity(level_of.len());
    for (&level, row) in &levels {
        let x_step = usable / (row.len() as f64 + 1.0);
        let y = level as f64 * params.level_gap + params.margin.top;
        for (i, &idx) in row.iter().enumerate() {
            let Some(node) = tree.get_node(idx) else {
                continue;
            };
            let (kind, name) = match &node.kind {
                NodeKind::Member(m) => (PlacedKind::Member, Some(m.display_name().to_string())),
                NodeKind::Union(_) => (PlacedKind::Union, None),
                NodeKind::VirtualRoot => (PlacedKind::VirtualRoot, None),
            };
            nodes.push(PlacedNode {
                key: node.kind.key(),
                kind,
                name,
                level,
                x: (i as f64 + 1.0) * x_step + params.margin.left,
                y,
            });
        }
    }

    let mut edges = Vec::new();
    for (_, node) in tree.iter() {
        for &child in &node.children {
            if let Some(child_node) = tree.get_node(child) {
                edges.push(Edge {
                    from: node.kind.key(),
                    to: child_node.kind.key(),
                });
            }
        }
    }

    let spouse_pairs: BTreeSet<(&MemberId, &MemberId)> = genogram
        .spouses()
        .iter()
        .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
        .collect();
    let spouse_links = spouse_pairs
        .into_iter()
        .filter(|(a, b)| {
            [a, b].iter().all(|id| {
                genogram
                    .member_node(id)
                    .is_some_and(|idx| level_of.contains_key(&idx))
            })
        })
        .map(|(a, b)| Edge {
            from: a.to_string(),
            to: b.to_string(),
        })
        .collect();

    Layout {
        width: params.width,
        height: levels.len() as f64 * params.level_gap + params.margin.top + params.margin.bottom,
        node_size: params.node_size,
        nodes,
        edges,
        spouse_links,
    }
}
