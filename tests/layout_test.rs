//! Integration tests for level layout of a genogram.

use genotree::domain::{
    build_genogram, layout, Edge, LayoutParams, Margin, Member, PlacedKind,
};
use genotree::util::testing::init_test_setup;

const EPS: f64 = 1e-9;

fn shared_parents() -> Vec<Member> {
    vec![
        Member::new("a", "Ann").with_spouse("b"),
        Member::new("b", "Bob").with_spouse("a"),
        Member::new("c", "Cid").with_parents(["a", "b"]),
    ]
}

#[test]
fn given_shared_parents_when_layout_then_levels_follow_walk() {
    init_test_setup();
    let genogram = build_genogram(&shared_parents()).unwrap();

    let result = layout(&genogram, &LayoutParams::default());

    assert_eq!(result.levels(), 3);
    assert!((result.height - 460.0).abs() < EPS);

    let a = result.node("a").unwrap();
    assert_eq!(a.level, 0);
    assert!((a.x - 600.0).abs() < EPS);
    assert!((a.y - 50.0).abs() < EPS);

    let union = result.node("union:a:b").unwrap();
    assert_eq!(union.kind, PlacedKind::Union);
    assert_eq!(union.level, 1);
    assert!(union.name.is_none());

    let b = result.node("b").unwrap();
    assert_eq!(b.level, 1);
    assert!(union.x < b.x);

    let c = result.node("c").unwrap();
    assert_eq!(c.level, 2);
    assert!((c.x - 600.0).abs() < EPS);
    assert!((c.y - 290.0).abs() < EPS);
}

#[test]
fn given_shared_union_when_layout_then_node_placed_once_with_edge_from_each_parent() {
    let genogram = build_genogram(&shared_parents()).unwrap();

    let result = layout(&genogram, &LayoutParams::default());

    assert_eq!(result.nodes.iter().filter(|n| n.key == "union:a:b").count(), 1);
    let into_union: Vec<&str> = result
        .edges
        .iter()
        .filter(|e| e.to == "union:a:b")
        .map(|e| e.from.as_str())
        .collect();
    assert_eq!(into_union, vec!["a", "b"]);
    assert_eq!(result.edges.len(), 4);
}

#[test]
fn given_spouses_when_layout_then_one_link_per_couple() {
    let genogram = build_genogram(&shared_parents()).unwrap();

    let result = layout(&genogram, &LayoutParams::default());

    assert_eq!(
        result.spouse_links,
        vec![Edge {
            from: "a".to_string(),
            to: "b".to_string(),
        }]
    );
}

#[test]
fn given_unrelated_members_when_layout_then_spread_evenly_below_virtual_root() {
    let members = vec![
        Member::new("a", "Ann"),
        Member::new("b", "Bob"),
        Member::new("c", "Cid"),
    ];
    let genogram = build_genogram(&members).unwrap();

    let result = layout(&genogram, &LayoutParams::default());

    let root = result.node("@family").unwrap();
    assert_eq!(root.kind, PlacedKind::VirtualRoot);
    let xs: Vec<f64> = ["a", "b", "c"]
        .iter()
        .map(|id| result.node(id).unwrap().x)
        .collect();
    for (x, expected) in xs.iter().zip([325.0, 600.0, 875.0]) {
        assert!((x - expected).abs() < EPS, "{x} != {expected}");
    }
}

#[test]
fn given_custom_params_when_layout_then_canvas_follows_them() {
    let genogram = build_genogram(&[Member::new("a", "Ann")]).unwrap();
    let params = LayoutParams {
        width: 600.0,
        node_size: 40.0,
        level_gap: 100.0,
        margin: Margin {
            top: 10.0,
            right: 50.0,
            bottom: 20.0,
            left: 50.0,
        },
    };

    let result = layout(&genogram, &params);

    let a = result.node("a").unwrap();
    assert!((a.x - 300.0).abs() < EPS);
    assert!((a.y - 10.0).abs() < EPS);
    assert!((result.height - 130.0).abs() < EPS);
    assert!((result.node_size - 40.0).abs() < EPS);
    assert_eq!(a.name.as_deref(), Some("Ann"));
}

#[test]
fn given_layout_when_serialized_then_json_carries_nodes_and_links() {
    let genogram = build_genogram(&shared_parents()).unwrap();

    let result = layout(&genogram, &LayoutParams::default());
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["spouse_links"][0]["from"], "a");
}
