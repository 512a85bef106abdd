//! Integration tests for the graph engine

use planx_graph::{
    add, apply_ops, clone_node, format_ops, invert, make_unique, move_node, remove, update,
    CloneOptions, ComponentType, ErrorKind, Graph, IdGenerator, MoveOptions, MutationError,
    NewNode, NodeData, Op, RandomIds, Relationships, SequentialIds, UpdateOptions, ROOT_NODE_KEY,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

fn graph(value: Value) -> Graph {
    Graph::from_value(value).unwrap()
}

fn data(value: Value) -> Option<NodeData> {
    value.as_object().cloned()
}

/// Forward ops rebuild `after` from `before`; inverted ops rebuild `before` from `after`
fn assert_round_trip(before: &Graph, after: &Graph, ops: &[Op]) {
    assert_eq!(&before.apply_ops(ops).unwrap(), after, "forward ops: {:?}", ops);
    assert_eq!(&after.apply_ops(&invert(ops)).unwrap(), before, "inverse ops: {:?}", ops);
}

fn assert_invariants(graph: &Graph) {
    assert!(!graph.is_cyclic(), "cycle in {:?}", graph.to_value());
    assert!(
        graph.unreachable_ids().is_empty(),
        "unreachable {:?} in {:?}",
        graph.unreachable_ids(),
        graph.to_value()
    );

    for (id, node) in graph.iter() {
        let mut edges = node.edges().to_vec();
        edges.sort();
        edges.dedup();
        assert_eq!(edges.len(), node.edges().len(), "duplicate edges on {}", id);

        if node.is_type(ComponentType::Section) {
            assert!(!graph.is_clone(id), "section {} is shared", id);
            let parent = graph.parents_of(id)[0];
            assert!(graph.is_valid_section_position(parent), "section {} under {}", id, parent);
            assert!(
                parent == ROOT_NODE_KEY || !graph.is_clone(parent),
                "section {} under shared folder {}",
                id,
                parent
            );
        }
        if node.is_type(ComponentType::ExternalPortal) {
            assert!(!graph.is_clone(id), "external portal {} is shared", id);
        }
    }
}

#[test]
fn test_question_then_answer() -> anyhow::Result<()> {
    let mut ids = SequentialIds::new("n");
    let g0 = Graph::new();

    let (g1, ops1) = add(
        &g0,
        NewNode::new(Some(100), data(json!({ "text": "Q1" }))),
        Relationships::under(ROOT_NODE_KEY),
        &mut ids,
    )?;
    let q1 = g1.edges(ROOT_NODE_KEY)[0].clone();

    let (g2, ops2) = add(
        &g1,
        NewNode::new(Some(200), data(json!({ "text": "A" }))),
        Relationships::under(q1.as_str()),
        &mut ids,
    )?;

    assert_eq!(g2.len(), 3);
    assert_eq!(g2.edges(ROOT_NODE_KEY).len(), 1);
    assert_eq!(g2.edges(&q1).len(), 1);

    let mut lines = format_ops(&g1, &ops1);
    lines.extend(format_ops(&g2, &ops2));
    assert_eq!(lines, vec![r#"Added Question "Q1""#, r#"Added Answer "A""#]);

    assert_round_trip(&g0, &g1, &ops1);
    assert_round_trip(&g1, &g2, &ops2);
    Ok(())
}

#[test]
fn test_clone_survives_until_last_parent_goes() -> anyhow::Result<()> {
    let g0 = graph(json!({
        "_root": { "edges": ["z", "y"] },
        "z": { "type": 100, "edges": ["x"] },
        "y": { "type": 100 },
        "x": { "type": 200, "edges": ["x1"] },
        "x1": { "type": 8 },
    }));

    let (g1, ops) = clone_node(&g0, "x", CloneOptions { to_parent: Some("y".into()), to_before: None })?;
    assert_eq!(g1.number_of_edges_to("x"), 2);
    assert!(g1.is_clone("x"));
    assert_round_trip(&g0, &g1, &ops);

    let (g2, ops) = remove(&g1, "x", "z")?;
    assert!(g2.contains("x"));
    assert!(g2.contains("x1"));
    assert_eq!(g2.edges("y"), ["x"]);
    assert_eq!(g2.get("z").unwrap().edges, None);
    assert_round_trip(&g1, &g2, &ops);

    let (g3, ops) = remove(&g2, "x", "y")?;
    assert!(!g3.contains("x"));
    assert!(!g3.contains("x1"));
    assert_invariants(&g3);
    assert_round_trip(&g2, &g3, &ops);
    Ok(())
}

#[test]
fn test_section_cannot_move_below_nested_node() {
    let g = graph(json!({
        "_root": { "edges": ["s", "q"] },
        "s": { "type": 360 },
        "q": { "type": 100, "edges": ["folder"] },
        "folder": { "type": 300 },
    }));

    let err = move_node(&g, "s", ROOT_NODE_KEY, MoveOptions { to_parent: Some("folder".into()), to_before: None })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStructure);
    assert!(matches!(err, MutationError::InvalidSectionPlacement { .. }));
}

#[test]
fn test_update_replaces_children() -> anyhow::Result<()> {
    let g0 = graph(json!({
        "_root": { "edges": ["q"] },
        "q": { "type": 100, "data": { "text": "Q" }, "edges": ["c0"] },
        "c0": { "type": 200, "edges": ["deep"] },
        "deep": { "type": 8 },
    }));
    let mut ids = SequentialIds::new("u");

    let options = UpdateOptions {
        children: Some(vec![NewNode::new(None, data(json!({ "text": "x" }))).with_id("c1")]),
        remove_key_if_missing: true,
    };
    let (g1, ops) = update(&g0, "q", NodeData::new(), options, &mut ids)?;

    assert_eq!(g1.edges("q"), ["c1"]);
    assert!(!g1.contains("c0"));
    assert!(!g1.contains("deep"));
    assert_eq!(g1.get("c1").unwrap().data, data(json!({ "text": "x" })));
    // Empty data with remove_key_if_missing clears the payload
    assert_eq!(g1.get("q").unwrap().data, None);

    assert_invariants(&g1);
    assert_round_trip(&g0, &g1, &ops);
    Ok(())
}

#[test]
fn test_ops_only_commute_in_issued_order() -> anyhow::Result<()> {
    let g0 = graph(json!({ "_root": { "edges": ["a"] }, "a": {} }));
    let mut ids = SequentialIds::new("c");

    let (g1, ops_b) = add(&g0, NewNode::default().with_id("b"), Relationships::default(), &mut ids)?;
    let (g2, ops_c) = add(&g1, NewNode::default().with_id("c"), Relationships::default(), &mut ids)?;

    let edge_paths: Vec<_> = ops_b
        .iter()
        .chain(&ops_c)
        .filter(|op| op.li.is_some())
        .map(|op| serde_json::to_value(&op.p).unwrap())
        .collect();
    assert_eq!(edge_paths, vec![json!(["_root", "edges", 1]), json!(["_root", "edges", 2])]);

    let mut doc = g0.to_value();
    apply_ops(&mut doc, &ops_b)?;
    apply_ops(&mut doc, &ops_c)?;
    assert_eq!(doc, g2.to_value());

    // Out of order, the second insert points past the end of the list
    let mut doc = g0.to_value();
    assert!(apply_ops(&mut doc, &ops_c).is_err());

    // Two edits issued against the same snapshot land differently depending on order
    let (_, ops_d) = add(&g0, NewNode::default().with_id("d"), Relationships::default(), &mut ids)?;
    let bd = g0.apply_ops(&ops_b)?.apply_ops(&ops_d)?;
    let db = g0.apply_ops(&ops_d)?.apply_ops(&ops_b)?;
    assert_eq!(bd.edges(ROOT_NODE_KEY), ["a", "d", "b"]);
    assert_eq!(db.edges(ROOT_NODE_KEY), ["a", "b", "d"]);
    Ok(())
}

#[test]
fn test_same_call_same_result() -> anyhow::Result<()> {
    let g0 = graph(json!({
        "_root": { "edges": ["a", "b"] },
        "a": { "edges": ["shared"] },
        "b": { "edges": ["shared"] },
        "shared": { "edges": ["leaf"] },
        "leaf": {},
    }));

    let first = make_unique(&g0, "shared", "b", &mut SequentialIds::new("d"))?;
    let second = make_unique(&g0, "shared", "b", &mut SequentialIds::new("d"))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_failed_mutations_do_not_touch_snapshot() {
    let g = graph(json!({
        "_root": { "edges": ["a"] },
        "a": { "edges": ["b"] },
        "b": {},
    }));
    let snapshot = g.to_value();

    assert_eq!(
        move_node(&g, "a", ROOT_NODE_KEY, MoveOptions { to_parent: Some("b".into()), to_before: None }),
        Err(MutationError::CycleDetected)
    );
    assert_eq!(
        clone_node(&g, "a", CloneOptions { to_parent: Some("b".into()), to_before: None }),
        Err(MutationError::CycleDetected)
    );
    assert_eq!(g.to_value(), snapshot);
}

#[test]
fn test_diff_is_serialisable_for_the_wire() -> anyhow::Result<()> {
    let g0 = graph(json!({ "_root": { "edges": ["a"] }, "a": { "data": { "text": "old" } } }));
    let (_, ops) = update(
        &g0,
        "a",
        json!({ "text": "new" }).as_object().cloned().unwrap_or_default(),
        UpdateOptions::default(),
        &mut SequentialIds::new("w"),
    )?;

    let wire = serde_json::to_string(&ops)?;
    assert_eq!(wire, r#"[{"p":["a","data","text"],"oi":"new","od":"old"}]"#);

    let back: Vec<Op> = serde_json::from_str(&wire)?;
    assert_eq!(back, ops);
    Ok(())
}

fn pick(rng: &mut StdRng, from: &[String]) -> Option<String> {
    from.choose(rng).cloned()
}

/// A random `(parent, child)` edge
fn edge(rng: &mut StdRng, graph: &Graph) -> Option<(String, String)> {
    let parents: Vec<&str> = graph
        .iter()
        .filter(|(_, node)| !node.edges().is_empty())
        .map(|(id, _)| id)
        .collect();
    let parent = *parents.choose(rng)?;
    let child = graph.edges(parent).choose(rng)?;
    Some((parent.to_string(), child.clone()))
}

/// A random edge whose child has no children of its own
fn leaf_edge(rng: &mut StdRng, graph: &Graph) -> Option<(String, String)> {
    let leaves: Vec<(String, String)> = graph
        .iter()
        .flat_map(|(parent, node)| {
            node.edges()
                .iter()
                .filter(move |child| graph.edges(child.as_str()).is_empty())
                .map(move |child| (parent.to_string(), child.clone()))
        })
        .collect();
    leaves.choose(rng).cloned()
}

/// A sibling in `parent` to insert in front of, never `id` itself
fn sibling(rng: &mut StdRng, graph: &Graph, parent: &str, id: &str) -> Option<String> {
    let siblings: Vec<String> = graph.edges(parent).iter().filter(|edge| *edge != id).cloned().collect();
    pick(rng, &siblings).filter(|_| rng.gen_bool(0.5))
}

/// A replacement child list for `id`: most current children in shuffled order, sometimes
/// a new option, an existing node linked in, or a repeated entry
fn requested_children(rng: &mut StdRng, graph: &Graph, id: &str, step: usize) -> Vec<NewNode> {
    let mut children: Vec<NewNode> = Vec::new();
    for child in graph.edges(id) {
        if rng.gen_bool(0.8) {
            let data = graph.get(child).and_then(|node| node.data.clone());
            children.push(NewNode::new(None, data).with_id(child.as_str()));
        }
    }
    children.shuffle(rng);

    if rng.gen_bool(0.5) {
        children.push(NewNode::new(Some(200), data(json!({ "text": format!("option {}", step) }))));
    }
    if rng.gen_bool(0.3) {
        let existing: Vec<String> = graph
            .ids()
            .filter(|other| *other != ROOT_NODE_KEY)
            .map(str::to_string)
            .collect();
        if let Some(existing) = pick(rng, &existing) {
            children.push(NewNode::default().with_id(existing));
        }
    }
    if rng.gen_bool(0.05) {
        if let Some(first) = children.first().cloned() {
            children.push(first);
        }
    }

    children
}

/// Drive a long random edit session and check every accepted edit
#[test]
fn test_random_edit_session_keeps_invariants() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut rng = StdRng::seed_from_u64(2024);
    let mut ids = RandomIds::seeded(7);
    let mut current = Graph::new();
    let types = [100u16, 200, 8, 300, 310];

    for step in 0..400 {
        let node_ids: Vec<String> = current.ids().map(str::to_string).collect();
        let non_root: Vec<String> = node_ids.iter().filter(|id| *id != ROOT_NODE_KEY).cloned().collect();

        let result = match rng.gen_range(0..100) {
            0..=29 => {
                let parent = pick(&mut rng, &node_ids).unwrap_or_else(|| ROOT_NODE_KEY.to_string());
                let before = current.edges(&parent).choose(&mut rng).cloned().filter(|_| rng.gen_bool(0.3));
                let node = NewNode::new(
                    Some(*types.choose(&mut rng).unwrap()),
                    data(json!({ "text": format!("step {}", step) })),
                );
                let relationships = Relationships { parent: Some(parent), before };
                add(&current, node, relationships, &mut ids)
            }
            30..=37 => {
                // Sections go on root or into a folder, which may itself be nested
                let folders: Vec<String> = current
                    .iter()
                    .filter(|(_, node)| node.is_type(ComponentType::InternalPortal))
                    .map(|(id, _)| id.to_string())
                    .collect();
                let parent = match pick(&mut rng, &folders) {
                    Some(folder) if rng.gen_bool(0.6) => folder,
                    _ => ROOT_NODE_KEY.to_string(),
                };
                let node = NewNode::new(Some(360), data(json!({ "title": format!("section {}", step) })));
                add(&current, node, Relationships::under(parent), &mut ids)
            }
            38..=47 => match (pick(&mut rng, &non_root), pick(&mut rng, &node_ids)) {
                (Some(id), Some(to_parent)) => {
                    let to_before = sibling(&mut rng, &current, &to_parent, &id);
                    clone_node(&current, &id, CloneOptions { to_parent: Some(to_parent), to_before })
                }
                _ => continue,
            },
            48..=62 => match (edge(&mut rng, &current), pick(&mut rng, &node_ids)) {
                (Some((parent, id)), Some(to_parent)) => {
                    let to_before = sibling(&mut rng, &current, &to_parent, &id);
                    move_node(&current, &id, &parent, MoveOptions { to_parent: Some(to_parent), to_before })
                }
                _ => continue,
            },
            63..=70 => {
                let target = if rng.gen_bool(0.8) {
                    leaf_edge(&mut rng, &current)
                } else {
                    edge(&mut rng, &current)
                };
                match target {
                    Some((parent, id)) => remove(&current, &id, &parent),
                    None => continue,
                }
            }
            71..=80 => match pick(&mut rng, &non_root) {
                Some(id) => update(
                    &current,
                    &id,
                    json!({ "text": format!("edited {}", step), "title": "" }).as_object().cloned().unwrap_or_default(),
                    UpdateOptions { children: None, remove_key_if_missing: rng.gen_bool(0.5) },
                    &mut ids,
                ),
                None => continue,
            },
            81..=90 => match pick(&mut rng, &node_ids) {
                Some(id) => {
                    let children = requested_children(&mut rng, &current, &id, step);
                    let data = current.get(&id).and_then(|node| node.data.clone()).unwrap_or_default();
                    update(
                        &current,
                        &id,
                        data,
                        UpdateOptions { children: Some(children), remove_key_if_missing: true },
                        &mut ids,
                    )
                }
                None => continue,
            },
            _ => match edge(&mut rng, &current) {
                Some((parent, id)) => make_unique(&current, &id, &parent, &mut ids),
                None => continue,
            },
        };

        match result {
            Ok((next, ops)) => {
                assert_invariants(&next);
                assert_round_trip(&current, &next, &ops);
                current = next;
            }
            Err(err) => {
                // Rejected edits are structural, never stale ids
                assert_eq!(err.kind(), ErrorKind::InvalidStructure, "step {}: {}", step, err);
            }
        }
    }

    assert!(current.len() > 1);
}

#[test]
fn test_closure_id_generator() -> anyhow::Result<()> {
    let mut counter = 0;
    let mut next = || {
        counter += 1;
        format!("fn-{}", counter)
    };
    let ids: &mut dyn IdGenerator = &mut next;

    let (g, _) = add(&Graph::new(), NewNode::default(), Relationships::default(), ids)?;
    assert!(g.contains("fn-1"));
    Ok(())
}
