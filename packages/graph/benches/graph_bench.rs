use criterion::{black_box, criterion_group, criterion_main, Criterion};
use planx_graph::{
    add, format_ops, remove, Graph, NewNode, Relationships, SequentialIds, ROOT_NODE_KEY,
};
use serde_json::json;

/// A flow of `questions` questions with `answers` answers each, every answer leading to a
/// shared notice
fn generate_flow(questions: usize, answers: usize) -> Graph {
    let mut nodes = serde_json::Map::new();
    let mut root_edges = Vec::new();

    nodes.insert("notice".into(), json!({ "type": 8, "data": { "title": "Shared" } }));

    for q in 0..questions {
        let question = format!("q{}", q);
        let mut edges = Vec::new();

        for a in 0..answers {
            let answer = format!("q{}a{}", q, a);
            nodes.insert(
                answer.clone(),
                json!({ "type": 200, "data": { "text": format!("Answer {}", a) }, "edges": ["notice"] }),
            );
            edges.push(answer);
        }

        nodes.insert(
            question.clone(),
            json!({ "type": 100, "data": { "text": format!("Question {}", q) }, "edges": edges }),
        );
        root_edges.push(question);
    }

    nodes.insert(ROOT_NODE_KEY.into(), json!({ "edges": root_edges }));
    Graph::from_value(serde_json::Value::Object(nodes)).unwrap()
}

fn bench_is_cyclic(c: &mut Criterion) {
    let graph = generate_flow(500, 4);

    c.bench_function("is_cyclic_2500_nodes", |b| {
        b.iter(|| black_box(&graph).is_cyclic())
    });
}

fn bench_sort_ids_depth_first(c: &mut Criterion) {
    let graph = generate_flow(500, 4);
    let ids: Vec<String> = graph.ids().step_by(7).map(str::to_string).collect();

    c.bench_function("sort_ids_depth_first_cold", |b| {
        b.iter(|| {
            // A fresh snapshot has no cached order
            let graph = graph.clone();
            graph.sort_ids_depth_first(black_box(&ids))
        })
    });

    let _ = graph.depth_first_order();
    c.bench_function("sort_ids_depth_first_cached", |b| {
        b.iter(|| graph.sort_ids_depth_first(black_box(&ids)))
    });
}

fn bench_add(c: &mut Criterion) {
    let graph = generate_flow(500, 4);

    c.bench_function("add_question_to_large_flow", |b| {
        b.iter(|| {
            let mut ids = SequentialIds::new("bench");
            let node = NewNode::new(Some(100), json!({ "text": "New" }).as_object().cloned())
                .with_children(vec![NewNode::new(Some(200), json!({ "text": "Yes" }).as_object().cloned())]);
            add(black_box(&graph), node, Relationships::default(), &mut ids).unwrap()
        })
    });
}

fn bench_remove_and_summarise(c: &mut Criterion) {
    let graph = generate_flow(500, 4);

    c.bench_function("remove_question_and_format_ops", |b| {
        b.iter(|| {
            let (next, ops) = remove(black_box(&graph), "q250", ROOT_NODE_KEY).unwrap();
            format_ops(&next, &ops)
        })
    });
}

criterion_group!(
    benches,
    bench_is_cyclic,
    bench_sort_ids_depth_first,
    bench_add,
    bench_remove_and_summarise
);
criterion_main!(benches);
