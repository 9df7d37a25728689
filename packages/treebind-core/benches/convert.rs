use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use treebind_core::{Binding, DomId, DomTree, MemoryDom, SharedDoc};

const DEFAULT_COUNTS: &[u64] = &[100, 1_000, 10_000];

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Sample {
    workload: &'static str,
    count: u64,
    total_nodes: u64,
    duration_ms: f64,
    timestamp: String,
}

/// `count` paragraphs, each holding one text node, under a single container.
fn build_dom(count: u64) -> (MemoryDom, DomId) {
    let mut dom = MemoryDom::new();
    let body = dom.create_element("body");
    for i in 0..count {
        let index = i.to_string();
        let p = dom.element_with("p", &[("data-index", index.as_str())]);
        let text = dom.create_text("lorem ipsum");
        dom.append_child(p, text).expect("append text");
        dom.append_child(body, p).expect("append paragraph");
    }
    (dom, body)
}

fn run_benchmark(count: u64) -> f64 {
    let (mut dom, body) = build_dom(count);
    let mut doc = SharedDoc::new();
    let root = doc.root();
    let mut binding = Binding::new();

    let start = Instant::now();
    let items = binding
        .populate(&mut dom, &mut doc, body, root)
        .expect("populate");
    // then splice one extra node after every existing one
    for item in items {
        let extra = dom.create_text("x");
        binding
            .insert_node_after(&mut dom, &mut doc, root, Some(item), extra)
            .expect("insert");
    }
    start.elapsed().as_secs_f64() * 1000.0
}

/// Usage: `convert [COUNT,...] [--out=PATH]`. Prints one JSON array and optionally writes it.
fn main() {
    let mut counts = DEFAULT_COUNTS.to_vec();
    let mut out: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        match arg.strip_prefix("--out=") {
            Some(path) => out = Some(PathBuf::from(path)),
            None => counts = arg.split(',').filter_map(|c| c.trim().parse().ok()).collect(),
        }
    }

    let samples: Vec<Sample> = counts
        .into_iter()
        .map(|count| Sample {
            workload: "populate-splice",
            count,
            // each paragraph is two nodes, plus one spliced text node per paragraph
            total_nodes: count * 3,
            duration_ms: run_benchmark(count),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
        .collect();

    let json = serde_json::to_string_pretty(&samples).expect("serialize");
    if let Some(path) = out {
        fs::write(&path, &json).expect("write output");
    }
    println!("{json}");
}
