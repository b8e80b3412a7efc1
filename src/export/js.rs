use serde_json::{json, Map, Value};

use crate::analysis::threshold_graph::OntoloGraph;

fn attribute_value(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(number) if number.is_finite() => json!(number),
        _ => Value::String(raw.to_string()),
    }
}

// Compact object literal for in-browser rendering: numeric attributes stay
// numbers, everything else a string. Attribute names are emitted exactly as
// stored on the graph.
pub fn graph_to_js(graph: &OntoloGraph, variable_name: &str) -> String {
    let nodes: Vec<Value> = graph
        .nodes
        .iter()
        .map(|node| {
            let mut object = Map::new();
            object.insert("id".to_string(), json!(format!("GO:{:07}", node.id)));
            for (name, value) in &node.attributes {
                object.insert(name.clone(), attribute_value(value));
            }
            Value::Object(object)
        })
        .collect();

    let edges: Vec<Value> = graph
        .edges
        .iter()
        .map(|edge| {
            let mut object = Map::new();
            object.insert("source".to_string(), json!(format!("GO:{:07}", edge.source)));
            object.insert("target".to_string(), json!(format!("GO:{:07}", edge.target)));
            for (name, value) in &edge.attributes {
                object.insert(name.clone(), attribute_value(value));
            }
            Value::Object(object)
        })
        .collect();

    let document = json!({ "nodes": nodes, "edges": edges });
    format!("var {} = {};\n", variable_name, document)
}
