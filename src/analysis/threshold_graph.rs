use std::collections::BTreeMap;

use crate::analysis::similarity::SimilarityMatrix;
use crate::job::term::JobTerm;
use crate::ontology::term::GOTermID;

// Display graph decoupled from the ontology: plain nodes and edges carrying
// string attribute maps, ready for XGMML or JS serialization.
#[derive(Debug, Clone, Default)]
pub struct OntoloGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: GOTermID,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub source: GOTermID,
    pub target: GOTermID,
    pub attributes: BTreeMap<String, String>,
}

fn zero_if_nan(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

fn numeric(value: f64) -> String {
    format!("{}", zero_if_nan(value))
}

// Keep only pairs of displayed terms whose similarity reaches the requested
// percentile of all displayed-pair similarities.
pub fn build_threshold_graph(
    terms: &[JobTerm],
    matrix: &SimilarityMatrix,
    cutoff: f64,
    percentile: f64,
) -> OntoloGraph {
    let displayed: Vec<usize> = (0..terms.len())
        .filter(|&index| terms[index].is_retained(cutoff) || terms[index].pinned)
        .collect();

    let mut pair_similarities: Vec<f64> = Vec::new();
    for (position, &i) in displayed.iter().enumerate() {
        for &j in displayed.iter().skip(position + 1) {
            let similarity = matrix.get(i, j);
            if !similarity.is_nan() {
                pair_similarities.push(similarity);
            }
        }
    }

    let mut graph = OntoloGraph::default();

    let threshold = if pair_similarities.is_empty() {
        None
    } else {
        let mut sorted = pair_similarities;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let position = ((sorted.len() as f64 * percentile).floor() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        Some(sorted[position])
    };

    if let Some(threshold) = threshold {
        for (position, &i) in displayed.iter().enumerate() {
            for &j in displayed.iter().skip(position + 1) {
                let similarity = matrix.get(i, j);
                if similarity.is_nan() || similarity < threshold {
                    continue;
                }
                let mut attributes = BTreeMap::new();
                attributes.insert("similarity".to_string(), format!("{}", similarity));
                graph.edges.push(GraphEdge {
                    source: terms[i].id,
                    target: terms[j].id,
                    attributes,
                });
            }
        }
    }

    for &index in &displayed {
        let term = &terms[index];
        let mut attributes = BTreeMap::new();
        attributes.insert("description".to_string(), term.name.clone());
        attributes.insert("value".to_string(), numeric(term.value));
        attributes.insert("LogSize".to_string(), numeric(term.log_annotation_size));
        attributes.insert("PC_1".to_string(), numeric(term.pc[0]));
        attributes.insert("PC_2".to_string(), numeric(term.pc[1]));
        attributes.insert("dispensability".to_string(), numeric(term.dispensability));
        attributes.insert("uniqueness".to_string(), numeric(term.uniqueness));
        graph.nodes.push(GraphNode {
            id: term.id,
            attributes,
        });
    }

    decorate_colors(&mut graph);
    decorate_thickness(&mut graph);

    graph
}

// Value ramp: negative values slide along the red row of the palette,
// positive ones along the green row.
fn decorate_colors(graph: &mut OntoloGraph) {
    let values: Vec<f64> = graph
        .nodes
        .iter()
        .filter_map(|node| node.attributes.get("value"))
        .filter_map(|value| value.parse::<f64>().ok())
        .collect();
    if values.is_empty() {
        return;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    for node in &mut graph.nodes {
        let value = node
            .attributes
            .get("value")
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.0);
        let scaled = if span > 0.0 {
            (((value - min) / span) * 255.0).round() as u8
        } else {
            128
        };
        let color = if value < 0.0 {
            format!("#ff{:02x}{:02x}", scaled, scaled)
        } else {
            format!("#{:02x}ff{:02x}", scaled, scaled)
        };
        node.attributes.insert("color".to_string(), color);
    }
}

// Edge similarities rescaled to the 1..5 stroke range.
fn decorate_thickness(graph: &mut OntoloGraph) {
    let similarities: Vec<f64> = graph
        .edges
        .iter()
        .filter_map(|edge| edge.attributes.get("similarity"))
        .filter_map(|value| value.parse::<f64>().ok())
        .collect();
    if similarities.is_empty() {
        return;
    }
    let min = similarities.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = similarities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    for edge in &mut graph.edges {
        let similarity = edge
            .attributes
            .get("similarity")
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(min);
        let thickness = if span > 0.0 {
            1.0 + 4.0 * (similarity - min) / span
        } else {
            3.0
        };
        edge.attributes
            .insert("thickness".to_string(), format!("{}", thickness));
    }
}
