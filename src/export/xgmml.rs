use std::fmt::Write as FmtWrite;

use crate::analysis::threshold_graph::OntoloGraph;

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn att_type(value: &str) -> &'static str {
    if value.parse::<f64>().is_ok() {
        "real"
    } else {
        "string"
    }
}

// Cytoscape-compatible XGMML. Node attributes keep their display names
// except LogSize, which Cytoscape sessions expect as log_size; edges carry
// their similarity twice, once under the legacy weight attribute.
pub fn graph_to_xgmml(graph: &OntoloGraph, label: &str) -> String {
    let mut document = String::with_capacity(4096);
    document.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        document,
        "<graph label=\"{}\" xmlns=\"http://www.cs.rpi.edu/XGMML\" directed=\"0\">",
        escape_xml(label)
    );

    for node in &graph.nodes {
        let _ = writeln!(
            document,
            "  <node id=\"{}\" label=\"GO:{:07}\">",
            node.id, node.id
        );
        for (name, value) in &node.attributes {
            let written_name = if name == "LogSize" { "log_size" } else { name };
            let _ = writeln!(
                document,
                "    <att name=\"{}\" value=\"{}\" type=\"{}\"/>",
                escape_xml(written_name),
                escape_xml(value),
                att_type(value)
            );
        }
        document.push_str("  </node>\n");
    }

    for edge in &graph.edges {
        let _ = writeln!(
            document,
            "  <edge source=\"{}\" target=\"{}\">",
            edge.source, edge.target
        );
        for (name, value) in &edge.attributes {
            let _ = writeln!(
                document,
                "    <att name=\"{}\" value=\"{}\" type=\"{}\"/>",
                escape_xml(name),
                escape_xml(value),
                att_type(value)
            );
        }
        if let Some(similarity) = edge.attributes.get("similarity") {
            let _ = writeln!(
                document,
                "    <att name=\"weight\" value=\"{}\" type=\"real\"/>",
                escape_xml(similarity)
            );
        }
        document.push_str("  </edge>\n");
    }

    document.push_str("</graph>\n");
    document
}
