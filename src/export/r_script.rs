use std::fmt::Write as FmtWrite;

use crate::job::term::JobTerm;
use crate::ontology::term::NameSpace;

fn quote_r(input: &str) -> String {
    format!("\"{}\"", input.replace('\\', "\\\\").replace('"', "\\\""))
}

fn r_number(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", value)
    }
}

// R script drawing the retained terms as a semantic-space scatterplot:
// embedding coordinates on the axes, bubble area from the annotation size,
// fill from the user's value.
pub fn scatterplot_r_script(terms: &[JobTerm], namespace: NameSpace, cutoff: f64) -> String {
    let retained: Vec<&JobTerm> = terms
        .iter()
        .filter(|term| term.is_retained(cutoff) || term.pinned)
        .collect();

    let mut script = String::with_capacity(4096);
    script.push_str("# A plotting script for the reduced GO term list.\n");
    script.push_str("# Requires: install.packages(\"ggplot2\")\n\n");
    script.push_str("library(ggplot2)\n\n");

    script.push_str("trimgo.data <- rbind(\n");
    for (index, term) in retained.iter().enumerate() {
        let _ = write!(
            script,
            "  c({}, {}, {}, {}, {}, {}, {})",
            quote_r(&term.formatted_id()),
            quote_r(&term.name),
            r_number(term.pc[0]),
            r_number(term.pc[1]),
            r_number(term.value),
            r_number(term.log_annotation_size),
            r_number(term.uniqueness)
        );
        script.push_str(if index + 1 < retained.len() { ",\n" } else { "\n" });
    }
    script.push_str(");\n\n");

    script.push_str(
        "colnames(trimgo.data) <- c(\"term_ID\", \"description\", \"PC_1\", \"PC_2\", \"value\", \"log_size\", \"uniqueness\");\n",
    );
    script.push_str("trimgo.df <- as.data.frame(trimgo.data, stringsAsFactors = FALSE);\n");
    script.push_str("for (col in c(\"PC_1\", \"PC_2\", \"value\", \"log_size\", \"uniqueness\")) {\n");
    script.push_str("  trimgo.df[[col]] <- as.numeric(trimgo.df[[col]]);\n");
    script.push_str("}\n\n");

    let _ = write!(
        script,
        "p <- ggplot(trimgo.df, aes(PC_1, PC_2)) +\n  geom_point(aes(colour = value, size = log_size), alpha = 0.6) +\n  scale_size(range = c(2, 12)) +\n  geom_text(aes(label = description), size = 3, check_overlap = TRUE, vjust = -1) +\n  labs(title = {}) +\n  theme_bw();\n\np;\n",
        quote_r(namespace.label())
    );
    script
}

// R script feeding the dispensed-term clusters into the treemap package;
// every rectangle sits inside its representative's tile.
pub fn treemap_r_script(terms: &[JobTerm], namespace: NameSpace, cutoff: f64) -> String {
    let mut script = String::with_capacity(4096);
    script.push_str("# A treemap of the reduced GO term list, one tile group per representative.\n");
    script.push_str("# Requires: install.packages(\"treemap\")\n\n");
    script.push_str("library(treemap)\n\n");

    let name_of = |id: u32| -> Option<&str> {
        terms
            .iter()
            .find(|term| term.id == id)
            .map(|term| term.name.as_str())
    };

    script.push_str("trimgo.data <- rbind(\n");
    let rows: Vec<String> = terms
        .iter()
        .filter(|term| term.is_retained(cutoff) || term.representative_id.is_some())
        .map(|term| {
            let group = term
                .representative_id
                .and_then(|id| name_of(id))
                .unwrap_or(&term.name);
            format!(
                "  c({}, {}, {}, {}, {})",
                quote_r(&term.formatted_id()),
                quote_r(&term.name),
                r_number(term.annotation_frequency),
                r_number(term.value),
                quote_r(group)
            )
        })
        .collect();
    script.push_str(&rows.join(",\n"));
    script.push_str("\n);\n\n");

    script.push_str(
        "colnames(trimgo.data) <- c(\"term_ID\", \"description\", \"frequency\", \"value\", \"representative\");\n",
    );
    script.push_str("trimgo.df <- as.data.frame(trimgo.data, stringsAsFactors = FALSE);\n");
    script.push_str("trimgo.df$frequency <- as.numeric(trimgo.df$frequency);\n\n");

    let _ = write!(
        script,
        "treemap(\n  trimgo.df,\n  index = c(\"representative\", \"description\"),\n  vSize = \"frequency\",\n  type = \"categorical\",\n  vColor = \"representative\",\n  title = {},\n  inflate.labels = FALSE,\n  lowerbound.cex.labels = 0,\n  position.legend = \"none\"\n);\n",
        quote_r(namespace.label())
    );
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::ontology::tests::small_ontology;

    fn fixture_terms() -> Vec<JobTerm> {
        let ontology = small_ontology();
        let mut kept = JobTerm::new(ontology.term(7049).unwrap());
        kept.value = -5.0;
        kept.pc = [0.5, -0.5];
        kept.log_annotation_size = 2.0;
        kept.uniqueness = 0.8;
        let mut dispensed = JobTerm::new(ontology.term(8283).unwrap());
        dispensed.dispensability = 0.9;
        dispensed.representative_id = Some(7049);
        dispensed.annotation_frequency = 0.01;
        vec![kept, dispensed]
    }

    #[test]
    fn scatterplot_script_lists_only_retained_terms() {
        let script = scatterplot_r_script(&fixture_terms(), NameSpace::BiologicalProcess, 0.7);
        assert!(script.contains("library(ggplot2)"));
        assert!(script.contains("GO:0007049"));
        assert!(!script.contains("GO:0008283"));
        assert!(script.contains("\"Biological Process\""));
    }

    #[test]
    fn treemap_script_groups_by_representative() {
        let script = treemap_r_script(&fixture_terms(), NameSpace::BiologicalProcess, 0.7);
        assert!(script.contains("library(treemap)"));
        assert!(script.contains("GO:0008283"));
        let row = script
            .lines()
            .find(|line| line.contains("GO:0008283"))
            .unwrap();
        assert!(row.contains("\"Cell cycle\""));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_r("a \"b\""), "\"a \\\"b\\\"\"");
        assert_eq!(r_number(f64::NAN), "NA");
    }
}
