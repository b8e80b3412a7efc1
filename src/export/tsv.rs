use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Result, Write};
use std::path::Path;

use crate::job::term::JobTerm;
use crate::ontology::term::NameSpace;

const BUFFER_SIZE: usize = 8192 * 32;

fn field(value: f64) -> String {
    if value.is_nan() {
        "null".to_string()
    } else {
        format!("{:.6}", value)
    }
}

// One row per term in the order produced by the pipeline, retained terms and
// dispensed ones alike so downstream tooling can re-filter at any cutoff.
pub fn write_namespace_table(
    terms: &[JobTerm],
    namespace: NameSpace,
    output_dir: &Path,
) -> Result<()> {
    create_dir_all(output_dir)?;
    let filename = output_dir.join(format!(
        "{}_terms.tsv",
        namespace.short_label().to_lowercase()
    ));
    let file = File::create(filename)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

    writeln!(
        writer,
        "term_ID\tdescription\tfrequency\tvalue\tuniqueness\tdispensability\trepresentative\tPC_1\tPC_2\tPC3_1\tPC3_2\tPC3_3\tlog_size\teliminated"
    )?;

    for term in terms {
        let representative = term
            .representative_id
            .map(|id| format!("GO:{:07}", id))
            .unwrap_or_else(|| "null".to_string());
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            term.formatted_id(),
            term.name,
            field(term.annotation_frequency),
            field(term.value),
            field(term.uniqueness),
            field(term.dispensability),
            representative,
            field(term.pc[0]),
            field(term.pc[1]),
            field(term.pc3[0]),
            field(term.pc3[1]),
            field(term.pc3[2]),
            field(term.log_annotation_size),
            if term.representative_id.is_some() { 1 } else { 0 },
        )?;
    }

    writer.flush()
}
