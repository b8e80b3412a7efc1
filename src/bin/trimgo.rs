use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;

use TrimGO::analysis::similarity::SimilarityMeasure;
use TrimGO::analysis::word_summary::WordScore;
use TrimGO::export::r_script::{scatterplot_r_script, treemap_r_script};
use TrimGO::export::{js::graph_to_js, tsv::write_namespace_table, xgmml::graph_to_xgmml};
use TrimGO::job::{spawn_job, JobConfig, ProgressSink, ValueType};
use TrimGO::ontology::annotations::SpeciesAnnotations;
use TrimGO::ontology::Ontology;
use TrimGO::parsers::annotation_parser::{
    parse_uniprot_keywords, read_species_annotations, SpeciesDb,
};
use TrimGO::parsers::obo_parser::parse_obo_file;

#[derive(Parser, Debug)]
#[command(name = "trimgo", about, version, author)]
struct CliArgs {
    #[arg(
        short = 'o',
        long = "obo",
        value_name = "FILE",
        help = "Path to the Gene Ontology file in OBO format.",
        required = true
    )]
    obo_file: PathBuf,

    #[arg(
        short = 'a',
        long = "annotations",
        value_name = "FILE_OR_DIR",
        help = "Species annotation file, or a directory with one annotation file per taxon.",
        required = true
    )]
    annotation_path: PathBuf,

    #[arg(
        short = 't',
        long = "taxon",
        value_name = "TAXON_ID",
        help = "Taxon to use when the annotation path is a directory of species."
    )]
    taxon_id: Option<u32>,

    #[arg(
        short = 'i',
        long = "input",
        value_name = "FILE",
        help = "Term list: one GO id per line with an optional value and extra columns.",
        required = true
    )]
    input_file: PathBuf,

    #[arg(
        short = 'd',
        long = "dir",
        value_name = "DIRECTORY",
        help = "Directory to write the per-namespace tables and graphs.",
        required = true
    )]
    output_dir: PathBuf,

    #[arg(
        short = 'k',
        long = "keywords",
        value_name = "FILE",
        help = "Optional Uniprot keyword file used to enrich word summaries."
    )]
    keyword_file: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "cutoff",
        value_name = "THRESHOLD",
        help = "Dispensability cutoff; quantized to 0.4, 0.5, 0.7 or 0.9.",
        default_value_t = 0.7
    )]
    cutoff: f64,

    #[arg(
        short = 's',
        long = "similarity",
        value_enum,
        help = "Semantic similarity measure.",
        default_value_t = SimilarityMeasure::SimRel
    )]
    similarity: SimilarityMeasure,

    #[arg(
        short = 'v',
        long = "value-type",
        value_enum,
        help = "Interpretation of the second input column.",
        default_value_t = ValueType::PValue
    )]
    value_type: ValueType,

    #[arg(
        long = "remove-obsolete",
        help = "Drop obsolete input terms instead of redirecting them."
    )]
    remove_obsolete: bool,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help = "Wall-clock budget for the job; unlimited when omitted."
    )]
    timeout_secs: Option<u64>,

    #[arg(
        long = "cores",
        value_name = "NUMBER",
        help = "Number of cores used for the similarity matrix. Uses all available by default.",
        default_value_t = num_cpus::get()
    )]
    num_cores: usize,
}

struct ConsoleProgress {
    last: Mutex<f64>,
}

impl ConsoleProgress {
    fn new() -> Self {
        ConsoleProgress {
            last: Mutex::new(-10.0),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, percent: f64, message: &str) {
        let mut last = self.last.lock();
        if percent - *last >= 10.0 || percent >= 100.0 {
            *last = percent;
            println!("  {:>3.0}% {}", percent, message);
        }
    }
}

fn load_annotations(cli_args: &CliArgs, ontology: &Ontology) -> std::io::Result<SpeciesAnnotations> {
    if !cli_args.annotation_path.is_dir() {
        return read_species_annotations(&cli_args.annotation_path, ontology);
    }

    let mut db = SpeciesDb::read_species_db(&cli_args.annotation_path, ontology)?;
    match cli_args.taxon_id {
        Some(taxon_id) => db.take(taxon_id).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no annotations for taxon {} in the species directory", taxon_id),
            )
        }),
        None => {
            if db.len() > 1 {
                eprintln!("The species directory holds several taxa; pass --taxon to pick one:");
                for (taxon_id, name) in db.taxa() {
                    eprintln!("  {:>8}  {}", taxon_id, name);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "ambiguous species directory",
                ));
            }
            db.into_single().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no species could be loaded")
            })
        }
    }
}

fn write_word_list(path: PathBuf, scores: &[WordScore]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "word\tscore")?;
    for score in scores {
        writeln!(file, "{}\t{:.4}", score.word, score.score)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    println!("\nAnalysis will be performed with {} core(s)", cli_args.num_cores);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(cli_args.num_cores)
        .build_global()
    {
        eprintln!("Failed to initialize Rayon global thread pool: {:?}", e);
    }

    println!(
        "\nReading ontology information from: {}",
        cli_args.obo_file.to_string_lossy()
    );
    let obo = match parse_obo_file(&cli_args.obo_file) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("\nError processing OBO file:");
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut ontology = match Ontology::from_obo(obo) {
        Ok(ontology) => ontology,
        Err(e) => {
            eprintln!("\nError building the ontology:");
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("Successfully loaded {} GO terms", ontology.len());
    if let Some(version) = ontology.data_version {
        println!("Ontology release: {}", version);
    }

    if let Some(keyword_file) = &cli_args.keyword_file {
        match parse_uniprot_keywords(keyword_file) {
            Ok(keywords) => {
                println!("Attached keywords for {} GO terms", keywords.len());
                ontology.augment_keywords(keywords);
            }
            Err(e) => {
                eprintln!("Error reading keyword file: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!(
        "\nReading species annotations from: {}",
        cli_args.annotation_path.to_string_lossy()
    );
    let annotations = match load_annotations(&cli_args, &ontology) {
        Ok(annotations) => {
            println!(
                "Loaded annotations for {} (taxon {})",
                annotations.species_name, annotations.taxon_id
            );
            annotations
        }
        Err(e) => {
            eprintln!("Error reading species annotations: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let input = match fs::read_to_string(&cli_args.input_file) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error reading the input term list: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = JobConfig {
        cutoff: cli_args.cutoff,
        value_type: cli_args.value_type,
        measure: cli_args.similarity,
        remove_obsolete: cli_args.remove_obsolete,
        timeout: cli_args.timeout_secs.map(Duration::from_secs),
        ..JobConfig::default()
    };

    println!("\nReducing the submitted term list\n");
    let handle = spawn_job(
        input,
        Arc::new(ontology),
        Arc::new(annotations),
        config,
        Arc::new(ConsoleProgress::new()),
    );
    let job = handle.wait();

    for warning in &job.report.user_warnings {
        eprintln!("Warning: {}", warning);
    }
    for warning in &job.report.developer_warnings {
        eprintln!("Note: {}", warning);
    }
    for error in &job.report.user_errors {
        eprintln!("Error: {}", error);
    }

    if job.report.has_user_errors() {
        return ExitCode::FAILURE;
    }

    if let Err(e) = fs::create_dir_all(&cli_args.output_dir) {
        eprintln!("Error creating output directory: {}", e);
        return ExitCode::FAILURE;
    }

    for view in &job.views {
        if view.terms.is_empty() {
            continue;
        }
        let label = view.namespace.short_label().to_lowercase();

        if let Err(e) = write_namespace_table(&view.terms, view.namespace, &cli_args.output_dir) {
            eprintln!("Error writing the {} term table: {}", label, e);
            return ExitCode::FAILURE;
        }

        let xgmml = graph_to_xgmml(&view.graph, view.namespace.label());
        if let Err(e) = fs::write(
            cli_args.output_dir.join(format!("{}_graph.xgmml", label)),
            xgmml,
        ) {
            eprintln!("Error writing the {} XGMML graph: {}", label, e);
            return ExitCode::FAILURE;
        }

        let script = graph_to_js(&view.graph, &format!("{}TermGraph", label));
        if let Err(e) = fs::write(
            cli_args.output_dir.join(format!("{}_graph.js", label)),
            script,
        ) {
            eprintln!("Error writing the {} JS graph: {}", label, e);
            return ExitCode::FAILURE;
        }

        let cutoff = job.config.quantized_cutoff();
        let scatter = scatterplot_r_script(&view.terms, view.namespace, cutoff);
        let treemap = treemap_r_script(&view.terms, view.namespace, cutoff);
        for (suffix, content) in [("scatter", scatter), ("treemap", treemap)] {
            if let Err(e) = fs::write(
                cli_args.output_dir.join(format!("{}_{}.R", label, suffix)),
                content,
            ) {
                eprintln!("Error writing the {} {} script: {}", label, suffix, e);
                return ExitCode::FAILURE;
            }
        }

        println!(
            "{}: {} terms, {} retained",
            view.namespace.label(),
            view.terms.len(),
            view.retained_count(job.config.quantized_cutoff())
        );
    }

    if let Err(e) = write_word_list(
        cli_args.output_dir.join("word_enrichment.tsv"),
        &job.enrichment,
    ) {
        eprintln!("Error writing word enrichment: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = write_word_list(
        cli_args.output_dir.join("word_correlation.tsv"),
        &job.correlation,
    ) {
        eprintln!("Error writing word correlation: {}", e);
        return ExitCode::FAILURE;
    }

    println!(
        "\nFinished; results written to {}\n",
        cli_args.output_dir.to_string_lossy()
    );
    ExitCode::SUCCESS
}
