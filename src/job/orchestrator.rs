use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::word_summary::{word_correlation, word_enrichment, WordScore};
use crate::job::cancel::CancelToken;
use crate::job::config::{JobConfig, ValueType, MAX_TERMS_PER_NAMESPACE};
use crate::job::errors::{JobError, JobReport};
use crate::job::progress::{ProgressSink, StageProgress};
use crate::job::term::JobTerm;
use crate::job::visualizer::NamespaceView;
use crate::ontology::annotations::SpeciesAnnotations;
use crate::ontology::term::{GOTermID, NameSpace};
use crate::ontology::Ontology;
use crate::parsers::term_list_parser::parse_term_list;

// Namespaces run in this fixed order; the mixed word summaries follow.
pub const NAMESPACE_ORDER: [NameSpace; 3] = [
    NameSpace::BiologicalProcess,
    NameSpace::CellularComponent,
    NameSpace::MolecularFunction,
];

const P_VALUE_FLOOR: f64 = 1e-300;
const NON_SIGNIFICANT_P_VALUE: f64 = 0.5;

#[derive(Debug)]
pub struct Job {
    pub config: JobConfig,
    pub views: Vec<NamespaceView>,
    pub enrichment: Vec<WordScore>,
    pub correlation: Vec<WordScore>,
    pub report: JobReport,
    pub finished: bool,
}

impl Job {
    fn empty(config: JobConfig, report: JobReport) -> Self {
        Job {
            config,
            views: Vec::new(),
            enrichment: Vec::new(),
            correlation: Vec::new(),
            report,
            finished: true,
        }
    }

    pub fn all_terms(&self) -> Vec<&JobTerm> {
        self.views.iter().flat_map(|view| view.terms.iter()).collect()
    }

    pub fn view(&self, namespace: NameSpace) -> Option<&NamespaceView> {
        self.views.iter().find(|view| view.namespace == namespace)
    }

    pub fn view_mut(&mut self, namespace: NameSpace) -> Option<&mut NamespaceView> {
        self.views
            .iter_mut()
            .find(|view| view.namespace == namespace)
    }

    // Toggle a pin and re-run the affected namespace with the same seeded
    // tie-break sequence; the other namespaces keep their results. The mixed
    // word summaries are refreshed as well.
    pub fn set_pinned(
        &mut self,
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
        id: GOTermID,
        pinned: bool,
    ) -> bool {
        let id = match ontology.canonical_id(id) {
            Some(id) => id,
            None => return false,
        };

        let mut affected: Option<NameSpace> = None;
        for view in &mut self.views {
            if let Some(term) = view.term_mut(id) {
                if pinned {
                    if let Some(representative) = term.representative_id {
                        term.pinned = true;
                        if let Some(previous) = view.term_mut(representative) {
                            previous.pinned = false;
                        }
                    } else {
                        term.pinned = true;
                    }
                } else {
                    term.pinned = false;
                }
                affected = Some(view.namespace);
                break;
            }
        }

        let namespace = match affected {
            Some(namespace) => namespace,
            None => return false,
        };

        let cancel = CancelToken::new();
        let config = self.config.clone();
        let mut report = JobReport::default();
        if let Some(view) = self.view_mut(namespace) {
            view.recompute(ontology, &config, &cancel, &mut report);
        }
        self.report.merge(report);

        let terms: Vec<JobTerm> = self.all_terms().into_iter().cloned().collect();
        self.enrichment = word_enrichment(&terms, ontology, annotations);
        self.correlation = word_correlation(&terms, ontology);
        true
    }
}

// Applies the configured value transform. Ok(false) drops the term (it is
// not significant); fatal input errors abort the whole job.
fn apply_value_transform(
    value_type: ValueType,
    raw: Option<f64>,
    term: &mut JobTerm,
    non_significant: &mut usize,
) -> Result<bool, JobError> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(true),
    };

    match value_type {
        ValueType::PValue => {
            if !(0.0..=1.0).contains(&raw) {
                return Err(JobError::InvalidPValue(raw));
            }
            if raw > NON_SIGNIFICANT_P_VALUE {
                *non_significant += 1;
                return Ok(false);
            }
            let floored = raw.max(P_VALUE_FLOOR);
            term.value = floored.log10();
            term.transformed_value = -floored.log10();
        }
        ValueType::Higher => {
            term.value = raw;
            term.transformed_value = raw;
        }
        ValueType::Lower => {
            term.value = raw;
            term.transformed_value = -raw;
        }
        ValueType::HigherAbsolute => {
            term.value = raw;
            term.transformed_value = raw.abs();
        }
        ValueType::HigherAbsLog2 => {
            if raw <= 0.0 {
                return Err(JobError::NonPositiveLogValue(raw));
            }
            term.value = raw.log2();
            term.transformed_value = raw.log2().abs();
        }
    }
    Ok(true)
}

fn describe_obsolete(term_name: &str, id: GOTermID, ontology: &Ontology) -> String {
    let record = ontology.raw_term(id);
    let suggestions: Vec<String> = record
        .map(|term| {
            term.replaced_by
                .iter()
                .chain(term.consider.iter())
                .map(|&suggestion| format!("GO:{:07}", suggestion))
                .collect()
        })
        .unwrap_or_default();
    if suggestions.is_empty() {
        format!("GO:{:07} ({}) is obsolete", id, term_name)
    } else {
        format!(
            "GO:{:07} ({}) is obsolete; consider {}",
            id,
            term_name,
            suggestions.join(", ")
        )
    }
}

// Parse the user's text, apply transforms and annotation enrichment, and
// partition the surviving terms into per-namespace views.
pub fn parse_job_input(
    input: &str,
    ontology: &Ontology,
    annotations: &SpeciesAnnotations,
    config: &JobConfig,
    report: &mut JobReport,
) -> Result<Vec<NamespaceView>, JobError> {
    let parsed = parse_term_list(input);
    for line in &parsed.unparseable {
        report.warn_user(format!("could not read a GO term from line '{}'", line));
    }
    for line in &parsed.bad_values {
        report.warn_user(format!(
            "the value column is not numeric on line '{}'; the term is kept without a value",
            line
        ));
    }

    let mut buckets: FxHashMap<NameSpace, Vec<JobTerm>> = FxHashMap::default();
    let mut seen: FxHashSet<GOTermID> = FxHashSet::default();
    let mut duplicates = 0usize;
    let mut non_significant = 0usize;
    let mut with_value = 0usize;
    let mut accepted = 0usize;

    for record in &parsed.records {
        let go_term = match ontology.term(record.go_id) {
            Some(term) => term,
            None => {
                report.warn_user(format!(
                    "{} was not found in the current ontology",
                    record.raw_token
                ));
                continue;
            }
        };

        let raw = ontology.raw_term(record.go_id);
        let is_obsolete_input = raw.map(|term| term.is_obsolete).unwrap_or(false);
        if is_obsolete_input {
            let obsolete_name = raw.map(|term| term.name.as_str()).unwrap_or(&go_term.name);
            report.warn_user(describe_obsolete(obsolete_name, record.go_id, ontology));
            if config.remove_obsolete {
                continue;
            }
        } else if go_term.id != record.go_id {
            report.warn_user(format!(
                "{} is an alternate id of GO:{:07} ({})",
                record.raw_token, go_term.id, go_term.name
            ));
        }

        if go_term.is_obsolete && config.remove_obsolete {
            continue;
        }

        if !seen.insert(go_term.id) {
            duplicates += 1;
            continue;
        }

        let mut term = JobTerm::new(go_term);
        term.user_values = record.user_values.clone();

        if !apply_value_transform(config.value_type, record.value, &mut term, &mut non_significant)?
        {
            continue;
        }
        if record.value.is_some() {
            with_value += 1;
        }

        let size = annotations.get_size(ontology, term.id);
        term.annotation_size = size;
        term.log_annotation_size = (size.max(1.0) + 1.0).log10();
        term.annotation_frequency = annotations.get_frequency(ontology, term.id);

        accepted += 1;
        buckets.entry(go_term.namespace).or_default().push(term);
    }

    if duplicates > 0 {
        report.warn_user(format!(
            "{} duplicate terms were ignored; the first occurrence counts",
            duplicates
        ));
    }
    if non_significant > 0 {
        report.warn_user(format!(
            "{} terms with p-values above {} were removed as not significant",
            non_significant, NON_SIGNIFICANT_P_VALUE
        ));
    }
    if with_value > 0 && with_value < accepted {
        report.warn_user(format!(
            "only {} of {} terms carry a value; the rest compare by uniqueness",
            with_value, accepted
        ));
    }

    for (&namespace, terms) in &buckets {
        if terms.len() > MAX_TERMS_PER_NAMESPACE {
            return Err(JobError::TermListTooLarge {
                namespace,
                count: terms.len(),
                limit: MAX_TERMS_PER_NAMESPACE,
            });
        }
    }

    if buckets.values().all(|terms| terms.is_empty()) || buckets.is_empty() {
        return Err(JobError::EmptyResult);
    }

    let views: Vec<NamespaceView> = NAMESPACE_ORDER
        .iter()
        .map(|&namespace| {
            NamespaceView::new(namespace, buckets.remove(&namespace).unwrap_or_default())
        })
        .collect();

    for (namespace, terms) in buckets {
        if !terms.is_empty() {
            report.warn_developer(format!(
                "{} accepted terms fell into the unhandled {} namespace and were dropped",
                terms.len(),
                namespace.label()
            ));
        }
    }

    Ok(views)
}

// The synchronous pipeline: parse, run every namespace in order, then the
// mixed word summaries. Always produces a finished job; fatal errors land on
// the report with whatever partial state existed.
pub fn execute_job(
    input: &str,
    ontology: &Ontology,
    annotations: &SpeciesAnnotations,
    config: JobConfig,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Job {
    let mut report = JobReport::default();

    progress.report(0.0, "reading the term list");
    let mut views = match parse_job_input(input, ontology, annotations, &config, &mut report) {
        Ok(views) => views,
        Err(error) => {
            report.error_user(&error);
            progress.report(100.0, "finished with errors");
            return Job::empty(config, report);
        }
    };
    progress.report(10.0, "term list parsed");

    let span = 80.0 / views.len() as f64;
    for (index, view) in views.iter_mut().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let window = StageProgress::new(progress, 10.0 + span * index as f64, span);
        view.run(ontology, annotations, &config, cancel, &window, &mut report);
    }

    let mut job = Job {
        config,
        views,
        enrichment: Vec::new(),
        correlation: Vec::new(),
        report,
        finished: true,
    };

    if cancel.is_cancelled() {
        job.report.error_user(&JobError::Cancelled);
        progress.report(100.0, "finished with errors");
        return job;
    }

    progress.report(90.0, "summarizing words");
    let terms: Vec<JobTerm> = job.all_terms().into_iter().cloned().collect();
    job.enrichment = word_enrichment(&terms, ontology, annotations);
    job.correlation = word_correlation(&terms, ontology);
    progress.report(100.0, "finished");

    job
}

pub struct JobHandle {
    cancel: CancelToken,
    config: JobConfig,
    worker: thread::JoinHandle<Job>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn wait(self) -> Job {
        match self.worker.join() {
            Ok(job) => job,
            Err(_) => {
                let mut report = JobReport::default();
                report.error_developer("the worker thread panicked");
                report.error_user(&JobError::Cancelled);
                Job::empty(self.config, report)
            }
        }
    }
}

// Runs the job on a dedicated worker thread. A single-shot timer signals the
// shared cancellation token if the configured timeout elapses first; the
// worker disposes of the timer by completing.
pub fn spawn_job(
    input: String,
    ontology: Arc<Ontology>,
    annotations: Arc<SpeciesAnnotations>,
    config: JobConfig,
    progress: Arc<dyn ProgressSink>,
) -> JobHandle {
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let handle_config = config.clone();

    let (done_tx, done_rx) = mpsc::channel::<()>();
    if let Some(timeout) = config.timeout {
        let timer_cancel = cancel.clone();
        thread::spawn(move || {
            if done_rx.recv_timeout(timeout).is_err() {
                timer_cancel.cancel();
            }
        });
    }

    let worker = thread::spawn(move || {
        let job = execute_job(
            &input,
            &ontology,
            &annotations,
            config,
            &worker_cancel,
            progress.as_ref(),
        );
        let _ = done_tx.send(());
        job
    });

    JobHandle {
        cancel,
        config: handle_config,
        worker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::progress::NullProgress;
    use crate::ontology::ontology::tests::{record, small_ontology};
    use crate::parsers::obo_parser::OboFile;

    fn annotations(ontology: &Ontology) -> SpeciesAnnotations {
        let sizes: FxHashMap<GOTermID, usize> = [
            (8150, 10000),
            (9987, 4000),
            (7049, 900),
            (8283, 850),
            (3674, 8000),
            (3824, 800),
        ]
        .into_iter()
        .collect();
        SpeciesAnnotations::new(9606, "Homo sapiens".to_string(), sizes, ontology)
    }

    #[test]
    fn unknown_terms_warn_and_are_skipped() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let views = parse_job_input(
            "GO:0007049 1e-5\nGO:1234567 1e-4\n",
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        )
        .unwrap();
        let bp = &views[0];
        assert_eq!(bp.terms.len(), 1);
        assert!(report
            .user_warnings
            .iter()
            .any(|warning| warning.contains("not found")));
    }

    #[test]
    fn duplicate_terms_keep_the_first() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let views = parse_job_input(
            "GO:0007049 1e-5\nGO:0007049 1e-9\n",
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        )
        .unwrap();
        let term = views[0].term(7049).unwrap();
        assert!((term.transformed_value - 5.0).abs() < 1e-9);
        assert!(report
            .user_warnings
            .iter()
            .any(|warning| warning.contains("duplicate")));
    }

    #[test]
    fn invalid_p_value_is_fatal() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let result = parse_job_input(
            "GO:0007049 -0.5\n",
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        );
        assert!(matches!(result, Err(JobError::InvalidPValue(_))));
    }

    #[test]
    fn non_significant_p_values_are_dropped_with_one_warning() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let views = parse_job_input(
            "GO:0007049 1e-5\nGO:0008283 0.7\nGO:0009987 0.9\n",
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        )
        .unwrap();
        assert_eq!(views[0].terms.len(), 1);
        assert!(report
            .user_warnings
            .iter()
            .any(|warning| warning.contains("2 terms with p-values")));
    }

    #[test]
    fn p_values_transform_to_negative_log() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let views = parse_job_input(
            "GO:0007049 1e-10\n",
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        )
        .unwrap();
        let term = views[0].term(7049).unwrap();
        assert!((term.value + 10.0).abs() < 1e-9);
        assert!((term.transformed_value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn log2_transform_rejects_non_positive_values() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut report = JobReport::default();
        let config = JobConfig {
            value_type: ValueType::HigherAbsLog2,
            ..JobConfig::default()
        };
        let result = parse_job_input(
            "GO:0007049 0\n",
            &ontology,
            &annotations,
            &config,
            &mut report,
        );
        assert!(matches!(result, Err(JobError::NonPositiveLogValue(_))));
    }

    #[test]
    fn oversized_namespace_is_fatal() {
        let mut obo = OboFile::default();
        let ns = NameSpace::BiologicalProcess;
        let (id, term) = record(1, "Root", ns, &[]);
        obo.terms.insert(id, term);
        let mut input = String::new();
        for index in 0..=MAX_TERMS_PER_NAMESPACE as u32 {
            let id = 10 + index;
            let (record_id, term) = record(id, &format!("Term {}", id), ns, &[1]);
            obo.terms.insert(record_id, term);
            input.push_str(&format!("GO:{:07}\n", id));
        }
        let ontology = Ontology::from_obo(obo).unwrap();
        let annotations = SpeciesAnnotations::new(
            1,
            "Synthetic".to_string(),
            [(1u32, 10_000usize)].into_iter().collect(),
            &ontology,
        );
        let mut report = JobReport::default();
        let result = parse_job_input(
            &input,
            &ontology,
            &annotations,
            &JobConfig::default(),
            &mut report,
        );
        assert!(matches!(result, Err(JobError::TermListTooLarge { .. })));
    }

    #[test]
    fn empty_input_finishes_with_user_error() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let job = execute_job(
            "",
            &ontology,
            &annotations,
            JobConfig::default(),
            &CancelToken::new(),
            &NullProgress,
        );
        assert!(job.finished);
        assert!(job.report.has_user_errors());
        assert!(job.views.is_empty());
    }

    #[test]
    fn pinning_unpins_the_previous_representative() {
        let ontology = small_ontology();
        let annotations = annotations(&ontology);
        let mut job = execute_job(
            "GO:0007049 1e-10\nGO:0008283 1e-4\nGO:0009987 1e-6\n",
            &ontology,
            &annotations,
            JobConfig {
                cutoff: 0.4,
                ..JobConfig::default()
            },
            &CancelToken::new(),
            &NullProgress,
        );
        assert!(job.finished);

        let dispensed: Vec<GOTermID> = job.views[0]
            .terms
            .iter()
            .filter(|term| term.representative_id.is_some())
            .map(|term| term.id)
            .collect();
        if let Some(&dispensed_id) = dispensed.first() {
            let representative = job.views[0]
                .term(dispensed_id)
                .unwrap()
                .representative_id
                .unwrap();
            assert!(job.set_pinned(&ontology, &annotations, dispensed_id, true));
            let view = job.view(NameSpace::BiologicalProcess).unwrap();
            assert!(view.term(dispensed_id).unwrap().pinned);
            assert!(!view.term(representative).unwrap().pinned);
            assert_eq!(view.term(dispensed_id).unwrap().dispensability, 0.0);
        }
    }
}
