use std::time::Duration;

use crate::analysis::dispensability::{assign_dispensability, assign_representatives, TieBreakOptions};
use crate::analysis::mds::{build_distance_matrix, layout_positions};
use crate::analysis::similarity::SimilarityMatrix;
use crate::analysis::threshold_graph::{build_threshold_graph, OntoloGraph};
use crate::job::cancel::CancelToken;
use crate::job::config::{JobConfig, LARGE_RESULT_WARNING};
use crate::job::errors::JobReport;
use crate::job::progress::{NullProgress, ProgressSink, StageProgress};
use crate::job::term::JobTerm;
use crate::ontology::annotations::SpeciesAnnotations;
use crate::ontology::term::{GOTermID, NameSpace};
use crate::ontology::Ontology;

const DISPLAY_PERCENTILE: f64 = 0.97;
const MDS_TIMEOUT: Duration = Duration::from_secs(120);
const MDS_CONVERGENCE_EXPONENT: i32 = 4;

// One namespace's slice of a job: its terms, similarity matrix, and the
// display graph derived from them.
#[derive(Debug)]
pub struct NamespaceView {
    pub namespace: NameSpace,
    pub terms: Vec<JobTerm>,
    pub matrix: Option<SimilarityMatrix>,
    pub graph: OntoloGraph,
}

impl NamespaceView {
    pub fn new(namespace: NameSpace, mut terms: Vec<JobTerm>) -> Self {
        terms.sort_unstable_by_key(|term| term.id);
        NamespaceView {
            namespace,
            terms,
            matrix: None,
            graph: OntoloGraph::default(),
        }
    }

    pub fn term(&self, id: GOTermID) -> Option<&JobTerm> {
        self.terms.iter().find(|term| term.id == id)
    }

    pub fn term_mut(&mut self, id: GOTermID) -> Option<&mut JobTerm> {
        self.terms.iter_mut().find(|term| term.id == id)
    }

    pub fn retained_count(&self, cutoff: f64) -> usize {
        self.terms
            .iter()
            .filter(|term| term.is_retained(cutoff))
            .count()
    }

    // The full per-namespace pipeline: similarity matrix, uniqueness,
    // dispensability, the two embeddings and the display graph.
    pub fn run(
        &mut self,
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
        config: &JobConfig,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
        report: &mut JobReport,
    ) {
        if self.terms.is_empty() {
            progress.report(100.0, "namespace is empty");
            return;
        }

        let ids: Vec<GOTermID> = self.terms.iter().map(|term| term.id).collect();
        progress.report(0.0, "computing the similarity matrix");
        let matrix = SimilarityMatrix::build(&ids, config.measure, ontology, annotations, cancel);
        if cancel.is_cancelled() {
            self.matrix = Some(matrix);
            return;
        }

        for (term, uniqueness) in self.terms.iter_mut().zip(matrix.uniqueness_all()) {
            term.uniqueness = uniqueness;
        }
        progress.report(40.0, "similarity matrix ready");

        let clustering_progress = StageProgress::new(progress, 40.0, 30.0);
        assign_dispensability(
            &mut self.terms,
            &matrix,
            ontology,
            TieBreakOptions {
                keep_greater: config.keep_greater,
                compare_log_transformed: config.compare_log_transformed,
            },
            cancel,
            &clustering_progress,
        );
        let cutoff = config.quantized_cutoff();
        assign_representatives(&mut self.terms, cutoff);
        if cancel.is_cancelled() {
            self.matrix = Some(matrix);
            return;
        }

        let retained = self.retained_count(cutoff);
        if retained > LARGE_RESULT_WARNING {
            report.warn_user(format!(
                "{} retained {} terms; plots over {} terms get crowded",
                self.namespace.label(),
                retained,
                LARGE_RESULT_WARNING
            ));
        }

        progress.report(70.0, "embedding retained terms");
        self.run_layout(&matrix, cutoff, cancel, report);
        if cancel.is_cancelled() {
            self.matrix = Some(matrix);
            return;
        }

        progress.report(90.0, "building the display graph");
        self.graph = build_threshold_graph(&self.terms, &matrix, cutoff, DISPLAY_PERCENTILE);
        self.matrix = Some(matrix);
        progress.report(100.0, "namespace finished");
    }

    fn run_layout(
        &mut self,
        matrix: &SimilarityMatrix,
        cutoff: f64,
        cancel: &CancelToken,
        report: &mut JobReport,
    ) {
        let selected: Vec<usize> = (0..self.terms.len())
            .filter(|&index| self.terms[index].is_retained(cutoff))
            .collect();
        if selected.is_empty() {
            return;
        }

        let distances = build_distance_matrix(matrix, &selected);

        let planar = layout_positions(
            &distances,
            2,
            MDS_CONVERGENCE_EXPONENT,
            MDS_TIMEOUT,
            0,
            cancel,
        );
        for (position, &index) in selected.iter().enumerate() {
            self.terms[index].pc = [
                planar.coordinates[position][0],
                planar.coordinates[position][1],
            ];
        }

        let spatial = layout_positions(
            &distances,
            3,
            MDS_CONVERGENCE_EXPONENT,
            MDS_TIMEOUT,
            0,
            cancel,
        );
        for (position, &index) in selected.iter().enumerate() {
            self.terms[index].pc3 = [
                spatial.coordinates[position][0],
                spatial.coordinates[position][1],
                spatial.coordinates[position][2],
            ];
        }

        if !planar.converged || !spatial.converged {
            report.warn_developer(format!(
                "multidimensional scaling did not converge for {}",
                self.namespace.label()
            ));
        }
    }

    // Clustering and layout after a pin change; the similarity matrix is
    // unaffected by pins and is reused as built.
    pub fn recompute(
        &mut self,
        ontology: &Ontology,
        config: &JobConfig,
        cancel: &CancelToken,
        report: &mut JobReport,
    ) {
        let matrix = match self.matrix.take() {
            Some(matrix) => matrix,
            None => return,
        };

        assign_dispensability(
            &mut self.terms,
            &matrix,
            ontology,
            TieBreakOptions {
                keep_greater: config.keep_greater,
                compare_log_transformed: config.compare_log_transformed,
            },
            cancel,
            &NullProgress,
        );
        let cutoff = config.quantized_cutoff();
        assign_representatives(&mut self.terms, cutoff);
        self.run_layout(&matrix, cutoff, cancel, report);
        self.graph = build_threshold_graph(&self.terms, &matrix, cutoff, DISPLAY_PERCENTILE);
        self.matrix = Some(matrix);
    }
}
