use std::collections::BTreeMap;
use rand::Rng;
use rand_mt::Mt;
use rustc_hash::FxHashMap;

use crate::analysis::similarity::SimilarityMatrix;
use crate::job::cancel::CancelToken;
use crate::job::progress::ProgressSink;
use crate::job::term::JobTerm;
use crate::ontology::term::GOTermID;
use crate::ontology::Ontology;

// Fixed tie-break seed; rerunning a job must repartition identically.
pub const TIE_BREAK_SEED: u32 = 18_012_021;

// Terms annotated to more than 5% of a species' proteins are considered too
// general to represent a more specific partner.
const TOO_GENERAL_FREQUENCY: f64 = 0.05;

// A parent within 25% of its child's size is treated as consisting mostly of
// that child.
const MOSTLY_CHILD_FRACTION: f64 = 0.25;

// Similarities become bucket keys after rounding to 8 decimals.
const SIMILARITY_KEY_SCALE: f64 = 1e8;

// Transformed values within 10% of their mean are considered equal.
const EQUALITY_INTERVAL: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct TieBreakOptions {
    pub keep_greater: bool,
    pub compare_log_transformed: bool,
}

impl Default for TieBreakOptions {
    fn default() -> Self {
        TieBreakOptions {
            keep_greater: true,
            compare_log_transformed: false,
        }
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

// Comparison values for the larger-wins rules: transformed values, falling
// back to uniqueness and then to zero when NaN.
fn comparison_values(a: &JobTerm, b: &JobTerm, options: TieBreakOptions) -> (f64, f64) {
    let mut left = a.transformed_value;
    let mut right = b.transformed_value;
    if left.is_nan() || right.is_nan() {
        left = a.uniqueness;
        right = b.uniqueness;
    }
    if left.is_nan() || right.is_nan() {
        left = 0.0;
        right = 0.0;
    }
    if options.compare_log_transformed {
        left = left.max(1e-300).log10().abs();
        right = right.max(1e-300).log10().abs();
    }
    (left, right)
}

fn within_equality_interval(left: f64, right: f64) -> bool {
    let mean = (left + right) / 2.0;
    (left - right).abs() <= EQUALITY_INTERVAL * mean.abs()
}

fn larger_wins(left: f64, right: f64, keep_greater: bool) -> bool {
    // true: the left term wins. Exact ties keep the left term.
    if left == right {
        true
    } else {
        (left > right) == keep_greater
    }
}

// Returns the index of the losing term of an admitted pair.
fn decide_loser(
    terms: &[JobTerm],
    i: usize,
    j: usize,
    ontology: &Ontology,
    options: TieBreakOptions,
) -> usize {
    let a = &terms[i];
    let b = &terms[j];

    if a.pinned != b.pinned {
        return if a.pinned { j } else { i };
    }

    let too_general_a = a.annotation_frequency > TOO_GENERAL_FREQUENCY;
    let too_general_b = b.annotation_frequency > TOO_GENERAL_FREQUENCY;
    if too_general_a && b.annotation_frequency < TOO_GENERAL_FREQUENCY {
        return i;
    }
    if too_general_b && a.annotation_frequency < TOO_GENERAL_FREQUENCY {
        return j;
    }

    let (left, right) = comparison_values(a, b, options);

    if !within_equality_interval(left, right) {
        return if larger_wins(left, right, options.keep_greater) {
            j
        } else {
            i
        };
    }

    // Equal within the interval: a parent-child pair resolves by size. A
    // parent barely larger than its child is mostly that child and yields.
    if ontology.is_child_of(a.id, b.id) {
        return parent_child_loser(i, j, a, b);
    }
    if ontology.is_child_of(b.id, a.id) {
        return parent_child_loser(j, i, b, a);
    }

    // Otherwise fall back to whichever was greater before equalization.
    if larger_wins(left, right, options.keep_greater) {
        j
    } else {
        i
    }
}

fn parent_child_loser(child_index: usize, parent_index: usize, child: &JobTerm, parent: &JobTerm) -> usize {
    let parent_size = parent.annotation_size;
    let child_size = child.annotation_size;
    if parent_size > 0.0 && (parent_size - child_size) / parent_size < MOSTLY_CHILD_FRACTION {
        parent_index
    } else {
        child_index
    }
}

// Greedy redundancy elimination. Pairs are bucketed by rounded similarity
// and consumed from the most similar bucket down; the loser of each drawn
// pair takes the bucket similarity as its dispensability and points at its
// dispenser. Surviving terms keep dispensability zero.
pub fn assign_dispensability(
    terms: &mut [JobTerm],
    matrix: &SimilarityMatrix,
    ontology: &Ontology,
    options: TieBreakOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) {
    let n = terms.len();
    debug_assert_eq!(n, matrix.len());

    for term in terms.iter_mut() {
        term.dispensability = 0.0;
        term.dispensed_by_id = None;
    }

    let mut buckets: BTreeMap<i64, Vec<(usize, usize)>> = BTreeMap::new();
    let mut total_pairs = 0usize;

    for i in 0..n {
        if cancel.is_cancelled() {
            return;
        }
        for j in (i + 1)..n {
            let similarity = matrix.get(i, j);
            if !(similarity > -1.0) {
                continue;
            }
            let a = &terms[i];
            let b = &terms[j];
            let signs_compatible = a.transformed_value.is_nan()
                || b.transformed_value.is_nan()
                || sign(a.transformed_value) == sign(b.transformed_value);
            if !signs_compatible {
                continue;
            }
            let key = (similarity * SIMILARITY_KEY_SCALE).round() as i64;
            buckets.entry(key).or_default().push((i, j));
            total_pairs += 1;
        }
        progress.report(50.0 * (i + 1) as f64 / n as f64, "grouping term pairs");
    }

    let mut rng = Mt::new(TIE_BREAK_SEED);
    let mut removed = vec![false; n];
    let mut consumed = 0usize;

    let keys: Vec<i64> = buckets.keys().rev().copied().collect();
    for key in keys {
        if cancel.is_cancelled() {
            return;
        }
        let mut bucket = buckets.remove(&key).unwrap_or_default();
        let similarity = key as f64 / SIMILARITY_KEY_SCALE;

        while !bucket.is_empty() {
            if cancel.is_cancelled() {
                return;
            }
            let pick = rng.gen_range(0..bucket.len());
            let (i, j) = bucket.swap_remove(pick);
            consumed += 1;
            if removed[i] || removed[j] {
                continue;
            }

            let loser = decide_loser(terms, i, j, ontology, options);
            let winner = if loser == i { j } else { i };
            let winner_id = terms[winner].id;
            terms[loser].dispensability = similarity;
            terms[loser].dispensed_by_id = Some(winner_id);
            removed[loser] = true;
        }

        if total_pairs > 0 {
            progress.report(
                50.0 + 50.0 * consumed as f64 / total_pairs as f64,
                "eliminating redundant terms",
            );
        }
    }
}

// Follow dispenser chains until a term that survives the cutoff; that term
// represents the whole collapsed cluster.
pub fn assign_representatives(terms: &mut [JobTerm], cutoff: f64) {
    let chain: FxHashMap<GOTermID, (f64, Option<GOTermID>)> = terms
        .iter()
        .map(|term| (term.id, (term.dispensability, term.dispensed_by_id)))
        .collect();

    for term in terms.iter_mut() {
        if term.is_retained(cutoff) {
            term.representative_id = None;
            continue;
        }
        let mut current = term.dispensed_by_id;
        let mut hops = 0usize;
        term.representative_id = None;
        while let Some(id) = current {
            match chain.get(&id) {
                Some(&(dispensability, next)) => {
                    if dispensability.is_nan() || dispensability <= cutoff {
                        term.representative_id = Some(id);
                        break;
                    }
                    current = next;
                }
                None => break,
            }
            hops += 1;
            if hops > chain.len() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::similarity::{SimilarityMatrix, SimilarityMeasure};
    use crate::job::progress::NullProgress;
    use crate::ontology::annotations::SpeciesAnnotations;
    use crate::ontology::ontology::tests::{record, small_ontology};
    use crate::ontology::term::NameSpace;
    use crate::ontology::Ontology;
    use crate::parsers::obo_parser::OboFile;
    use rustc_hash::FxHashMap;

    fn annotations(pairs: &[(GOTermID, usize)], ontology: &Ontology) -> SpeciesAnnotations {
        let sizes: FxHashMap<GOTermID, usize> = pairs.iter().copied().collect();
        SpeciesAnnotations::new(9606, "Homo sapiens".to_string(), sizes, ontology)
    }

    fn job_terms(
        ids: &[GOTermID],
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
        transformed: &[f64],
    ) -> Vec<JobTerm> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted
            .iter()
            .zip(transformed)
            .map(|(&id, &value)| {
                let mut term = JobTerm::new(ontology.term(id).unwrap());
                term.transformed_value = value;
                term.value = value;
                term.annotation_size = annotations.get_size(ontology, id);
                term.annotation_frequency = annotations.get_frequency(ontology, id);
                term
            })
            .collect()
    }

    fn run_clustering(
        terms: &mut [JobTerm],
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
    ) {
        let ids: Vec<GOTermID> = terms.iter().map(|t| t.id).collect();
        let matrix = SimilarityMatrix::build(
            &ids,
            SimilarityMeasure::SimRel,
            ontology,
            annotations,
            &CancelToken::new(),
        );
        let uniqueness = matrix.uniqueness_all();
        for (term, value) in terms.iter_mut().zip(uniqueness) {
            term.uniqueness = value;
        }
        assign_dispensability(
            terms,
            &matrix,
            ontology,
            TieBreakOptions::default(),
            &CancelToken::new(),
            &NullProgress,
        );
    }

    #[test]
    fn parent_consisting_mostly_of_child_is_dispensed() {
        let ontology = small_ontology();
        // Parent 9987 is barely larger than child 7049, equal values.
        let annotations = annotations(&[(8150, 10000), (9987, 4000), (7049, 3500)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[10.0, 10.0]);
        run_clustering(&mut terms, &ontology, &annotations);

        let child = terms.iter().find(|t| t.id == 7049).unwrap();
        let parent = terms.iter().find(|t| t.id == 9987).unwrap();
        assert_eq!(child.dispensability, 0.0);
        assert!(parent.dispensability > 0.0);
        assert_eq!(parent.dispensed_by_id, Some(7049));
    }

    #[test]
    fn distinct_parent_dispenses_its_child() {
        let ontology = small_ontology();
        // Parent is much larger than the child; the child loses instead.
        let annotations = annotations(&[(8150, 10000), (9987, 4000), (7049, 600)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[10.0, 10.0]);
        run_clustering(&mut terms, &ontology, &annotations);

        let child = terms.iter().find(|t| t.id == 7049).unwrap();
        let parent = terms.iter().find(|t| t.id == 9987).unwrap();
        assert_eq!(parent.dispensability, 0.0);
        assert_eq!(child.dispensed_by_id, Some(9987));
    }

    #[test]
    fn root_parent_is_dispensed_at_zero_similarity() {
        let ontology = small_ontology();
        // 9987 paired with its own namespace root 8150, equal values, the
        // child making up most of the root. The root's frequency is exactly
        // 1.0, so the pair's similarity is 0 under SimRel and the root is
        // eliminated in the lowest bucket rather than at similarity 1.
        let annotations = annotations(&[(8150, 10000), (9987, 8000)], &ontology);
        let mut terms = job_terms(&[8150, 9987], &ontology, &annotations, &[10.0, 10.0]);
        run_clustering(&mut terms, &ontology, &annotations);

        let child = terms.iter().find(|t| t.id == 9987).unwrap();
        let root = terms.iter().find(|t| t.id == 8150).unwrap();
        assert_eq!(root.dispensability, 0.0);
        assert_eq!(root.dispensed_by_id, Some(9987));
        assert_eq!(child.dispensability, 0.0);
        assert!(child.dispensed_by_id.is_none());
    }

    #[test]
    fn generality_overrides_transformed_value() {
        let ontology = small_ontology();
        // 9987 sits above the 5% generality threshold, 7049 far below it;
        // the more specific term survives its higher-valued partner.
        let annotations = annotations(&[(8150, 10000), (9987, 600), (7049, 100)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[2.0, 5.0]);
        run_clustering(&mut terms, &ontology, &annotations);

        let specific = terms.iter().find(|t| t.id == 7049).unwrap();
        let general = terms.iter().find(|t| t.id == 9987).unwrap();
        assert_eq!(specific.dispensability, 0.0);
        assert!(general.dispensability > 0.0);
        assert_eq!(general.dispensed_by_id, Some(7049));
    }

    #[test]
    fn pinning_overrides_every_other_rule() {
        let ontology = small_ontology();
        let annotations = annotations(&[(8150, 10000), (9987, 600), (7049, 100)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[2.0, 5.0]);
        terms.iter_mut().find(|t| t.id == 9987).unwrap().pinned = true;
        run_clustering(&mut terms, &ontology, &annotations);

        let pinned = terms.iter().find(|t| t.id == 9987).unwrap();
        let other = terms.iter().find(|t| t.id == 7049).unwrap();
        assert_eq!(pinned.dispensability, 0.0);
        assert!(other.dispensability > 0.0);
    }

    #[test]
    fn opposite_signs_are_never_paired() {
        let ontology = small_ontology();
        let annotations = annotations(&[(8150, 10000), (9987, 4000), (7049, 3500)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[10.0, -10.0]);
        run_clustering(&mut terms, &ontology, &annotations);

        assert!(terms.iter().all(|t| t.dispensability == 0.0));
        assert!(terms.iter().all(|t| t.dispensed_by_id.is_none()));
    }

    #[test]
    fn clustering_is_deterministic() {
        let ontology = small_ontology();
        let annotations = annotations(
            &[(8150, 10000), (9987, 4000), (7049, 900), (8283, 850)],
            &ontology,
        );
        let ids = [7049, 8283, 9987];
        let mut first = job_terms(&ids, &ontology, &annotations, &[3.0, 3.1, 2.9]);
        let mut second = first.clone();
        run_clustering(&mut first, &ontology, &annotations);
        run_clustering(&mut second, &ontology, &annotations);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.dispensability, b.dispensability);
            assert_eq!(a.dispensed_by_id, b.dispensed_by_id);
        }
    }

    #[test]
    fn dispensability_stays_in_unit_interval() {
        let ontology = small_ontology();
        let annotations = annotations(
            &[(8150, 10000), (9987, 4000), (7049, 900), (8283, 850)],
            &ontology,
        );
        let ids = [7049, 8283, 9987];
        let mut terms = job_terms(&ids, &ontology, &annotations, &[3.0, 3.1, 2.9]);
        run_clustering(&mut terms, &ontology, &annotations);
        for term in &terms {
            assert!((0.0..=1.0).contains(&term.dispensability));
        }
    }

    #[test]
    fn representatives_follow_dispenser_chains() {
        let ontology = {
            let mut obo = OboFile::default();
            let ns = NameSpace::BiologicalProcess;
            for (id, term) in [
                record(1, "Root", ns, &[]),
                record(2, "Mid", ns, &[1]),
                record(3, "Leaf", ns, &[2]),
            ] {
                obo.terms.insert(id, term);
            }
            Ontology::from_obo(obo).unwrap()
        };
        let mut terms: Vec<JobTerm> = [1u32, 2, 3]
            .iter()
            .map(|&id| JobTerm::new(ontology.term(id).unwrap()))
            .collect();
        // 3 dispensed by 2 at 0.9; 2 dispensed by 1 at 0.8; 1 kept.
        terms[2].dispensability = 0.9;
        terms[2].dispensed_by_id = Some(2);
        terms[1].dispensability = 0.8;
        terms[1].dispensed_by_id = Some(1);

        assign_representatives(&mut terms, 0.7);
        assert_eq!(terms[2].representative_id, Some(1));
        assert_eq!(terms[1].representative_id, Some(1));
        assert_eq!(terms[0].representative_id, None);
    }

    #[test]
    fn cancellation_returns_partial_state() {
        let ontology = small_ontology();
        let annotations = annotations(&[(8150, 10000), (9987, 4000), (7049, 3500)], &ontology);
        let mut terms = job_terms(&[7049, 9987], &ontology, &annotations, &[10.0, 10.0]);
        let ids: Vec<GOTermID> = terms.iter().map(|t| t.id).collect();
        let matrix = SimilarityMatrix::build(
            &ids,
            SimilarityMeasure::SimRel,
            &ontology,
            &annotations,
            &CancelToken::new(),
        );
        let cancelled = CancelToken::new();
        cancelled.cancel();
        assign_dispensability(
            &mut terms,
            &matrix,
            &ontology,
            TieBreakOptions::default(),
            &cancelled,
            &NullProgress,
        );
        assert!(terms.iter().all(|t| t.dispensed_by_id.is_none()));
    }
}
