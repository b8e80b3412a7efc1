use clap::ValueEnum;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::job::cancel::CancelToken;
use crate::ontology::annotations::SpeciesAnnotations;
use crate::ontology::term::GOTermID;
use crate::ontology::Ontology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimilarityMeasure {
    Resnik,
    Lin,
    SimRel,
    Jiang,
}

impl Default for SimilarityMeasure {
    fn default() -> Self {
        SimilarityMeasure::SimRel
    }
}

// Frequency of the most informative common ancestor; 1.0 when the pair has
// no common ancestor at all. When one term subsumes the other it is itself
// the deepest common ancestor and joins the candidate set.
fn mia_frequency(
    ontology: &Ontology,
    annotations: &SpeciesAnnotations,
    a: GOTermID,
    b: GOTermID,
) -> f64 {
    let mut common = ontology.common_ancestors(a, b);
    if ontology.is_child_of(a, b) {
        common.insert(ontology.canonical_id(b).unwrap_or(b));
    }
    if ontology.is_child_of(b, a) {
        common.insert(ontology.canonical_id(a).unwrap_or(a));
    }
    let lowest = common
        .into_iter()
        .map(|ancestor| annotations.get_frequency(ontology, ancestor))
        .fold(f64::NAN, f64::min);
    if lowest.is_nan() {
        1.0
    } else {
        lowest
    }
}

pub fn term_similarity(
    measure: SimilarityMeasure,
    ontology: &Ontology,
    annotations: &SpeciesAnnotations,
    a: GOTermID,
    b: GOTermID,
) -> f64 {
    if a == b {
        return 1.0;
    }
    if !ontology.contains(a) || !ontology.contains(b) {
        return 0.0;
    }

    let freq_a = annotations.get_frequency(ontology, a);
    let freq_b = annotations.get_frequency(ontology, b);
    let freq_mia = mia_frequency(ontology, annotations, a, b);

    let lin = 2.0 * freq_mia.log10() / (freq_a.log10() + freq_b.log10());

    match measure {
        SimilarityMeasure::Resnik => (-freq_mia.log10()).min(4.0) / 4.0,
        SimilarityMeasure::Lin => lin,
        SimilarityMeasure::SimRel => lin * (1.0 - freq_mia),
        SimilarityMeasure::Jiang => {
            1.0 / (-freq_a.log10() - freq_b.log10() + 2.0 * freq_mia.log10() + 1.0)
        }
    }
}

// Pairwise similarities over a term set, packed as a lower triangle without
// the diagonal. For col > row the cell lives at col*(col-1)/2 + row; the
// same formula must be used on both the get and set paths.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    term_ids: Vec<GOTermID>,
    index_of: FxHashMap<GOTermID, usize>,
    values: Vec<f64>,
}

fn packed_index(row: usize, col: usize) -> usize {
    debug_assert!(col > row);
    col * (col - 1) / 2 + row
}

impl SimilarityMatrix {
    pub fn build(
        term_ids: &[GOTermID],
        measure: SimilarityMeasure,
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
        cancel: &CancelToken,
    ) -> Self {
        let mut sorted: Vec<GOTermID> = term_ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let index_of: FxHashMap<GOTermID, usize> = sorted
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();

        let n = sorted.len();
        let segments: Vec<Vec<f64>> = (1..n)
            .into_par_iter()
            .map(|col| {
                if cancel.is_cancelled() {
                    return vec![0.0; col];
                }
                (0..col)
                    .map(|row| {
                        term_similarity(measure, ontology, annotations, sorted[row], sorted[col])
                    })
                    .collect()
            })
            .collect();

        let mut values = Vec::with_capacity(n * (n - 1) / 2);
        for segment in segments {
            values.extend(segment);
        }

        SimilarityMatrix {
            term_ids: sorted,
            index_of,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.term_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_ids.is_empty()
    }

    pub fn term_ids(&self) -> &[GOTermID] {
        &self.term_ids
    }

    pub fn index_of(&self, id: GOTermID) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 1.0;
        }
        let (row, col) = if i < j { (i, j) } else { (j, i) };
        self.values[packed_index(row, col)]
    }

    pub fn get_by_id(&self, a: GOTermID, b: GOTermID) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.get(i, j))
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i == j {
            return;
        }
        let (row, col) = if i < j { (i, j) } else { (j, i) };
        self.values[packed_index(row, col)] = value;
    }

    // Squared mean semantic distance from every other term in the set.
    pub fn uniqueness(&self, index: usize) -> f64 {
        let n = self.len();
        let mut sum = 0.0;
        let mut count = 0usize;
        for other in 0..n {
            if other == index {
                continue;
            }
            let similarity = self.get(index, other);
            if !similarity.is_nan() {
                sum += similarity;
                count += 1;
            }
        }
        if count <= 1 {
            return 1.0;
        }
        let mean = sum / count as f64;
        (1.0 - mean) * (1.0 - mean)
    }

    pub fn uniqueness_all(&self) -> Vec<f64> {
        (0..self.len()).map(|index| self.uniqueness(index)).collect()
    }
}
