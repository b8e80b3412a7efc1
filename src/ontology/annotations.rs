use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ontology::term::GOTermID;
use crate::ontology::Ontology;

pub type TaxonID = u32;

// Imputation walks at most this many terms along one sibling/child/parent
// chain before giving up and answering with the corpus average.
const MISSING_CHAIN_LIMIT: usize = 200;

// A frequency inherited from a parent is capped here so the implicit root
// value of 1.0 cannot propagate downward.
const MAX_INHERITED_FREQUENCY: f64 = 0.75;

// Per-species term sizes and normalized frequencies. Read-mostly: lookups of
// unknown terms impute a value and memoize it, so the maps sit behind locks
// and the structure can be shared across concurrent jobs.
#[derive(Debug)]
pub struct SpeciesAnnotations {
    pub taxon_id: TaxonID,
    pub species_name: String,
    sizes: RwLock<FxHashMap<GOTermID, f64>>,
    frequencies: RwLock<FxHashMap<GOTermID, f64>>,
    size_average: f64,
    frequency_average: f64,
}

impl SpeciesAnnotations {
    pub fn new(
        taxon_id: TaxonID,
        species_name: String,
        term_sizes: FxHashMap<GOTermID, usize>,
        ontology: &Ontology,
    ) -> Self {
        let mut sizes: FxHashMap<GOTermID, f64> = FxHashMap::default();
        for (id, size) in term_sizes {
            if size == 0 {
                continue;
            }
            if let Some(canonical) = ontology.canonical_id(id) {
                *sizes.entry(canonical).or_insert(0.0) += size as f64;
            }
        }

        let mut frequencies: FxHashMap<GOTermID, f64> = FxHashMap::default();
        for (&id, &size) in &sizes {
            if let Some(root_id) = ontology.root(id) {
                if let Some(&root_size) = sizes.get(&root_id) {
                    if root_size > 0.0 {
                        frequencies.insert(id, (size / root_size).min(1.0));
                    }
                }
            }
        }

        let size_average = average(sizes.values().copied(), 1.0);
        let frequency_average = average(frequencies.values().copied(), 0.5);

        SpeciesAnnotations {
            taxon_id,
            species_name,
            sizes: RwLock::new(sizes),
            frequencies: RwLock::new(frequencies),
            size_average,
            frequency_average,
        }
    }

    pub fn known_terms(&self) -> Vec<GOTermID> {
        self.sizes.read().keys().copied().collect()
    }

    pub fn size_average(&self) -> f64 {
        self.size_average
    }

    pub fn frequency_average(&self) -> f64 {
        self.frequency_average
    }

    // Total function: unknown ids receive an imputed, memoized value.
    pub fn get_size(&self, ontology: &Ontology, id: GOTermID) -> f64 {
        let id = ontology.canonical_id(id).unwrap_or(id);
        if let Some(&size) = self.sizes.read().get(&id) {
            if usable(size) {
                return size;
            }
        }
        let imputed = self.impute_size(ontology, id);
        self.sizes.write().insert(id, imputed);
        imputed
    }

    pub fn get_frequency(&self, ontology: &Ontology, id: GOTermID) -> f64 {
        let mut missing_chain = FxHashSet::default();
        self.frequency_guarded(ontology, id, &mut missing_chain)
    }

    fn impute_size(&self, ontology: &Ontology, id: GOTermID) -> f64 {
        let sizes = self.sizes.read();

        let sibling_values: Vec<f64> = ontology
            .siblings(id)
            .into_iter()
            .filter_map(|sibling| sizes.get(&sibling).copied())
            .filter(|&size| usable(size))
            .collect();
        if !sibling_values.is_empty() {
            return average(sibling_values.into_iter(), self.size_average);
        }

        if let Some(term) = ontology.term(id) {
            let largest_child = term
                .child_ids
                .iter()
                .filter_map(|child| sizes.get(child).copied())
                .filter(|&size| usable(size))
                .fold(f64::NAN, f64::max);
            if usable(largest_child) {
                return largest_child;
            }

            let smallest_parent = term
                .parent_ids
                .iter()
                .filter(|&&parent| {
                    ontology
                        .term(parent)
                        .map(|p| !p.is_root())
                        .unwrap_or(false)
                })
                .filter_map(|parent| sizes.get(parent).copied())
                .filter(|&size| usable(size))
                .fold(f64::NAN, f64::min);
            if usable(smallest_parent) {
                return smallest_parent;
            }
        }

        self.size_average
    }

    fn frequency_guarded(
        &self,
        ontology: &Ontology,
        id: GOTermID,
        missing_chain: &mut FxHashSet<GOTermID>,
    ) -> f64 {
        let id = ontology.canonical_id(id).unwrap_or(id);

        if let Some(&frequency) = self.frequencies.read().get(&id) {
            if usable(frequency) {
                return frequency;
            }
        }

        if missing_chain.len() > MISSING_CHAIN_LIMIT || !missing_chain.insert(id) {
            return self.frequency_average;
        }

        let imputed = self.impute_frequency(ontology, id, missing_chain);
        self.frequencies.write().insert(id, imputed);
        imputed
    }

    fn impute_frequency(
        &self,
        ontology: &Ontology,
        id: GOTermID,
        missing_chain: &mut FxHashSet<GOTermID>,
    ) -> f64 {
        let sibling_values: Vec<f64> = {
            let frequencies = self.frequencies.read();
            ontology
                .siblings(id)
                .into_iter()
                .filter_map(|sibling| frequencies.get(&sibling).copied())
                .filter(|&frequency| usable(frequency))
                .collect()
        };
        if !sibling_values.is_empty() {
            return average(sibling_values.into_iter(), self.frequency_average);
        }

        let term = match ontology.term(id) {
            Some(term) => term.clone(),
            None => return self.frequency_average,
        };

        let largest_child = {
            let frequencies = self.frequencies.read();
            term.child_ids
                .iter()
                .filter_map(|child| frequencies.get(child).copied())
                .filter(|&frequency| usable(frequency))
                .fold(f64::NAN, f64::max)
        };
        if usable(largest_child) {
            return largest_child;
        }

        // Parents may themselves be unknown; recurse with the shared chain
        // guard so deep misses terminate at the corpus average.
        let smallest_parent = term
            .parent_ids
            .iter()
            .filter(|&&parent| {
                ontology
                    .term(parent)
                    .map(|p| !p.is_root())
                    .unwrap_or(false)
            })
            .map(|&parent| self.frequency_guarded(ontology, parent, missing_chain))
            .filter(|&frequency| usable(frequency))
            .fold(f64::NAN, f64::min);
        if usable(smallest_parent) {
            return smallest_parent.min(MAX_INHERITED_FREQUENCY);
        }

        self.frequency_average
    }
}

fn usable(value: f64) -> bool {
    value > 0.0 && !value.is_nan()
}

fn average(values: impl Iterator<Item = f64>, empty_default: f64) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        empty_default
    } else {
        sum / count as f64
    }
}
