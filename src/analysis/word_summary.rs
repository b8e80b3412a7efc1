use rand::seq::SliceRandom;
use rand_mt::Mt;
use rustc_hash::FxHashMap;

use crate::job::term::JobTerm;
use crate::ontology::annotations::SpeciesAnnotations;
use crate::ontology::Ontology;

// Fixed seed for shuffling the correlation list before display.
pub const WORD_SHUFFLE_SEED: u32 = 26_012_021;

pub const TOP_WORD_COUNT: usize = 10;

// A word must appear in at least this many input terms to be reported.
const MIN_WORD_SUPPORT: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct WordScore {
    pub word: String,
    pub score: f64,
}

fn keyword_counts<'a>(
    ontology: &Ontology,
    ids: impl Iterator<Item = &'a u32>,
) -> (FxHashMap<String, usize>, usize) {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    let mut total = 0usize;
    for &id in ids {
        if let Some(term) = ontology.term(id) {
            for keyword in &term.keywords {
                *counts.entry(keyword.clone()).or_insert(0) += 1;
                total += 1;
            }
        }
    }
    (counts, total)
}

// Log-odds of a word's frequency among the submitted terms against its
// frequency across every annotated term of the species.
pub fn word_enrichment(
    terms: &[JobTerm],
    ontology: &Ontology,
    annotations: &SpeciesAnnotations,
) -> Vec<WordScore> {
    let job_ids: Vec<u32> = terms.iter().map(|term| term.id).collect();
    let (job_counts, job_total) = keyword_counts(ontology, job_ids.iter());
    let corpus_ids = annotations.known_terms();
    let (corpus_counts, corpus_total) = keyword_counts(ontology, corpus_ids.iter());

    if job_total == 0 || corpus_total == 0 {
        return Vec::new();
    }

    let mut scores: Vec<WordScore> = job_counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_WORD_SUPPORT)
        .map(|(word, count)| {
            let job_frequency = count as f64 / job_total as f64;
            let corpus_count = corpus_counts.get(&word).copied().unwrap_or(0);
            // Half-count smoothing keeps corpus-absent words finite.
            let corpus_frequency = (corpus_count as f64 + 0.5) / (corpus_total as f64 + 0.5);
            WordScore {
                word,
                score: (job_frequency / corpus_frequency).log2(),
            }
        })
        .collect();

    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    scores.truncate(TOP_WORD_COUNT);
    scores
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());

    let mut ranks = vec![0.0; n];
    let mut position = 0usize;
    while position < n {
        let mut tie_end = position;
        while tie_end + 1 < n && values[order[tie_end + 1]] == values[order[position]] {
            tie_end += 1;
        }
        let shared_rank = (position + tie_end) as f64 / 2.0 + 1.0;
        for &index in &order[position..=tie_end] {
            ranks[index] = shared_rank;
        }
        position = tie_end + 1;
    }
    ranks
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        covariance += (x - mean_x) * (y - mean_y);
        variance_x += (x - mean_x) * (x - mean_x);
        variance_y += (y - mean_y) * (y - mean_y);
    }
    if variance_x == 0.0 || variance_y == 0.0 {
        return 0.0;
    }
    covariance / (variance_x * variance_y).sqrt()
}

// Spearman correlation of per-term word presence against the transformed
// values; the strongest words come back in seeded-shuffled display order.
pub fn word_correlation(terms: &[JobTerm], ontology: &Ontology) -> Vec<WordScore> {
    let usable: Vec<&JobTerm> = terms
        .iter()
        .filter(|term| !term.transformed_value.is_nan())
        .collect();
    if usable.len() < 3 {
        return Vec::new();
    }

    let values: Vec<f64> = usable.iter().map(|term| term.transformed_value).collect();
    let value_ranks = average_ranks(&values);

    let mut per_word_presence: FxHashMap<String, Vec<f64>> = FxHashMap::default();
    for (index, term) in usable.iter().enumerate() {
        if let Some(go_term) = ontology.term(term.id) {
            for keyword in &go_term.keywords {
                per_word_presence
                    .entry(keyword.clone())
                    .or_insert_with(|| vec![0.0; usable.len()])[index] = 1.0;
            }
        }
    }

    let mut scores: Vec<WordScore> = per_word_presence
        .into_iter()
        .filter(|(_, presence)| {
            let support = presence.iter().filter(|&&p| p > 0.0).count();
            support >= MIN_WORD_SUPPORT && support < presence.len()
        })
        .map(|(word, presence)| {
            let presence_ranks = average_ranks(&presence);
            WordScore {
                word,
                score: pearson(&presence_ranks, &value_ranks),
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .abs()
            .partial_cmp(&a.score.abs())
            .unwrap()
            .then_with(|| a.word.cmp(&b.word))
    });
    scores.truncate(TOP_WORD_COUNT);

    let mut rng = Mt::new(WORD_SHUFFLE_SEED);
    scores.shuffle(&mut rng);
    scores
}
