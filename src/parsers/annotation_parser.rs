use std::fs::{read_dir, File};
use std::io::{BufRead, BufReader, Error, ErrorKind, Result};
use std::path::Path;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ontology::annotations::{SpeciesAnnotations, TaxonID};
use crate::ontology::term::GOTermID;
use crate::ontology::Ontology;
use crate::parsers::obo_parser::parse_go_id;

// Species annotation files carry one `GO:NNNNNNN<TAB>count` pair per line,
// with an optional `# <taxon_id> <species name>` header.
pub fn read_species_annotations(
    path: impl AsRef<Path>,
    ontology: &Ontology,
) -> Result<SpeciesAnnotations> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(128 * 1024, file);

    let mut taxon_id: TaxonID = 0;
    let mut species_name = String::from("unknown species");
    let mut term_sizes: FxHashMap<GOTermID, usize> = FxHashMap::default();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('#') {
            let mut fields = header.split_whitespace();
            if let Some(id) = fields.next().and_then(|f| f.parse::<TaxonID>().ok()) {
                taxon_id = id;
                let rest: Vec<&str> = fields.collect();
                if !rest.is_empty() {
                    species_name = rest.join(" ");
                }
            }
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let go_id = fields.next().and_then(parse_go_id);
        let count = fields.next().and_then(|f| f.parse::<usize>().ok());
        match (go_id, count) {
            (Some(go_id), Some(count)) => {
                *term_sizes.entry(go_id).or_insert(0) += count;
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("malformed annotation line in {:?}: {}", path, trimmed),
                ));
            }
        }
    }

    Ok(SpeciesAnnotations::new(
        taxon_id,
        species_name,
        term_sizes,
        ontology,
    ))
}

// Annotation databases for several species at once, one file per taxon.
#[derive(Debug, Default)]
pub struct SpeciesDb {
    species: FxHashMap<TaxonID, SpeciesAnnotations>,
}

impl SpeciesDb {
    pub fn read_species_db(dir: impl AsRef<Path>, ontology: &Ontology) -> Result<Self> {
        let entries: Vec<_> = read_dir(dir.as_ref())?.filter_map(Result::ok).collect();

        let loaded: Vec<SpeciesAnnotations> = entries
            .par_iter()
            .filter(|entry| {
                matches!(
                    entry.path().extension().and_then(|ext| ext.to_str()),
                    Some("tsv") | Some("txt")
                )
            })
            .filter_map(|entry| match read_species_annotations(entry.path(), ontology) {
                Ok(annotations) => Some(annotations),
                Err(err) => {
                    eprintln!("Error reading {:?}: {}", entry.path(), err);
                    None
                }
            })
            .collect();

        let mut species = FxHashMap::default();
        for annotations in loaded {
            species.insert(annotations.taxon_id, annotations);
        }

        if species.is_empty() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("no annotation files found in {:?}", dir.as_ref()),
            ));
        }

        Ok(SpeciesDb { species })
    }

    pub fn get(&self, taxon_id: TaxonID) -> Option<&SpeciesAnnotations> {
        self.species.get(&taxon_id)
    }

    pub fn taxa(&self) -> Vec<(TaxonID, &str)> {
        let mut taxa: Vec<(TaxonID, &str)> = self
            .species
            .values()
            .map(|annotations| (annotations.taxon_id, annotations.species_name.as_str()))
            .collect();
        taxa.sort_unstable_by_key(|&(taxon_id, _)| taxon_id);
        taxa
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn into_single(mut self) -> Option<SpeciesAnnotations> {
        if self.species.len() == 1 {
            let taxon_id = *self.species.keys().next().unwrap();
            self.species.remove(&taxon_id)
        } else {
            None
        }
    }

    pub fn take(&mut self, taxon_id: TaxonID) -> Option<SpeciesAnnotations> {
        self.species.remove(&taxon_id)
    }
}

// Uniprot keyword files attach controlled-vocabulary words to GO terms.
// ID/SY/DE lines accumulate tokens; each GO line flushes the accumulated set
// onto that term; `//` closes the record.
pub fn parse_uniprot_keywords(
    path: impl AsRef<Path>,
) -> Result<FxHashMap<GOTermID, FxHashSet<String>>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    let mut keywords_by_term: FxHashMap<GOTermID, FxHashSet<String>> = FxHashMap::default();
    let mut pending: FxHashSet<String> = FxHashSet::default();

    for line in reader.lines() {
        let line = line?;

        if line.starts_with("//") {
            pending.clear();
            continue;
        }

        let (tag, body) = match line.split_once(' ') {
            Some(parts) => parts,
            None => continue,
        };

        match tag {
            "ID" | "SY" | "DE" => {
                for token in body.split(|c: char| !c.is_alphanumeric()) {
                    let token = token.to_lowercase();
                    if token.len() > 2 && token != "protein" {
                        pending.insert(token);
                    }
                }
            }
            "GO" => {
                if let Some(go_id) = parse_go_id(body) {
                    keywords_by_term
                        .entry(go_id)
                        .or_default()
                        .extend(pending.iter().cloned());
                }
            }
            _ => {}
        }
    }

    Ok(keywords_by_term)
}
