use rustc_hash::{FxHashMap, FxHashSet};
use rayon::prelude::*;
use chrono::NaiveDate;

use crate::parsers::obo_parser::{OboFile, OboTerm};
use crate::ontology::term::{extract_keywords, GOTermID, GoTerm, NameSpace};
use crate::ontology::OntologyError;

// Read-only after construction; shared freely across concurrent jobs.
#[derive(Debug, Default)]
pub struct Ontology {
    terms: FxHashMap<GOTermID, GoTerm>,
    aliases: FxHashMap<GOTermID, GOTermID>,
    pub data_version: Option<NaiveDate>,
}

impl Ontology {
    pub fn from_obo(obo: OboFile) -> Result<Self, OntologyError> {
        let mut terms: FxHashMap<GOTermID, GoTerm> = FxHashMap::default();

        for (&id, record) in &obo.terms {
            let namespace = record
                .namespace
                .ok_or(OntologyError::MissingNamespace { id })?;
            terms.insert(id, build_skeleton(id, namespace, record));
        }

        let mut aliases: FxHashMap<GOTermID, GOTermID> = FxHashMap::default();
        for (&id, record) in &obo.terms {
            aliases.insert(id, id);
            for &alt_id in &record.alt_ids {
                aliases.insert(alt_id, id);
            }
        }
        for (&id, record) in &obo.terms {
            if record.is_obsolete {
                if let Some(&replacement) = record.replaced_by.first() {
                    let canonical = *aliases.get(&replacement).ok_or(
                        OntologyError::UnresolvedReplacement { id, replacement },
                    )?;
                    aliases.insert(id, canonical);
                }
            }
        }

        wire_children(&mut terms, &aliases, &obo.terms);

        let ancestor_sets = compute_ancestor_sets(&terms);
        for (id, ancestors) in ancestor_sets {
            if let Some(term) = terms.get_mut(&id) {
                term.ancestors = ancestors;
            }
        }

        let root_ids: Vec<(GOTermID, GOTermID)> = terms
            .keys()
            .map(|&id| (id, walk_to_root(&terms, id)))
            .collect();
        for (id, root_id) in root_ids {
            if let Some(term) = terms.get_mut(&id) {
                term.root_id = root_id;
            }
        }

        Ok(Ontology {
            terms,
            aliases,
            data_version: obo.data_version,
        })
    }

    // Resolves alternate ids and obsolete replacements to the canonical term.
    pub fn term(&self, id: GOTermID) -> Option<&GoTerm> {
        let canonical = self.canonical_id(id)?;
        self.terms.get(&canonical)
    }

    pub fn canonical_id(&self, id: GOTermID) -> Option<GOTermID> {
        let mut current = *self.aliases.get(&id)?;
        // An obsolete replacement may itself be an alias; follow a short chain.
        for _ in 0..8 {
            match self.aliases.get(&current) {
                Some(&next) if next != current => current = next,
                _ => break,
            }
        }
        Some(current)
    }

    // The stored record under its own id, without alias resolution. Used to
    // detect obsolete and alternate-id input.
    pub fn raw_term(&self, id: GOTermID) -> Option<&GoTerm> {
        self.terms.get(&id)
    }

    pub fn contains(&self, id: GOTermID) -> bool {
        self.aliases.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoTerm> {
        self.terms.values()
    }

    pub fn is_child_of(&self, child: GOTermID, parent: GOTermID) -> bool {
        let parent = match self.canonical_id(parent) {
            Some(id) => id,
            None => return false,
        };
        match self.term(child) {
            Some(term) => term.ancestors.contains(&parent),
            None => false,
        }
    }

    pub fn common_ancestors(&self, a: GOTermID, b: GOTermID) -> FxHashSet<GOTermID> {
        match (self.term(a), self.term(b)) {
            (Some(term_a), Some(term_b)) => term_a
                .ancestors
                .intersection(&term_b.ancestors)
                .copied()
                .collect(),
            _ => FxHashSet::default(),
        }
    }

    pub fn siblings(&self, id: GOTermID) -> FxHashSet<GOTermID> {
        let mut siblings = FxHashSet::default();
        let term = match self.term(id) {
            Some(term) => term,
            None => return siblings,
        };
        for &parent_id in &term.parent_ids {
            if let Some(parent) = self.term(parent_id) {
                for &child_id in &parent.child_ids {
                    if child_id != term.id {
                        siblings.insert(child_id);
                    }
                }
            }
        }
        siblings
    }

    pub fn root(&self, id: GOTermID) -> Option<GOTermID> {
        self.term(id).map(|term| term.root_id)
    }

    // Fold controlled-vocabulary keywords (Uniprot) into the per-term sets
    // extracted from names and descriptions. Load-time only.
    pub fn augment_keywords(&mut self, extra: FxHashMap<GOTermID, FxHashSet<String>>) {
        for (id, words) in extra {
            if let Some(canonical) = self.canonical_id(id) {
                if let Some(term) = self.terms.get_mut(&canonical) {
                    term.keywords.extend(words);
                }
            }
        }
    }
}

fn build_skeleton(id: GOTermID, namespace: NameSpace, record: &OboTerm) -> GoTerm {
    let mut parent_ids: Vec<GOTermID> = Vec::with_capacity(record.is_a.len() + record.part_of.len());
    for &parent in record.is_a.iter().chain(record.part_of.iter()) {
        if !parent_ids.contains(&parent) {
            parent_ids.push(parent);
        }
    }

    let mut keywords = extract_keywords(&record.name, &record.definition);
    for synonym in &record.synonyms {
        keywords.extend(extract_keywords(synonym, ""));
    }

    GoTerm {
        id,
        namespace,
        name: record.name.clone(),
        description: record.definition.clone(),
        comment: record.comment.clone(),
        alt_ids: record.alt_ids.clone(),
        alt_names: record.synonyms.clone(),
        is_obsolete: record.is_obsolete,
        replaced_by: record.replaced_by.clone(),
        consider: record.consider.clone(),
        parent_ids,
        child_ids: Vec::new(),
        ancestors: FxHashSet::default(),
        root_id: id,
        keywords,
    }
}

fn wire_children(
    terms: &mut FxHashMap<GOTermID, GoTerm>,
    aliases: &FxHashMap<GOTermID, GOTermID>,
    records: &std::collections::HashMap<GOTermID, OboTerm>,
) {
    let resolve = |id: GOTermID| aliases.get(&id).copied();

    // Canonicalize parent references first; unknown targets are dropped.
    let mut resolved_parents: Vec<(GOTermID, Vec<GOTermID>)> = Vec::with_capacity(terms.len());
    for (&id, term) in terms.iter() {
        let parents: Vec<GOTermID> = term
            .parent_ids
            .iter()
            .filter_map(|&parent| resolve(parent))
            .filter(|&parent| parent != id)
            .collect();
        resolved_parents.push((id, parents));
    }

    for (id, parents) in &resolved_parents {
        for &parent in parents {
            if let Some(parent_term) = terms.get_mut(&parent) {
                if !parent_term.child_ids.contains(id) {
                    parent_term.child_ids.push(*id);
                }
            }
        }
    }

    for (id, parents) in resolved_parents {
        if let Some(term) = terms.get_mut(&id) {
            term.parent_ids = parents;
        }
    }

    for (&id, record) in records {
        let part_children: Vec<GOTermID> = record
            .has_part
            .iter()
            .filter_map(|&part| resolve(part))
            .filter(|&part| part != id)
            .collect();
        if let Some(term) = terms.get_mut(&id) {
            for part in part_children {
                if !term.child_ids.contains(&part) {
                    term.child_ids.push(part);
                }
            }
        }
    }
}

// One BFS per term over the canonical parent edges, in parallel across the
// whole map.
fn compute_ancestor_sets(
    terms: &FxHashMap<GOTermID, GoTerm>,
) -> Vec<(GOTermID, FxHashSet<GOTermID>)> {
    terms
        .par_iter()
        .map(|(&id, _)| {
            let mut ancestors = FxHashSet::default();
            let mut to_visit: Vec<GOTermID> = terms[&id].parent_ids.clone();
            while let Some(current) = to_visit.pop() {
                if ancestors.insert(current) {
                    if let Some(parent_term) = terms.get(&current) {
                        to_visit.extend(parent_term.parent_ids.iter().copied());
                    }
                }
            }
            (id, ancestors)
        })
        .collect()
}

fn walk_to_root(terms: &FxHashMap<GOTermID, GoTerm>, start: GOTermID) -> GOTermID {
    let mut current = start;
    let mut visited = FxHashSet::default();
    visited.insert(current);
    while let Some(&first_parent) = terms.get(&current).and_then(|t| t.parent_ids.first()) {
        if !visited.insert(first_parent) {
            break;
        }
        current = first_parent;
    }
    current
}
