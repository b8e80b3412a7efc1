use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use chrono::NaiveDate;
use ucfirst::ucfirst;
use regex::Regex;
use lazy_static::lazy_static;

use crate::ontology::term::{GOTermID, NameSpace};
use crate::ontology::OntologyError;

pub type OboMap = HashMap<GOTermID, OboTerm>;

#[derive(Debug, Clone, Default)]
pub struct OboTerm {
    pub id: GOTermID,
    pub name: String,
    pub namespace: Option<NameSpace>,
    pub definition: String,
    pub comment: String,
    pub alt_ids: Vec<GOTermID>,
    pub synonyms: Vec<String>,
    pub is_obsolete: bool,
    pub replaced_by: Vec<GOTermID>,
    pub consider: Vec<GOTermID>,
    pub is_a: Vec<GOTermID>,
    pub part_of: Vec<GOTermID>,
    pub has_part: Vec<GOTermID>,
}

impl OboTerm {
    pub fn new() -> Self {
        OboTerm {
            name: String::with_capacity(90),
            definition: String::with_capacity(350),
            ..OboTerm::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OboFile {
    pub terms: OboMap,
    pub data_version: Option<NaiveDate>,
}

lazy_static! {
    static ref GO_ID_REGEX: Regex = Regex::new(r"GO:(\d{1,7})").unwrap();
}

lazy_static! {
    static ref SYNONYM_REGEX: Regex = Regex::new(r#"synonym:\s+"([^"]*)""#).unwrap();
}

lazy_static! {
    static ref RELATIONSHIP_REGEX: Regex =
        Regex::new(r"relationship:\s+(\w+)\s+GO:(\d{1,7})(?:\s+!.*)?").unwrap();
}

lazy_static! {
    static ref DATA_VERSION_REGEX: Regex = Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap();
}

pub fn parse_go_id(input: &str) -> Option<GOTermID> {
    GO_ID_REGEX
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_namespace(input: &str) -> Option<NameSpace> {
    match input {
        "biological_process" => Some(NameSpace::BiologicalProcess),
        "molecular_function" => Some(NameSpace::MolecularFunction),
        "cellular_component" => Some(NameSpace::CellularComponent),
        _ => None,
    }
}

fn parse_data_version(input: &str) -> Option<NaiveDate> {
    DATA_VERSION_REGEX
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

fn flush_term(
    terms: &mut OboMap,
    term: &mut Option<OboTerm>,
    line_number: usize,
) -> Result<(), OntologyError> {
    if let Some(finished) = term.take() {
        if finished.id == 0 {
            return Err(OntologyError::MissingId { line: line_number });
        }
        if finished.namespace.is_none() {
            return Err(OntologyError::MissingNamespace { id: finished.id });
        }
        terms.insert(finished.id, finished);
    }
    Ok(())
}

pub fn parse_obo_file(obo_file_path: impl AsRef<Path>) -> Result<OboFile, OntologyError> {
    let obo = File::open(obo_file_path.as_ref())?;
    let reader = BufReader::with_capacity(3000 * 1024, obo);

    let mut obo_file = OboFile {
        terms: HashMap::with_capacity(48_000),
        data_version: None,
    };

    let mut current_term: Option<OboTerm> = None;
    let mut in_other_stanza = false;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        if line == "[Term]" {
            flush_term(&mut obo_file.terms, &mut current_term, line_number)?;
            current_term = Some(OboTerm::new());
            in_other_stanza = false;
            continue;
        }
        if line.starts_with('[') {
            flush_term(&mut obo_file.terms, &mut current_term, line_number)?;
            in_other_stanza = true;
            continue;
        }
        if in_other_stanza {
            continue;
        }

        let term = match current_term.as_mut() {
            Some(term) => term,
            None => {
                if line.starts_with("data-version:") {
                    obo_file.data_version = parse_data_version(&line);
                }
                continue;
            }
        };

        match line {
            line if line.starts_with("id: ") => {
                if let Some(id) = parse_go_id(&line) {
                    term.id = id;
                }
            }
            line if line.starts_with("name: ") => {
                if let Some(name) = line.split(": ").nth(1) {
                    term.name = ucfirst(name);
                }
            }
            line if line.starts_with("namespace: ") => {
                term.namespace = line.split(": ").nth(1).and_then(parse_namespace);
            }
            line if line.starts_with("def: ") => {
                if let Some(definition) = line.split('"').nth(1) {
                    term.definition = definition.to_string();
                }
            }
            line if line.starts_with("comment: ") => {
                if let Some(comment) = line.split(": ").nth(1) {
                    term.comment = comment.to_string();
                }
            }
            line if line.starts_with("alt_id: ") => {
                if let Some(alt_id) = parse_go_id(&line) {
                    term.alt_ids.push(alt_id);
                }
            }
            line if line.starts_with("synonym: ") => {
                if let Some(caps) = SYNONYM_REGEX.captures(&line) {
                    term.synonyms.push(caps[1].to_string());
                }
            }
            line if line.starts_with("is_obsolete: ") => {
                term.is_obsolete = line.ends_with("true");
            }
            line if line.starts_with("replaced_by: ") => {
                if let Some(replacement) = parse_go_id(&line) {
                    term.replaced_by.push(replacement);
                }
            }
            line if line.starts_with("consider: ") => {
                if let Some(considered) = parse_go_id(&line) {
                    term.consider.push(considered);
                }
            }
            line if line.starts_with("is_a: ") => {
                if let Some(parent_id) = parse_go_id(&line) {
                    term.is_a.push(parent_id);
                }
            }
            line if line.starts_with("relationship: ") => {
                if let Some(caps) = RELATIONSHIP_REGEX.captures(&line) {
                    let target: GOTermID = match caps[2].parse() {
                        Ok(id) => id,
                        Err(_) => continue,
                    };
                    // Only part_of and has_part carry graph structure; the
                    // regulates family, occurs_in, ends_during and
                    // happens_during are recognized but ignored.
                    match &caps[1] {
                        "part_of" => term.part_of.push(target),
                        "has_part" => term.has_part.push(target),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let final_line = obo_file.terms.len();
    flush_term(&mut obo_file.terms, &mut current_term, final_line)?;

    Ok(obo_file)
}
