use thiserror::Error;

pub mod term;
pub mod ontology;
pub mod annotations;

pub use term::{GOTermID, GoTerm, NameSpace};
pub use ontology::Ontology;
pub use annotations::SpeciesAnnotations;

use term::GOTermID as Id;

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("failed to read ontology file: {0}")]
    Io(#[from] std::io::Error),

    #[error("term stanza ending near line {line} has no GO id")]
    MissingId { line: usize },

    #[error("GO:{id:07} has no namespace")]
    MissingNamespace { id: Id },

    #[error("obsolete GO:{id:07} is replaced by GO:{replacement:07}, which is not a known term")]
    UnresolvedReplacement { id: Id, replacement: Id },
}
