use rustc_hash::FxHashSet;

pub type GOTermID = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameSpace {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
    Mixed,
}

impl NameSpace {
    pub fn label(&self) -> &'static str {
        match self {
            NameSpace::BiologicalProcess => "Biological Process",
            NameSpace::MolecularFunction => "Molecular Function",
            NameSpace::CellularComponent => "Cellular Component",
            NameSpace::Mixed => "Mixed",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            NameSpace::BiologicalProcess => "BP",
            NameSpace::MolecularFunction => "MF",
            NameSpace::CellularComponent => "CC",
            NameSpace::Mixed => "Mixed",
        }
    }
}

impl std::fmt::Display for NameSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct GoTerm {
    pub id: GOTermID,
    pub namespace: NameSpace,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub alt_ids: Vec<GOTermID>,
    pub alt_names: Vec<String>,
    pub is_obsolete: bool,
    pub replaced_by: Vec<GOTermID>,
    pub consider: Vec<GOTermID>,
    pub parent_ids: Vec<GOTermID>,
    pub child_ids: Vec<GOTermID>,
    pub ancestors: FxHashSet<GOTermID>,
    pub root_id: GOTermID,
    pub keywords: FxHashSet<String>,
}

impl GoTerm {
    pub fn formatted_id(&self) -> String {
        format!("GO:{:07}", self.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }
}

impl PartialEq for GoTerm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GoTerm {}

// Words of three letters or more from the name and description, lowercased.
// "protein" is ubiquitous in GO labels and carries no signal.
pub fn extract_keywords(name: &str, description: &str) -> FxHashSet<String> {
    let mut keywords = FxHashSet::default();
    for source in [name, description] {
        for token in source.split(|c: char| !c.is_alphanumeric()) {
            let token = token.to_lowercase();
            if token.len() > 2 && token != "protein" {
                keywords.insert(token);
            }
        }
    }
    keywords
}
