use crate::ontology::term::{GOTermID, GoTerm, NameSpace};

// Per-job mutable view of a GO term: the user's value, the transformed
// value, and everything the clustering and layout stages write back.
// Identity is the GO term id.
#[derive(Debug, Clone)]
pub struct JobTerm {
    pub id: GOTermID,
    pub name: String,
    pub namespace: NameSpace,
    pub value: f64,
    pub transformed_value: f64,
    pub uniqueness: f64,
    pub dispensability: f64,
    pub annotation_size: f64,
    pub log_annotation_size: f64,
    pub annotation_frequency: f64,
    pub pinned: bool,
    pub representative_id: Option<GOTermID>,
    pub dispensed_by_id: Option<GOTermID>,
    pub pc: [f64; 2],
    pub pc3: [f64; 3],
    pub user_values: Vec<f64>,
}

impl JobTerm {
    pub fn new(term: &GoTerm) -> Self {
        JobTerm {
            id: term.id,
            name: term.name.clone(),
            namespace: term.namespace,
            value: f64::NAN,
            transformed_value: f64::NAN,
            uniqueness: f64::NAN,
            dispensability: 0.0,
            annotation_size: f64::NAN,
            log_annotation_size: f64::NAN,
            annotation_frequency: f64::NAN,
            pinned: false,
            representative_id: None,
            dispensed_by_id: None,
            pc: [f64::NAN; 2],
            pc3: [f64::NAN; 3],
            user_values: Vec::new(),
        }
    }

    pub fn formatted_id(&self) -> String {
        format!("GO:{:07}", self.id)
    }

    // Retained terms carry dispensability zero; NaN means the term never
    // entered clustering and is kept as well.
    pub fn is_retained(&self, cutoff: f64) -> bool {
        self.dispensability.is_nan() || self.dispensability <= cutoff
    }
}

impl PartialEq for JobTerm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JobTerm {}
