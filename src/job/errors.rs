use thiserror::Error;

use crate::ontology::term::NameSpace;

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("p-value {0} is outside the [0, 1] interval")]
    InvalidPValue(f64),

    #[error("value {0} must be positive to take its log2")]
    NonPositiveLogValue(f64),

    #[error("extremely large list: {count} {namespace} terms exceed the supported maximum of {limit}")]
    TermListTooLarge {
        namespace: NameSpace,
        count: usize,
        limit: usize,
    },

    #[error("no valid GO terms were found in any namespace")]
    EmptyResult,

    #[error("the job did not finish in a timely fashion")]
    Cancelled,

    #[error("similarity matrix was not computed for {namespace}")]
    MissingMatrix { namespace: NameSpace },

    #[error("ontology is not initialized")]
    OntologyNotInitialized,
}

// Warnings and errors split into a user-visible tier and a developer tier so
// the front end can render them separately. Fatal errors land on the error
// lists; the job still raises its finish event with partial results.
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub user_warnings: Vec<String>,
    pub user_errors: Vec<String>,
    pub developer_warnings: Vec<String>,
    pub developer_errors: Vec<String>,
}

impl JobReport {
    pub fn warn_user(&mut self, message: impl Into<String>) {
        self.user_warnings.push(message.into());
    }

    pub fn error_user(&mut self, error: &JobError) {
        self.user_errors.push(error.to_string());
    }

    pub fn warn_developer(&mut self, message: impl Into<String>) {
        self.developer_warnings.push(message.into());
    }

    pub fn error_developer(&mut self, message: impl Into<String>) {
        self.developer_errors.push(message.into());
    }

    pub fn has_user_errors(&self) -> bool {
        !self.user_errors.is_empty()
    }

    pub fn merge(&mut self, other: JobReport) {
        self.user_warnings.extend(other.user_warnings);
        self.user_errors.extend(other.user_errors);
        self.developer_warnings.extend(other.developer_warnings);
        self.developer_errors.extend(other.developer_errors);
    }
}
