use std::time::Duration;
use clap::ValueEnum;

use crate::analysis::similarity::SimilarityMeasure;

pub const MAX_TERMS_PER_NAMESPACE: usize = 2000;
pub const LARGE_RESULT_WARNING: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    PValue,
    Higher,
    Lower,
    HigherAbsolute,
    HigherAbsLog2,
}

impl Default for ValueType {
    fn default() -> Self {
        ValueType::PValue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    CommandLine,
    Api,
}

impl Default for RequestSource {
    fn default() -> Self {
        RequestSource::CommandLine
    }
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub cutoff: f64,
    pub value_type: ValueType,
    pub measure: SimilarityMeasure,
    pub remove_obsolete: bool,
    pub request_source: RequestSource,
    pub timeout: Option<Duration>,
    // Larger transformed values win tie-breaks when set.
    pub keep_greater: bool,
    // Compare |log10| of transformed values instead of the values themselves.
    pub compare_log_transformed: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            cutoff: 0.7,
            value_type: ValueType::default(),
            measure: SimilarityMeasure::default(),
            remove_obsolete: false,
            request_source: RequestSource::default(),
            timeout: None,
            keep_greater: true,
            compare_log_transformed: false,
        }
    }
}

impl JobConfig {
    // The retention threshold only comes in four supported resolutions.
    pub fn quantized_cutoff(&self) -> f64 {
        quantize_cutoff(self.cutoff)
    }
}

pub fn quantize_cutoff(cutoff: f64) -> f64 {
    if cutoff < 0.45 {
        0.4
    } else if cutoff < 0.6 {
        0.5
    } else if cutoff < 0.8 {
        0.7
    } else {
        0.9
    }
}
