pub mod similarity;
pub mod dispensability;
pub mod mds;
pub mod threshold_graph;
pub mod word_summary;
