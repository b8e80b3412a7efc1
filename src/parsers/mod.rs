pub mod obo_parser;
pub mod term_list_parser;
pub mod annotation_parser;
