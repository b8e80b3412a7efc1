pub mod xgmml;
pub mod js;
pub mod tsv;
pub mod r_script;
