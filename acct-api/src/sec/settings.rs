use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

/// permission key -> role key -> allowed
pub type Matrix = BTreeMap<String, BTreeMap<String, bool>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    pub version: u64,
    pub matrix: Matrix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutSettings {
    pub version: u64,
    pub matrix: Matrix,
}
