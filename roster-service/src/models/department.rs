//! Department model - the municipal department roster.

use serde::{Deserialize, Serialize};

/// A municipal department. The roster is managed by excluded admin screens;
/// the role engine only walks its ids when sweeping supervisor links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub active: bool,
}

impl Department {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            active: true,
        }
    }
}
