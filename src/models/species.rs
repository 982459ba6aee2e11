use serde::{Deserialize, Serialize};

/// Species identifier assigned by the repository (0 = not yet persisted)
pub type SpeciesId = u32;

/// Species identity record
///
/// The scientific name is the natural key. The taxonomy (eBird) code is
/// empty for custom models whose labels are not part of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub scientific_name: String,
    pub common_name: String,
    pub species_code: String,
}

impl Species {
    pub fn new<S, C, K>(scientific_name: S, common_name: C, species_code: K) -> Self
    where
        S: Into<String>,
        C: Into<String>,
        K: Into<String>,
    {
        Self {
            id: 0,
            scientific_name: scientific_name.into(),
            common_name: common_name.into(),
            species_code: species_code.into(),
        }
    }

    pub fn with_id(mut self, id: SpeciesId) -> Self {
        self.id = id;
        self
    }

    /// At least one of the name fields is known
    pub fn is_resolved(&self) -> bool {
        !self.scientific_name.is_empty() || !self.common_name.is_empty()
    }

    /// Whether the repository has assigned an id yet
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.common_name.is_empty(), self.scientific_name.is_empty()) {
            (false, false) => write!(f, "{} ({})", self.common_name, self.scientific_name),
            (false, true) => write!(f, "{}", self.common_name),
            _ => write!(f, "{}", self.scientific_name),
        }
    }
}
