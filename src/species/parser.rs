//! Species label parser
//!
//! Classifier labels come in a handful of shapes. The parser tries the most
//! structured interpretation first and degrades to less structured ones; it
//! never fails.
//!
//! | input | scientific | common | code |
//! |---|---|---|---|
//! | `Turdus migratorius_American Robin_amerobin` | `Turdus migratorius` | `American Robin` | `amerobin` |
//! | `Corvus brachyrhynchos_American Crow` | `Corvus brachyrhynchos` | `American Crow` | |
//! | `Common Blackbird` | | `Common Blackbird` | |
//! | anything else | input | input | |

use tracing::debug;

use crate::models::Species;

/// Separator between the fields of a classifier label or stored species key
pub const SPECIES_KEY_DELIMITER: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSpecies {
    pub scientific_name: String,
    pub common_name: String,
    pub species_code: String,
}

impl ParsedSpecies {
    fn verbatim(raw: &str) -> Self {
        Self {
            scientific_name: raw.to_string(),
            common_name: raw.to_string(),
            species_code: String::new(),
        }
    }

    /// Unpersisted species value (id 0) carrying the parsed fields
    pub fn into_species(self) -> Species {
        Species::new(self.scientific_name, self.common_name, self.species_code)
    }
}

/// Decode a classifier label into species identity fields
pub fn parse_species_string(raw: &str) -> ParsedSpecies {
    if raw.is_empty() || raw.contains('\t') || raw.contains('\n') {
        return ParsedSpecies::verbatim(raw);
    }

    let parts: Vec<&str> = raw.splitn(3, SPECIES_KEY_DELIMITER).collect();
    match parts.as_slice() {
        [scientific, common, code] => ParsedSpecies {
            scientific_name: (*scientific).to_string(),
            common_name: (*common).to_string(),
            species_code: (*code).to_string(),
        },
        [scientific, common] => ParsedSpecies {
            scientific_name: (*scientific).to_string(),
            common_name: (*common).to_string(),
            species_code: String::new(),
        },
        [common] if common.contains(' ') => ParsedSpecies {
            scientific_name: String::new(),
            common_name: (*common).to_string(),
            species_code: String::new(),
        },
        _ => {
            debug!("Species string has an unexpected format: {:?}", raw);
            ParsedSpecies::verbatim(raw)
        }
    }
}

/// Encode a species as the composite key stored with each prediction
///
/// The code segment is only appended when the species has one, so the key
/// decodes back to the same fields through [`parse_species_string`].
pub fn format_species_key(species: &Species) -> String {
    let mut key = String::with_capacity(
        species.scientific_name.len() + species.common_name.len() + species.species_code.len() + 2,
    );
    key.push_str(&species.scientific_name);
    key.push(SPECIES_KEY_DELIMITER);
    key.push_str(&species.common_name);
    if !species.species_code.is_empty() {
        key.push(SPECIES_KEY_DELIMITER);
        key.push_str(&species.species_code);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case::three_segments("Turdus migratorius_American Robin_amerobin", "Turdus migratorius", "American Robin", "amerobin")]
    #[case::two_segments("Corvus brachyrhynchos_American Crow", "Corvus brachyrhynchos", "American Crow", "")]
    #[case::bare_common_name("Common Blackbird", "", "Common Blackbird", "")]
    #[case::empty("", "", "", "")]
    #[case::single_word("Noise", "Noise", "Noise", "")]
    #[case::tab("Corvus\tcorax_Raven", "Corvus\tcorax_Raven", "Corvus\tcorax_Raven", "")]
    #[case::newline("Corvus corax\n", "Corvus corax\n", "Corvus corax\n", "")]
    #[case::extra_underscores("Genus species_Common Name_code_extra", "Genus species", "Common Name", "code_extra")]
    fn test_parse_species_string(
        #[case] raw: &str,
        #[case] scientific: &str,
        #[case] common: &str,
        #[case] code: &str,
    ) {
        let parsed = parse_species_string(raw);
        assert_eq!(parsed.scientific_name, scientific);
        assert_eq!(parsed.common_name, common);
        assert_eq!(parsed.species_code, code);
    }

    #[test]
    fn test_format_species_key() {
        let robin = Species::new("Turdus migratorius", "American Robin", "amerobin");
        assert_eq!(format_species_key(&robin), "Turdus migratorius_American Robin_amerobin");

        let custom = Species::new("Corvus brachyrhynchos", "American Crow", "");
        assert_eq!(format_species_key(&custom), "Corvus brachyrhynchos_American Crow");
    }

    proptest! {
        #[test]
        fn parser_is_total(raw in ".*") {
            let _ = parse_species_string(&raw);
        }

        #[test]
        fn species_key_decodes_to_same_fields(
            scientific in "[A-Za-z .-]{0,24}",
            common in "[A-Za-z '-]{0,24}",
            code in "[a-z0-9]{0,8}",
        ) {
            let species = Species::new(scientific.clone(), common.clone(), code.clone());
            let parsed = parse_species_string(&format_species_key(&species));

            prop_assert_eq!(parsed.scientific_name, scientific);
            prop_assert_eq!(parsed.common_name, common);
            prop_assert_eq!(parsed.species_code, code);
        }
    }
}
