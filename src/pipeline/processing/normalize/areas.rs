use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{AREA_SUFFIXES, STATEWIDE};
use crate::domain::AffectedAreas;
use crate::error::{CompilerError, Result};

static SUFFIX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    AREA_SUFFIXES
        .iter()
        .map(|suffix| {
            Regex::new(&format!("(?i){}", regex::escape(suffix))).expect("escaped suffix pattern")
        })
        .collect()
});

/// Canonicalizes county-equivalent names so that fragments from different
/// sources spell the same area the same way. The alias table is supplied by
/// configuration: keys match case-insensitively, values are inserted verbatim.
#[derive(Debug, Clone, Default)]
pub struct AreaNormalizer {
    aliases: BTreeMap<String, String>,
}

/// Case-folded form of an area name, used only for comparison.
pub fn area_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl AreaNormalizer {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .iter()
            .map(|(from, to)| (from.trim().to_lowercase(), to.trim().to_string()))
            .collect();
        Self { aliases }
    }

    /// Display form of one area name, or `None` when nothing is left after
    /// stripping. Suffixes are removed and alias tokens replaced; every other
    /// token keeps the source's spelling.
    pub fn canonical_name(&self, raw: &str) -> Option<String> {
        let mut stripped = raw.trim().to_string();
        for pattern in SUFFIX_PATTERNS.iter() {
            stripped = pattern.replace_all(&stripped, "").trim().to_string();
        }

        let words: Vec<&str> = stripped
            .split_whitespace()
            .map(|token| {
                self.aliases
                    .get(&token.to_lowercase())
                    .map(String::as_str)
                    .unwrap_or(token)
            })
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    /// Normalize a whole area list. Any "statewide" entry, or the explicit flag,
    /// yields the entire-jurisdiction sentinel. Names differing only in case
    /// collapse to the first spelling seen.
    pub fn normalize_all<'a, I>(&self, names: I, statewide: bool) -> Result<AffectedAreas>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if statewide {
            return Ok(AffectedAreas::Entire);
        }

        let mut by_key: BTreeMap<String, String> = BTreeMap::new();
        for name in names {
            match self.canonical_name(name) {
                Some(canonical) if canonical.eq_ignore_ascii_case(STATEWIDE) => {
                    return Ok(AffectedAreas::Entire);
                }
                Some(canonical) => {
                    by_key.entry(area_key(&canonical)).or_insert(canonical);
                }
                None => {}
            }
        }

        if by_key.is_empty() {
            return Err(CompilerError::MissingField("affectedAreas".to_string()));
        }
        Ok(AffectedAreas::Areas(by_key.into_values().collect::<BTreeSet<_>>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> AreaNormalizer {
        let aliases: BTreeMap<String, String> = [("St.", "Saint"), ("ft.", "fort")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AreaNormalizer::new(&aliases)
    }

    #[test]
    fn test_suffixes_are_stripped() {
        let n = normalizer();
        assert_eq!(n.canonical_name("Harris (County)").as_deref(), Some("Harris"));
        assert_eq!(n.canonical_name("Orleans (Parish)").as_deref(), Some("Orleans"));
        assert_eq!(n.canonical_name("Juneau (City and Borough)").as_deref(), Some("Juneau"));
        assert_eq!(n.canonical_name("Nome (Census Area)").as_deref(), Some("Nome"));
        assert_eq!(n.canonical_name("San Juan (Municipio)").as_deref(), Some("San Juan"));
    }

    #[test]
    fn test_aliases_apply_without_recasing() {
        let n = normalizer();
        assert_eq!(n.canonical_name("St. Louis (County)").as_deref(), Some("Saint Louis"));
        assert_eq!(n.canonical_name("ST.   LOUIS").as_deref(), Some("Saint LOUIS"));
        // Alias values are inserted as configured
        assert_eq!(n.canonical_name("Ft. Bend").as_deref(), Some("fort Bend"));
    }

    #[test]
    fn test_source_spelling_is_preserved() {
        let n = normalizer();
        assert_eq!(
            n.canonical_name("Matanuska-Susitna (Borough)").as_deref(),
            Some("Matanuska-Susitna")
        );
        assert_eq!(n.canonical_name("DeKalb (County)").as_deref(), Some("DeKalb"));
        assert_eq!(n.canonical_name("McLennan (County)").as_deref(), Some("McLennan"));
        assert_eq!(n.canonical_name("LaSalle (Parish)").as_deref(), Some("LaSalle"));
    }

    #[test]
    fn test_case_variants_share_a_key() {
        let n = normalizer();
        let areas = n
            .normalize_all(["Saint Louis (County)", "ST. LOUIS", "st. louis", "DeKalb", "DEKALB"], false)
            .unwrap();
        let names: Vec<String> = areas.into();
        assert_eq!(names, vec!["DeKalb", "Saint Louis"]);
        assert_eq!(area_key("Saint  LOUIS"), area_key("saint louis"));
    }

    #[test]
    fn test_statewide_entry_becomes_sentinel() {
        let n = normalizer();
        let areas = n.normalize_all(["Harris", "statewide"], false).unwrap();
        assert!(areas.is_entire());
        assert!(n.normalize_all(Vec::<&str>::new(), true).unwrap().is_entire());
    }

    #[test]
    fn test_empty_list_is_missing_field() {
        let n = normalizer();
        assert!(n.normalize_all(["", "(County)"], false).is_err());
    }

    #[test]
    fn test_duplicates_collapse() {
        let n = normalizer();
        let areas = n.normalize_all(["Harris (County)", "harris", "HARRIS"], false).unwrap();
        assert_eq!(areas.len(), 1);
    }
}
