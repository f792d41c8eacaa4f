//! Localized strings: area names/descriptions with per-phase and
//! per-weather variants, object names and gated-interaction texts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tiered texts for the inspect → examine → search chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionTexts {
    pub inspect_first: Option<String>,
    pub inspect_repeat: Option<String>,
    pub examine: Option<String>,
    pub search: Option<String>,
}

/// Strings for one interactable object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStrings {
    pub nome: Option<String>,
    pub descrizione: Option<String>,
    pub interazioni: InteractionTexts,
}

/// Strings for one area (micro room).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaStrings {
    pub nome: Option<String>,
    pub descrizione: Option<String>,
    /// Variant fragments keyed by weather or daytime token.
    pub varianti: BTreeMap<String, String>,
}

/// The whole localized string table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Strings {
    pub aree: BTreeMap<String, AreaStrings>,
    pub oggetti: BTreeMap<String, ObjectStrings>,
}

impl Strings {
    pub fn object_name<'a>(&'a self, object_id: &'a str) -> &'a str {
        self.oggetti
            .get(object_id)
            .and_then(|o| o.nome.as_deref())
            .unwrap_or(object_id)
    }

    pub fn object_description(&self, object_id: &str) -> &str {
        self.oggetti
            .get(object_id)
            .and_then(|o| o.descrizione.as_deref())
            .unwrap_or("")
    }

    pub fn area_name<'a>(&'a self, micro_id: &'a str) -> &'a str {
        self.aree
            .get(micro_id)
            .and_then(|a| a.nome.as_deref())
            .unwrap_or(micro_id)
    }

    pub fn area_description(&self, micro_id: &str) -> &str {
        self.aree
            .get(micro_id)
            .and_then(|a| a.descrizione.as_deref())
            .unwrap_or("")
    }

    /// Base description plus variant fragments, weather variant first.
    pub fn compose_area_description(
        &self,
        micro_id: &str,
        daytime_token: &str,
        weather_token: &str,
    ) -> String {
        let base = self.area_description(micro_id).to_string();
        let Some(area) = self.aree.get(micro_id) else {
            return base;
        };
        let mut segments = Vec::new();
        if let Some(v) = area.varianti.get(weather_token) {
            segments.push(v.as_str());
        }
        if let Some(v) = area.varianti.get(daytime_token) {
            segments.push(v.as_str());
        }
        if segments.is_empty() {
            base
        } else {
            format!("{base} {}", segments.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings() -> Strings {
        serde_json::from_value(serde_json::json!({
            "aree": {
                "clearing": {
                    "nome": "Radura",
                    "descrizione": "Una radura silenziosa.",
                    "varianti": {
                        "pioggia": "La pioggia ticchetta sulle foglie.",
                        "notte": "Il buio inghiotte i contorni."
                    }
                }
            },
            "oggetti": {
                "cippo": {"nome": "Cippo di pietra", "descrizione": "Simboli consumati."}
            }
        }))
        .unwrap()
    }

    #[test]
    fn variant_composition_order() {
        let s = strings();
        let text = s.compose_area_description("clearing", "notte", "pioggia");
        assert_eq!(
            text,
            "Una radura silenziosa. La pioggia ticchetta sulle foglie. Il buio inghiotte i contorni."
        );
    }

    #[test]
    fn no_variant_returns_base() {
        let s = strings();
        assert_eq!(
            s.compose_area_description("clearing", "giorno", "sereno"),
            "Una radura silenziosa."
        );
    }

    #[test]
    fn missing_ids_fall_back() {
        let s = strings();
        assert_eq!(s.area_name("nowhere"), "nowhere");
        assert_eq!(s.object_name("cippo"), "Cippo di pietra");
        assert_eq!(s.object_description("nothing"), "");
    }
}
