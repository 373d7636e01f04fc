//! Classification des tags hiérarchiques digiKam
//!
//! Les médias annotés portent une liste de chemins de tags séparés par `|`
//! (champ XMP `HierarchicalSubject`). Quatre familles sont exploitées:
//!
//! - `Nature|…`: identification d'espèce, le nom est suivi d'un bloc
//!   `{nom scientifique}` dans le dernier segment
//! - `Quantité|…`: effectif, dernier segment `Nom_3`
//! - `Détails|…`: précision (sexe, âge, comportement), dernier segment
//!   `Nom_texte`
//! - `Continents et pays|…|Isère|Commune`: localisation administrative
//!
//! Les expressions sont compilées une seule fois à la construction du
//! classifieur, qui est ensuite passé par référence à tous les consommateurs.

use regex::Regex;
use tracing::error;

use crate::types::{Classification, SpeciesCount, SpeciesDetail, UNKNOWN};

/// Préfixe de localisation par défaut (communes de l'Isère)
pub const DEFAULT_REGION_PREFIX: &str =
    "Continents et pays|Europe|France {France} {FR} {FRA}|Auvergne-Rhône-Alpes|Isère";

/// Extracteur d'espèces, d'effectifs, de détails et de communes
#[derive(Debug)]
pub struct TagClassifier {
    species_name: Regex,
    count_entry: Regex,
    detail_entry: Regex,
    place: Regex,
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_PREFIX)
    }
}

impl TagClassifier {
    /// Construit un classifieur pour le préfixe de localisation donné
    /// (chemin de tag littéral jusqu'au département, sans `|` final).
    pub fn new(region_prefix: &str) -> Self {
        Self {
            species_name: compiled(r"[\w\s']+ \{"),
            count_entry: compiled(r"([\w\s]+)_(\d+)"),
            detail_entry: compiled(r"([\w\s]+)_([\w\s]+)"),
            place: compiled(&format!(r"^{}\|", regex::escape(region_prefix))),
        }
    }

    /// Noms d'espèces des tags `Nature`, dans l'ordre des tags.
    ///
    /// Sans bloc `{…}` exploitable le nom de remplacement [`UNKNOWN`] est
    /// émis et une erreur journalisée; le média reste ainsi comptabilisé.
    pub fn species(&self, tags: &[String]) -> Vec<String> {
        let mut names = Vec::new();
        for tag in tags {
            if !tag.starts_with("Nature") {
                continue;
            }
            let segment = last_segment(tag);
            match self.species_name.find(segment) {
                Some(m) => {
                    let name = m.as_str().strip_suffix(" {").unwrap_or(m.as_str());
                    names.push(name.to_string());
                }
                None => {
                    error!("No species name in nature tag: {tag}");
                    names.push(UNKNOWN.to_string());
                }
            }
        }
        names
    }

    /// Effectifs des tags `Quantité`, dans l'ordre des tags.
    ///
    /// Un effectif au-delà de `u32` est ramené à 1, un segment inexploitable
    /// devient `Inconnu`/1 avec erreur journalisée.
    pub fn quantities(&self, tags: &[String]) -> Vec<SpeciesCount> {
        let mut counts = Vec::new();
        for tag in tags {
            if !tag.starts_with("Quantité") {
                continue;
            }
            let segment = last_segment(tag);
            match self.count_entry.captures(segment) {
                Some(caps) => counts.push(SpeciesCount {
                    species: caps[1].to_string(),
                    count: caps[2].parse().unwrap_or(1),
                }),
                None => {
                    error!("No count in quantity tag: {tag}");
                    counts.push(SpeciesCount {
                        species: UNKNOWN.to_string(),
                        count: 1,
                    });
                }
            }
        }
        counts
    }

    /// Détails des tags `Détails`, dans l'ordre des tags.
    /// Un segment inexploitable devient `Inconnu` avec un texte vide.
    pub fn details(&self, tags: &[String]) -> Vec<SpeciesDetail> {
        let mut details = Vec::new();
        for tag in tags {
            if !tag.starts_with("Détails") {
                continue;
            }
            let segment = last_segment(tag);
            match self.detail_entry.captures(segment) {
                Some(caps) => details.push(SpeciesDetail {
                    species: caps[1].to_string(),
                    text: caps[2].to_string(),
                }),
                None => {
                    error!("No detail in details tag: {tag}");
                    details.push(SpeciesDetail {
                        species: UNKNOWN.to_string(),
                        text: String::new(),
                    });
                }
            }
        }
        details
    }

    /// Communes des tags de localisation, dans l'ordre des tags.
    /// Le dernier segment du chemin est retenu tel quel.
    pub fn locations(&self, tags: &[String]) -> Vec<String> {
        let mut locations = Vec::new();
        for tag in tags {
            if self.place.is_match(tag) {
                locations.push(last_segment(tag).to_string());
            }
        }
        locations
    }

    /// Applique les quatre extractions sur la liste de tags d'un média
    pub fn classify(&self, tags: &[String]) -> Classification {
        Classification {
            species: self.species(tags),
            quantities: self.quantities(tags),
            details: self.details(tags),
            locations: self.locations(tags),
        }
    }
}

/// Dernier segment d'un chemin de tag
fn last_segment(tag: &str) -> &str {
    tag.rsplit('|').next().unwrap_or(tag)
}

// Motifs fixes ou échappés: la compilation ne peut pas échouer.
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}
