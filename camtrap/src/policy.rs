//! Politique d'espèces: exclusions, corrections de noms, sensibilité
//!
//! La politique est construite une fois (table intégrée ou fichier fourni par
//! l'application) puis passée par référence à tout code qui filtre, corrige ou
//! dégrade des noms d'espèces.

use std::collections::{HashMap, HashSet};

use crate::error::{CamtrapError, Result};

/// Grain de dégradation des coordonnées d'une espèce sensible
///
/// Le grain donne la taille de la maille sur laquelle les coordonnées
/// publiées sont recentrées (1, 2, 5 ou 10 km).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grain {
    M1,
    M2,
    M5,
    M10,
}

impl Grain {
    /// Taille de la maille en mètres
    pub fn cell_size(self) -> f64 {
        match self {
            Grain::M1 => 1000.0,
            Grain::M2 => 2000.0,
            Grain::M5 => 5000.0,
            Grain::M10 => 10000.0,
        }
    }

    /// Code du grain tel qu'écrit dans les fichiers de politique
    pub fn code(self) -> &'static str {
        match self {
            Grain::M1 => "M1",
            Grain::M2 => "M2",
            Grain::M5 => "M5",
            Grain::M10 => "M10",
        }
    }

    /// Parse un code de grain, erreur sur code inconnu
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "M1" => Ok(Grain::M1),
            "M2" => Ok(Grain::M2),
            "M5" => Ok(Grain::M5),
            "M10" => Ok(Grain::M10),
            _ => Err(CamtrapError::InvalidGrain(code.to_string())),
        }
    }
}

/// Noms de tags qui désignent une activité humaine et non de la faune
const HUMAN_ACTIVITIES: [&str; 7] = [
    "Agriculteur",
    "Chasseur",
    "Cueilleur",
    "Cycliste",
    "Pêcheur",
    "Randonneur",
    "Traileur",
];

/// Corrections de noms appliquées aux exports et aux fichiers de destination
const NAME_CORRECTIONS: [(&str, &str); 1] = [("Canidés", "CANIDE SP")];

/// Espèces protégées dont les coordonnées publiées sont dégradées par défaut.
/// Liste de départ seulement: la liste faisant foi est chargée depuis le
/// fichier de politique de l'observatoire.
const DEFAULT_SENSITIVITY: [(&str, Grain); 5] = [
    ("Loup gris", Grain::M10),
    ("Lynx boréal", Grain::M10),
    ("Gypaète barbu", Grain::M10),
    ("Aigle royal", Grain::M5),
    ("Tétras lyre", Grain::M2),
];

/// Règles de traitement des noms d'espèces
#[derive(Debug, Clone)]
pub struct SpeciesPolicy {
    exclusions: HashSet<String>,
    corrections: HashMap<String, String>,
    sensitivity: HashMap<String, Grain>,
}

impl Default for SpeciesPolicy {
    fn default() -> Self {
        Self {
            exclusions: HUMAN_ACTIVITIES.iter().map(|s| s.to_string()).collect(),
            corrections: NAME_CORRECTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            sensitivity: DEFAULT_SENSITIVITY
                .iter()
                .map(|(name, grain)| (name.to_string(), *grain))
                .collect(),
        }
    }
}

impl SpeciesPolicy {
    /// Politique sans aucune règle, pour remplacement complet par un fichier
    pub fn empty() -> Self {
        Self {
            exclusions: HashSet::new(),
            corrections: HashMap::new(),
            sensitivity: HashMap::new(),
        }
    }

    /// Le nom désigne-t-il une activité humaine?
    pub fn is_human(&self, species: &str) -> bool {
        self.exclusions.contains(species)
    }

    /// Nom corrigé pour l'export et les fichiers de destination.
    /// Identité quand aucune correction n'est enregistrée.
    pub fn correct<'a>(&'a self, species: &'a str) -> &'a str {
        self.corrections
            .get(species)
            .map(String::as_str)
            .unwrap_or(species)
    }

    /// Grain de dégradation d'une espèce sensible, `None` sinon
    pub fn grain_for(&self, species: &str) -> Option<Grain> {
        self.sensitivity.get(species).copied()
    }

    /// Ajoute ou remplace des espèces sensibles
    pub fn extend_sensitivity<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Grain)>,
    {
        self.sensitivity.extend(entries);
    }

    /// Ajoute ou remplace des corrections de noms
    pub fn extend_corrections<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.corrections.extend(entries);
    }

    /// Ajoute des noms d'activités humaines
    pub fn extend_exclusions<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.exclusions.extend(names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_activities_excluded() {
        let policy = SpeciesPolicy::default();
        assert!(policy.is_human("Randonneur"));
        assert!(policy.is_human("Pêcheur"));
        assert!(!policy.is_human("Chamois"));
    }

    #[test]
    fn test_correction_applied() {
        let policy = SpeciesPolicy::default();
        assert_eq!(policy.correct("Canidés"), "CANIDE SP");
        assert_eq!(policy.correct("Renard roux"), "Renard roux");
    }

    #[test]
    fn test_default_sensitivity() {
        let policy = SpeciesPolicy::default();
        assert_eq!(policy.grain_for("Loup gris"), Some(Grain::M10));
        assert_eq!(policy.grain_for("Chamois"), None);
    }

    #[test]
    fn test_grain_codes() {
        assert_eq!(Grain::from_code("M1").unwrap(), Grain::M1);
        assert_eq!(Grain::from_code("M10").unwrap(), Grain::M10);
        assert_eq!(Grain::from_code("M10").unwrap().cell_size(), 10000.0);
        assert!(Grain::from_code("M3").is_err());
    }

    #[test]
    fn test_extend_overrides() {
        let mut policy = SpeciesPolicy::default();
        policy.extend_sensitivity([("Loup gris".to_string(), Grain::M5)]);
        policy.extend_sensitivity([("Cerf élaphe".to_string(), Grain::M1)]);
        assert_eq!(policy.grain_for("Loup gris"), Some(Grain::M5));
        assert_eq!(policy.grain_for("Cerf élaphe"), Some(Grain::M1));
    }

    #[test]
    fn test_empty_policy() {
        let policy = SpeciesPolicy::empty();
        assert!(!policy.is_human("Randonneur"));
        assert_eq!(policy.correct("Canidés"), "Canidés");
        assert_eq!(policy.grain_for("Loup gris"), None);
    }
}
