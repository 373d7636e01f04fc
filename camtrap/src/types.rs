//! Types de données pour le crate camtrap

/// Valeur de remplacement pour une espèce, une quantité ou une commune absentes
pub const UNKNOWN: &str = "Inconnu";

/// Effectif déclaré pour une espèce (tag `Quantité`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesCount {
    /// Nom d'espèce tel qu'écrit dans le tag
    pub species: String,

    /// Nombre d'individus
    pub count: u32,
}

/// Précision déclarée pour une espèce (tag `Détails`: sexe, âge, comportement)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesDetail {
    /// Nom d'espèce tel qu'écrit dans le tag
    pub species: String,

    /// Texte du détail
    pub text: String,
}

/// Résultat de la classification des tags hiérarchiques d'un média
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Espèces identifiées, dans l'ordre des tags
    pub species: Vec<String>,

    /// Effectifs par espèce, dans l'ordre des tags
    pub quantities: Vec<SpeciesCount>,

    /// Détails par espèce, dans l'ordre des tags
    pub details: Vec<SpeciesDetail>,

    /// Communes identifiées, dans l'ordre des tags
    pub locations: Vec<String>,
}

impl Classification {
    /// Effectif retenu pour une espèce.
    ///
    /// Repli de gauche à droite sur les entrées extraites: une entrée
    /// correspondante remplace l'accumulateur, toute autre entrée le ramène à
    /// au moins 1. Sans aucune entrée le résultat est 1. Une entrée `_0` en
    /// dernière position peut donc rendre 0; ce comportement historique est
    /// conservé tel quel, les exports existants en dépendent.
    pub fn quantity_for(&self, species: &str) -> u32 {
        let mut count = 1;
        for entry in &self.quantities {
            if entry.species == species {
                count = entry.count;
            } else {
                count = count.max(1);
            }
        }
        count
    }

    /// Détail retenu pour une espèce: dernière entrée correspondante, sinon
    /// chaîne vide.
    pub fn detail_for(&self, species: &str) -> &str {
        let mut detail = "";
        for entry in &self.details {
            if entry.species == species {
                detail = &entry.text;
            }
        }
        detail
    }

    /// Commune retenue: première extraite, sinon [`UNKNOWN`]
    pub fn commune(&self) -> &str {
        self.locations
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }
}
