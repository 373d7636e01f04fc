//! Construction des observations naturalistes à partir des métadonnées.
//!
//! Une photo ou vidéo annotée produit autant d'observations que d'espèces
//! relevées dans ses tags hiérarchiques. Chaque observation porte la commune,
//! la date de capture, la quantité et le détail associés à l'espèce, ainsi que
//! la position Lambert 93 dégradée selon la sensibilité de l'espèce.

use std::path::Path;

use camtrap::{Classification, SpeciesPolicy, TagClassifier};
use geo::Point;
use tracing::{error, info};

use crate::metadata::CaptureMetadata;
use crate::projection::{degrade_point, Geographic, Lambert93};

/// Une ligne naturaliste: une espèce vue sur un média, à une date et un lieu.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Commune du relevé ("Inconnu" si aucun tag de lieu).
    pub commune: String,
    /// Date de capture au format exiftool ("AAAA:MM:JJ HH:MM:SS"), vide si absente.
    pub date: String,
    /// Nom vernaculaire, après application des corrections de nomenclature.
    pub species: String,
    /// Nombre d'individus.
    pub count: u32,
    /// Détail libre (sexe, âge, comportement), vide si non renseigné.
    pub detail: String,
    /// Position Lambert 93, dégradée pour les espèces sensibles.
    pub position: Option<Point<f64>>,
    /// Altitude en mètres.
    pub altitude: Option<f64>,
}

/// Fabrique d'observations: classification des tags + projection des positions.
pub struct ObservationBuilder<'a> {
    classifier: &'a TagClassifier,
    policy: &'a SpeciesPolicy,
    projection: Lambert93,
}

impl<'a> ObservationBuilder<'a> {
    pub fn new(classifier: &'a TagClassifier, policy: &'a SpeciesPolicy) -> Self {
        Self {
            classifier,
            policy,
            projection: Lambert93::new(),
        }
    }

    /// Construit les observations d'un média.
    ///
    /// Les passages humains (randonneurs, chasseurs...) sont exclus. Un média
    /// sans aucun tag d'espèce ne produit rien; un tag `Nature` inexploitable
    /// produit une observation "Inconnu" qui garde la trace du déclenchement.
    pub fn build(&self, path: &Path, capture: &CaptureMetadata) -> Vec<Observation> {
        let classification = self.classifier.classify(&capture.tags);
        if classification.species.is_empty() {
            error!(path = %path.display(), "No species tagged on media");
            return Vec::new();
        }
        let date = match &capture.timestamp {
            Some(stamp) => stamp.clone(),
            None => {
                error!(path = %path.display(), "No capture date in metadata");
                String::new()
            }
        };

        let base_position = capture
            .gps
            .as_ref()
            .map(|gps| {
                self.projection
                    .project(Geographic::from_degrees(gps.longitude, gps.latitude))
            });
        let altitude = capture.gps.as_ref().map(|gps| gps.altitude);

        let mut observations = Vec::new();
        for species in &classification.species {
            if self.policy.is_human(species) {
                info!(species = %species, "Human passage not exported");
                continue;
            }
            observations.push(self.observation_for(
                species,
                &classification,
                &date,
                base_position,
                altitude,
            ));
        }
        observations
    }

    fn observation_for(
        &self,
        species: &str,
        classification: &Classification,
        date: &str,
        base_position: Option<Point<f64>>,
        altitude: Option<f64>,
    ) -> Observation {
        // La sensibilité est indexée sur le nom brut des tags, la correction
        // de nomenclature ne s'applique qu'au nom exporté.
        let position = match self.policy.grain_for(species) {
            Some(grain) => base_position.map(|p| degrade_point(p, grain)),
            None => base_position,
        };

        Observation {
            commune: classification.commune().to_string(),
            date: date.to_string(),
            species: self.policy.correct(species).to_string(),
            count: classification.quantity_for(species),
            detail: classification.detail_for(species).to_string(),
            position,
            altitude,
        }
    }
}
