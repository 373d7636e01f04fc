//! Configuration: manifeste de répertoire et fichier de politique d'espèces

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use camtrap::{Grain, SpeciesPolicy};

/// Nom du manifeste attendu dans chaque répertoire source
pub const MANIFEST_NAME: &str = "information.yaml";

/// Manifeste `information.yaml` d'un répertoire de caméra
///
/// Les clés inconnues sont ignorées; chaque commande valide elle-même les
/// champs dont elle a besoin.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Le répertoire participe-t-il à l'export OCA?
    /// `None` quand la clé est absente (fatal pour la copie)
    pub export_oca: Option<bool>,

    /// Identité et position de la caméra
    #[serde(rename = "caméra")]
    pub camera: Option<Camera>,

    /// Dates de relevé `JJ/MM/AAAA`, en ordre chronologique
    #[serde(rename = "relevé", default)]
    pub surveys: Vec<String>,
}

/// Bloc caméra du manifeste
#[derive(Debug, Clone, Deserialize)]
pub struct Camera {
    /// Nom de la caméra, préfixe du répertoire de destination
    #[serde(rename = "nom")]
    pub name: String,

    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Manifest {
    /// Charge le manifeste d'un répertoire source
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    /// Le manifeste existe-t-il dans ce répertoire?
    pub fn exists_in(dir: &Path) -> bool {
        dir.join(MANIFEST_NAME).is_file()
    }
}

/// Fichier de politique d'espèces (YAML)
///
/// ```yaml
/// especes_sensibles:
///   Loup gris: M10
///   Cerf élaphe: M1
/// corrections:
///   Canidés: CANIDE SP
/// exclusions:
///   - Berger
/// remplace: false
/// ```
#[derive(Debug, Deserialize)]
pub struct PolicyFile {
    /// Remplacer entièrement les règles intégrées au lieu de les étendre
    #[serde(default)]
    pub remplace: bool,

    /// Espèces sensibles: nom vers code de grain (M1, M2, M5, M10)
    #[serde(default)]
    pub especes_sensibles: HashMap<String, String>,

    /// Corrections de noms: nom vers nom corrigé
    #[serde(default)]
    pub corrections: HashMap<String, String>,

    /// Noms d'activités humaines supplémentaires
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Construit la politique d'espèces: règles intégrées seules, étendues ou
/// remplacées par le fichier fourni. Un code de grain inconnu est fatal.
pub fn load_policy(path: Option<&Path>) -> Result<SpeciesPolicy> {
    let Some(path) = path else {
        return Ok(SpeciesPolicy::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file: {}", path.display()))?;
    let file: PolicyFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse policy file: {}", path.display()))?;

    let mut policy = if file.remplace {
        SpeciesPolicy::empty()
    } else {
        SpeciesPolicy::default()
    };

    let mut sensitivity = Vec::with_capacity(file.especes_sensibles.len());
    for (species, code) in &file.especes_sensibles {
        let grain = Grain::from_code(code)
            .with_context(|| format!("Species '{}' in {}", species, path.display()))?;
        sensitivity.push((species.clone(), grain));
    }

    policy.extend_sensitivity(sensitivity);
    policy.extend_corrections(file.corrections);
    policy.extend_exclusions(file.exclusions);

    Ok(policy)
}
