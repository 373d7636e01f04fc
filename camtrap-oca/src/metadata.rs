//! Lecture et propagation des métadonnées des médias via exiftool
//!
//! exiftool est appelé en mode dump JSON (`-j -G -n`): les clés sont
//! préfixées par leur groupe (`XMP:GPSLatitude`) et les valeurs numériques
//! sont brutes. Le trait [`MetadataStore`] isole le sous-processus pour que
//! les tests substituent un magasin factice.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::debug;

/// Tags demandés lors de la lecture d'un média
const READ_TAGS: [&str; 8] = [
    "-XMP:HierarchicalSubject",
    "-EXIF:DateTimeOriginal",
    "-XMP:DateTimeOriginal",
    "-XMP:CreateDate",
    "-QuickTime:MediaCreateDate",
    "-XMP:GPSLatitude",
    "-XMP:GPSLongitude",
    "-XMP:GPSAltitude",
];

/// Ordre de priorité des horodatages de prise de vue
const TIMESTAMP_KEYS: [&str; 4] = [
    "EXIF:DateTimeOriginal",
    "XMP:DateTimeOriginal",
    "XMP:CreateDate",
    "QuickTime:MediaCreateDate",
];

/// Position GPS d'un média
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Métadonnées de prise de vue d'un média
#[derive(Debug, Clone, Default)]
pub struct CaptureMetadata {
    /// Horodatage `AAAA:MM:JJ HH:MM:SS`, si présent
    pub timestamp: Option<String>,

    /// Tags hiérarchiques digiKam
    pub tags: Vec<String>,

    /// Position GPS, présente seulement quand les trois champs XMP le sont
    pub gps: Option<GpsPosition>,
}

/// Accès aux métadonnées des médias
pub trait MetadataStore {
    /// Lit les métadonnées de prise de vue d'un média ou de son sidecar
    fn read(&self, path: &Path) -> Result<CaptureMetadata>;

    /// Recopie les blocs IPTC et XMP d'un fichier vers un autre.
    /// Laisse un artefact `_original` que l'appelant supprime.
    fn copy_tags(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Écrit des tags explicites (`clé`, `valeur`) dans un fichier
    fn write_tags(&self, path: &Path, tags: &[(String, String)]) -> Result<()>;
}

/// Implémentation exiftool
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Résout l'exécutable: variable `CAMTRAP_EXIFTOOL`, sinon `exiftool`
    /// trouvé dans le PATH
    pub fn from_env() -> Self {
        let program = std::env::var("CAMTRAP_EXIFTOOL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("exiftool"));
        Self { program }
    }

    /// Dump JSON des tags demandés; exiftool renvoie un tableau,
    /// le premier objet est retenu
    fn dump(&self, path: &Path) -> Result<Value> {
        let output = Command::new(&self.program)
            .args(["-j", "-G", "-n"])
            .args(READ_TAGS)
            .arg(path)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let array: Value = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Failed to parse exiftool JSON for {}", path.display()))?;

        Ok(array
            .as_array()
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }
}

impl MetadataStore for ExifTool {
    fn read(&self, path: &Path) -> Result<CaptureMetadata> {
        let dump = self.dump(path)?;
        Ok(capture_from_dump(&dump))
    }

    fn copy_tags(&self, source: &Path, dest: &Path) -> Result<()> {
        debug!(source = %source.display(), dest = %dest.display(), "Copie des tags");
        let output = Command::new(&self.program)
            .arg("-Tagsfromfile")
            .arg(source)
            .args(["-IPTC:All", "-XMP:All"])
            .arg(dest)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool tag copy {} -> {} failed: {}",
                source.display(),
                dest.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn write_tags(&self, path: &Path, tags: &[(String, String)]) -> Result<()> {
        debug!(path = %path.display(), count = tags.len(), "Écriture de tags");
        let mut command = Command::new(&self.program);
        for (key, value) in tags {
            command.arg(format!("-{key}={value}"));
        }
        let output = command
            .arg(path)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "exiftool tag write on {} failed: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Construit les métadonnées de prise de vue depuis un dump exiftool
pub fn capture_from_dump(dump: &Value) -> CaptureMetadata {
    CaptureMetadata {
        timestamp: timestamp_from_dump(dump),
        tags: tags_from_dump(dump),
        gps: gps_from_dump(dump),
    }
}

/// Premier horodatage présent dans l'ordre de priorité
fn timestamp_from_dump(dump: &Value) -> Option<String> {
    for key in TIMESTAMP_KEYS {
        if let Some(value) = dump.get(key) {
            if let Some(text) = value_to_string(value) {
                return Some(text);
            }
        }
    }
    None
}

/// Tags hiérarchiques normalisés en liste: une chaîne seule devient une
/// liste à un élément, un champ absent une liste vide
fn tags_from_dump(dump: &Value) -> Vec<String> {
    match dump.get("XMP:HierarchicalSubject") {
        Some(Value::String(tag)) => vec![tag.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Position GPS, présente seulement quand latitude, longitude et altitude
/// sont toutes trois lisibles
fn gps_from_dump(dump: &Value) -> Option<GpsPosition> {
    let latitude = dump.get("XMP:GPSLatitude")?.as_f64()?;
    let longitude = dump.get("XMP:GPSLongitude")?.as_f64()?;
    let altitude = dump.get("XMP:GPSAltitude")?.as_f64()?;
    Some(GpsPosition {
        latitude,
        longitude,
        altitude,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_priority_exif_first() {
        let dump = json!({
            "EXIF:DateTimeOriginal": "2024:06:02 14:15:30",
            "XMP:CreateDate": "2024:06:02 14:15:31",
            "QuickTime:MediaCreateDate": "2024:06:02 14:15:32",
        });
        assert_eq!(
            timestamp_from_dump(&dump).as_deref(),
            Some("2024:06:02 14:15:30")
        );
    }

    #[test]
    fn test_timestamp_falls_back_to_quicktime() {
        let dump = json!({ "QuickTime:MediaCreateDate": "2024:06:02 14:15:32" });
        assert_eq!(
            timestamp_from_dump(&dump).as_deref(),
            Some("2024:06:02 14:15:32")
        );
    }

    #[test]
    fn test_timestamp_absent() {
        let dump = json!({ "XMP:GPSLatitude": 45.0 });
        assert_eq!(timestamp_from_dump(&dump), None);
    }

    #[test]
    fn test_tags_single_string_becomes_list() {
        let dump = json!({ "XMP:HierarchicalSubject": "Nature|Chamois {R r}" });
        assert_eq!(tags_from_dump(&dump), vec!["Nature|Chamois {R r}"]);
    }

    #[test]
    fn test_tags_array() {
        let dump = json!({
            "XMP:HierarchicalSubject": ["Nature|A {a}", "Quantité|A_2"]
        });
        assert_eq!(tags_from_dump(&dump), vec!["Nature|A {a}", "Quantité|A_2"]);
    }

    #[test]
    fn test_tags_missing_is_empty() {
        let dump = json!({});
        assert!(tags_from_dump(&dump).is_empty());
    }

    #[test]
    fn test_gps_requires_all_three_fields() {
        let complete = json!({
            "XMP:GPSLatitude": 44.95,
            "XMP:GPSLongitude": 5.58,
            "XMP:GPSAltitude": 1250.0,
        });
        let gps = gps_from_dump(&complete);
        assert_eq!(
            gps,
            Some(GpsPosition {
                latitude: 44.95,
                longitude: 5.58,
                altitude: 1250.0,
            })
        );

        let partial = json!({
            "XMP:GPSLatitude": 44.95,
            "XMP:GPSLongitude": 5.58,
        });
        assert_eq!(gps_from_dump(&partial), None);
    }

    #[test]
    fn test_capture_from_full_dump() {
        let dump = json!({
            "EXIF:DateTimeOriginal": "2024:06:02 14:15:30",
            "XMP:HierarchicalSubject": ["Nature|Chamois {R r}"],
            "XMP:GPSLatitude": 44.95,
            "XMP:GPSLongitude": 5.58,
            "XMP:GPSAltitude": 1250.0,
        });
        let capture = capture_from_dump(&dump);
        assert_eq!(capture.timestamp.as_deref(), Some("2024:06:02 14:15:30"));
        assert_eq!(capture.tags.len(), 1);
        assert!(capture.gps.is_some());
    }
}
