//! Conventions de nommage des fichiers médias
//!
//! Deux formats cohabitent:
//!
//! - nom canonique dans les répertoires sources:
//!   `IMG_AAAAMMJJ_HHMMSS_NN.ext`, attribué d'après la date de prise de vue
//! - nom de destination dans l'arborescence d'export:
//!   `IMG_NNNN_Espèce_Quantité[_Détail].ext`, translittéré en ASCII
//!
//! S'y ajoutent la conversion des dates de relevé du manifeste
//! (`JJ/MM/AAAA` vers `AAAAMMJJ`), les jeux d'extensions reconnus et les
//! chemins annexes (sidecar XMP, artefacts de sauvegarde exiftool).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use deunicode::deunicode;
use regex::Regex;

use crate::error::{CamtrapError, Result};

fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compiled(r"^IMG_\d{8}_\d{6}_\d{2}\."))
}

fn destination_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compiled(r"^IMG_\d{4}_([\sa-zA-Z']*)_(\d*)"))
}

fn department_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compiled(r"FR\d\d_"))
}

// Motifs fixes: la compilation ne peut pas échouer.
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Le fichier est-il un média reconnu (photo JPEG ou vidéo MP4)?
/// Seules les casses produites par les pièges photos sont admises.
pub fn is_media(path: &Path) -> bool {
    matches!(extension(path), Some("jpg" | "JPG" | "mp4" | "MP4"))
}

/// Le fichier est-il une photo?
pub fn is_photo(path: &Path) -> bool {
    matches!(extension(path), Some("jpg" | "JPG"))
}

/// Le fichier est-il une vidéo convertie?
pub fn is_video(path: &Path) -> bool {
    matches!(extension(path), Some("mp4" | "MP4"))
}

/// Le fichier est-il une vidéo brute de piège (AVI, à convertir)?
pub fn is_unconverted(path: &Path) -> bool {
    matches!(extension(path), Some("avi" | "AVI"))
}

/// Le nom suit-il le format canonique `IMG_AAAAMMJJ_HHMMSS_NN.ext`?
pub fn is_canonical(name: &str) -> bool {
    canonical_pattern().is_match(name)
}

/// Champ date (8 chiffres) d'un nom canonique
pub fn canonical_date(name: &str) -> Option<&str> {
    if is_canonical(name) {
        name.get(4..12)
    } else {
        None
    }
}

/// Horodatage exif `AAAA:MM:JJ HH:MM:SS` vers la forme compacte
/// `AAAAMMJJ_HHMMSS` des noms canoniques
pub fn compact_timestamp(exif_date: &str) -> String {
    exif_date.replace(':', "").replace(' ', "_")
}

/// Nom canonique pour un horodatage compact et un numéro d'ordre.
/// Le numéro tient sur deux chiffres jusqu'à 99.
pub fn canonical_name(compact_stamp: &str, seq: u32, ext: &str) -> String {
    format!("IMG_{compact_stamp}_{seq:02}.{ext}")
}

/// Nom de destination `IMG_NNNN_Espèce_Quantité[_Détail].ext`.
/// L'espèce et le détail sont translittérés en ASCII, les espaces conservés.
pub fn oca_name(seq: u32, species: &str, count: u32, detail: &str, ext: &str) -> String {
    let mut name = format!("IMG_{seq:04}_{}_{count}", deunicode(species));
    if !detail.is_empty() {
        name.push('_');
        name.push_str(&deunicode(detail));
    }
    name.push('.');
    name.push_str(ext);
    name
}

/// Espèce et effectif lus depuis un nom de destination.
/// Un effectif absent vaut 1.
pub fn parse_oca_name(name: &str) -> Option<(String, u32)> {
    let caps = destination_pattern().captures(name)?;
    let species = caps[1].to_string();
    let count = if caps[2].is_empty() {
        1
    } else {
        caps[2].parse().unwrap_or(1)
    };
    Some((species, count))
}

/// Date de relevé du manifeste `JJ/MM/AAAA` vers la forme `AAAAMMJJ`
/// des répertoires de destination
pub fn survey_stamp(date: &str) -> Result<String> {
    let parts: Vec<&str> = date.split('/').collect();
    if parts.len() != 3 {
        return Err(CamtrapError::invalid_date(date, "expected JJ/MM/AAAA"));
    }

    let day: u32 = parts[0]
        .parse()
        .map_err(|_| CamtrapError::invalid_date(date, "invalid day"))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| CamtrapError::invalid_date(date, "invalid month"))?;
    let year: u32 = parts[2]
        .parse()
        .map_err(|_| CamtrapError::invalid_date(date, "invalid year"))?;

    if !(1..=31).contains(&day) {
        return Err(CamtrapError::invalid_date(date, "day out of range"));
    }
    if !(1..=12).contains(&month) {
        return Err(CamtrapError::invalid_date(date, "month out of range"));
    }
    if !(1900..=2100).contains(&year) {
        return Err(CamtrapError::invalid_date(date, "year out of range"));
    }

    Ok(format!("{year:04}{month:02}{day:02}"))
}

/// Retire les préfixes de département `FRnn_` d'un segment de chemin
pub fn strip_department_prefix(segment: &str) -> String {
    department_pattern().replace_all(segment, "").into_owned()
}

/// Chemin du sidecar XMP d'un média (`photo.jpg` -> `photo.jpg.xmp`)
pub fn sidecar_path(media: &Path) -> PathBuf {
    let mut name = media.as_os_str().to_os_string();
    name.push(".xmp");
    PathBuf::from(name)
}

/// Chemin de l'artefact de sauvegarde laissé par exiftool
/// (`photo.jpg.xmp` -> `photo.jpg.xmp_original`)
pub fn backup_artifact(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("_original");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_extensions_exact_case() {
        assert!(is_media(Path::new("a.jpg")));
        assert!(is_media(Path::new("a.JPG")));
        assert!(is_media(Path::new("a.mp4")));
        assert!(is_media(Path::new("a.MP4")));
        assert!(!is_media(Path::new("a.Jpg")));
        assert!(!is_media(Path::new("a.avi")));
        assert!(!is_media(Path::new("a.xmp")));
        assert!(!is_media(Path::new("information.yaml")));
    }

    #[test]
    fn test_unconverted_videos() {
        assert!(is_unconverted(Path::new("a.avi")));
        assert!(is_unconverted(Path::new("a.AVI")));
        assert!(!is_unconverted(Path::new("a.mp4")));
    }

    #[test]
    fn test_canonical_name_round_trip() {
        let stamp = compact_timestamp("2024:06:02 14:15:30");
        assert_eq!(stamp, "20240602_141530");

        let name = canonical_name(&stamp, 7, "jpg");
        assert_eq!(name, "IMG_20240602_141530_07.jpg");
        assert!(is_canonical(&name));
        assert_eq!(canonical_date(&name), Some("20240602"));
    }

    #[test]
    fn test_non_canonical_names() {
        assert!(!is_canonical("DSCF0001.JPG"));
        assert!(!is_canonical("IMG_2024_141530_07.jpg"));
        assert!(is_canonical("IMG_20240602_141530_07.jpg.xmp"));
        assert_eq!(canonical_date("DSCF0001.JPG"), None);
    }

    #[test]
    fn test_oca_name_with_detail() {
        let name = oca_name(3, "Chevreuil européen", 2, "mâle", "jpg");
        assert_eq!(name, "IMG_0003_Chevreuil europeen_2_male.jpg");
    }

    #[test]
    fn test_oca_name_without_detail() {
        let name = oca_name(12, "CANIDE SP", 1, "", "MP4");
        assert_eq!(name, "IMG_0012_CANIDE SP_1.MP4");
    }

    #[test]
    fn test_parse_oca_name() {
        assert_eq!(
            parse_oca_name("IMG_0003_Chevreuil europeen_2_male.jpg"),
            Some(("Chevreuil europeen".to_string(), 2))
        );
        assert_eq!(
            parse_oca_name("IMG_0012_CANIDE SP_1.MP4"),
            Some(("CANIDE SP".to_string(), 1))
        );
        assert_eq!(parse_oca_name("IMG_20240602_141530_07.jpg"), None);
        assert_eq!(parse_oca_name("DSCF0001.JPG"), None);
    }

    #[test]
    fn test_parse_oca_name_missing_count_defaults_to_one() {
        assert_eq!(
            parse_oca_name("IMG_0004_Renard_.jpg"),
            Some(("Renard".to_string(), 1))
        );
    }

    #[test]
    fn test_survey_stamp() {
        assert_eq!(survey_stamp("12/05/2024").unwrap(), "20240512");
        assert_eq!(survey_stamp("2/6/2024").unwrap(), "20240602");
        assert!(survey_stamp("2024-05-12").is_err());
        assert!(survey_stamp("32/05/2024").is_err());
        assert!(survey_stamp("12/13/2024").is_err());
        assert!(survey_stamp("12/05/24").is_err());
    }

    #[test]
    fn test_strip_department_prefix() {
        assert_eq!(strip_department_prefix("FR38_Vercors"), "Vercors");
        assert_eq!(strip_department_prefix("Vercors"), "Vercors");
        assert_eq!(strip_department_prefix("FR26_FR38_Double"), "Double");
    }

    #[test]
    fn test_sidecar_and_artifact_paths() {
        assert_eq!(
            sidecar_path(Path::new("/d/IMG_20240602_141530_07.jpg")),
            PathBuf::from("/d/IMG_20240602_141530_07.jpg.xmp")
        );
        assert_eq!(
            backup_artifact(Path::new("/d/a.jpg.xmp")),
            PathBuf::from("/d/a.jpg.xmp_original")
        );
    }
}
