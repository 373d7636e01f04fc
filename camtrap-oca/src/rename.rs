//! Renommage canonique des médias d'un répertoire caméra
//!
//! Le renommage se fait en deux passes. La première passe donne à chaque
//! média un nom temporaire unique, ce qui libère les noms canoniques et
//! évite tout écrasement quand les dates se recoupent. La seconde passe lit
//! la date de prise de vue et renomme au format `IMG_AAAAMMJJ_HHMMSS_NN`,
//! les fichiers pris à la même seconde étant numérotés dans l'ordre.
//! Le sidecar XMP suit son média à chaque passe et la date de modification
//! du fichier est préservée.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camtrap::naming;
use filetime::FileTime;
use tracing::{error, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::metadata::MetadataStore;

/// Bilan d'une passe de renommage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenameSummary {
    /// Médias passés par un nom temporaire
    pub staged: usize,
    /// Médias datés et renommés au format canonique
    pub stamped: usize,
    /// Médias laissés tels quels faute de date de prise de vue
    pub undated: usize,
}

/// Fichiers directs d'un répertoire, triés par nom
pub fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Renomme les médias de `dir` au format canonique.
///
/// Avec `force`, les médias déjà canoniques repassent aussi par la
/// première passe et sont redatés. Avec `dry_run`, les renommages sont
/// journalisés mais rien n'est écrit sur le disque.
pub fn rename_canonical(
    dir: &Path,
    store: &dyn MetadataStore,
    force: bool,
    dry_run: bool,
) -> Result<RenameSummary> {
    let mut summary = RenameSummary::default();
    stage_temporary(dir, store, force, dry_run, &mut summary)?;
    stamp_by_date(dir, store, dry_run, &mut summary)?;
    Ok(summary)
}

/// Première passe: nom temporaire UUID, extension mise en minuscules
fn stage_temporary(
    dir: &Path,
    store: &dyn MetadataStore,
    force: bool,
    dry_run: bool,
    summary: &mut RenameSummary,
) -> Result<()> {
    for file in files_in(dir)? {
        let name = file_name(&file);
        if !naming::is_media(&file) || (!force && naming::is_canonical(name)) {
            continue;
        }
        let extension = lowercase_extension(&file);
        let staged = dir.join(format!("{}.{}", Uuid::new_v4().simple(), extension));
        info!(
            from = %name,
            to = %file_name(&staged),
            "Staging media under a temporary name"
        );
        summary.staged += 1;
        if dry_run {
            continue;
        }
        let mtime = modification_time(&file)?;
        fs::rename(&file, &staged)
            .with_context(|| format!("Failed to rename {}", file.display()))?;
        filetime::set_file_times(&staged, mtime, mtime)
            .with_context(|| format!("Failed to restore times on {}", staged.display()))?;
        move_sidecar(store, &file, &staged, mtime)?;
    }
    Ok(())
}

/// Seconde passe: nom canonique d'après la date de prise de vue
fn stamp_by_date(
    dir: &Path,
    store: &dyn MetadataStore,
    dry_run: bool,
    summary: &mut RenameSummary,
) -> Result<()> {
    let mut dated: Vec<(String, PathBuf)> = Vec::new();
    for file in files_in(dir)? {
        if !naming::is_media(&file) || naming::is_canonical(file_name(&file)) {
            continue;
        }
        match store.read(&file) {
            Ok(capture) => match capture.timestamp {
                Some(stamp) => dated.push((stamp, file)),
                None => {
                    error!(
                        path = %file.display(),
                        "No capture date, file kept under its current name"
                    );
                    summary.undated += 1;
                }
            },
            Err(err) => {
                error!(
                    path = %file.display(),
                    error = %err,
                    "Metadata read failed, file kept under its current name"
                );
                summary.undated += 1;
            }
        }
    }
    // Tri par date puis par nom: les numéros de séquence sont reproductibles.
    dated.sort();

    let mut last_stamp = String::new();
    let mut sequence: u32 = 0;
    for (stamp, file) in dated {
        if stamp == last_stamp {
            sequence += 1;
        } else {
            last_stamp.clone_from(&stamp);
            sequence = 0;
        }
        let compact = naming::compact_timestamp(&stamp);
        let canonical = naming::canonical_name(&compact, sequence, &lowercase_extension(&file));
        let dest = dir.join(&canonical);
        info!(
            from = %file_name(&file),
            date = %stamp,
            to = %canonical,
            "Renaming media to its canonical name"
        );
        summary.stamped += 1;
        if dry_run {
            continue;
        }
        let mtime = modification_time(&file)?;
        fs::rename(&file, &dest)
            .with_context(|| format!("Failed to rename {}", file.display()))?;
        filetime::set_file_times(&dest, mtime, mtime)
            .with_context(|| format!("Failed to restore times on {}", dest.display()))?;
        move_sidecar(store, &file, &dest, mtime)?;
    }
    Ok(())
}

/// Recopie le sidecar XMP de l'ancien média vers le nouveau puis supprime
/// l'ancien. Les tags passent par le magasin de métadonnées pour garder un
/// XMP bien formé.
fn move_sidecar(
    store: &dyn MetadataStore,
    old_media: &Path,
    new_media: &Path,
    mtime: FileTime,
) -> Result<()> {
    let old_sidecar = naming::sidecar_path(old_media);
    if !old_sidecar.exists() {
        return Ok(());
    }
    let new_sidecar = naming::sidecar_path(new_media);
    store.copy_tags(&old_sidecar, &new_sidecar)?;
    fs::remove_file(&old_sidecar)
        .with_context(|| format!("Failed to remove {}", old_sidecar.display()))?;
    filetime::set_file_times(&new_sidecar, mtime, mtime)
        .with_context(|| format!("Failed to restore times on {}", new_sidecar.display()))?;
    let _ = fs::remove_file(naming::backup_artifact(&new_sidecar));
    Ok(())
}

/// Date de modification d'un fichier, à réappliquer après renommage ou copie
pub fn modification_time(path: &Path) -> Result<FileTime> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata of {}", path.display()))?;
    Ok(FileTime::from_last_modification_time(&metadata))
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CaptureMetadata;
    use std::fs;

    /// Magasin factice: l'horodatage est la première ligne du fichier, ce
    /// qui survit aux renommages des deux passes
    struct FakeStore;

    impl MetadataStore for FakeStore {
        fn read(&self, path: &Path) -> Result<CaptureMetadata> {
            let content = fs::read_to_string(path)?;
            let stamp = content.lines().next().unwrap_or_default().trim();
            Ok(CaptureMetadata {
                timestamp: (!stamp.is_empty()).then(|| stamp.to_string()),
                tags: Vec::new(),
                gps: None,
            })
        }

        fn copy_tags(&self, source: &Path, dest: &Path) -> Result<()> {
            fs::copy(source, dest)?;
            Ok(())
        }

        fn write_tags(&self, _path: &Path, _tags: &[(String, String)]) -> Result<()> {
            Ok(())
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        files_in(dir)
            .unwrap()
            .iter()
            .map(|path| file_name(path).to_string())
            .collect()
    }

    #[test]
    fn test_rename_stamps_by_capture_date() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DSCF0001.JPG"), "2024:06:02 14:15:30\nA").unwrap();
        fs::write(dir.path().join("DSCF0002.JPG"), "2024:06:02 14:15:30\nB").unwrap();
        fs::write(dir.path().join("DSCF0003.JPG"), "2024:06:02 18:00:00\nC").unwrap();

        let summary = rename_canonical(dir.path(), &FakeStore, false, false).unwrap();
        assert_eq!(summary.staged, 3);
        assert_eq!(summary.stamped, 3);
        assert_eq!(summary.undated, 0);
        assert_eq!(
            listing(dir.path()),
            vec![
                "IMG_20240602_141530_00.jpg",
                "IMG_20240602_141530_01.jpg",
                "IMG_20240602_180000_00.jpg",
            ]
        );
    }

    #[test]
    fn test_rename_moves_sidecar_with_media() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DSCF0001.JPG"), "2024:06:02 14:15:30\nA").unwrap();
        fs::write(dir.path().join("DSCF0001.JPG.xmp"), "tags de A").unwrap();

        rename_canonical(dir.path(), &FakeStore, false, false).unwrap();
        assert_eq!(
            listing(dir.path()),
            vec![
                "IMG_20240602_141530_00.jpg",
                "IMG_20240602_141530_00.jpg.xmp",
            ]
        );
        let sidecar = dir.path().join("IMG_20240602_141530_00.jpg.xmp");
        assert_eq!(fs::read_to_string(sidecar).unwrap(), "tags de A");
    }

    #[test]
    fn test_rename_skips_canonical_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("IMG_20240602_141530_00.jpg"),
            "2024:06:02 14:15:30",
        )
        .unwrap();
        fs::write(dir.path().join("information.yaml"), "export_oca: true").unwrap();

        let summary = rename_canonical(dir.path(), &FakeStore, false, false).unwrap();
        assert_eq!(summary, RenameSummary::default());
        assert_eq!(
            listing(dir.path()),
            vec!["IMG_20240602_141530_00.jpg", "information.yaml"]
        );
    }

    #[test]
    fn test_rename_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DSCF0001.JPG"), "2024:06:02 14:15:30").unwrap();

        let summary = rename_canonical(dir.path(), &FakeStore, false, true).unwrap();
        assert_eq!(summary.staged, 1);
        assert_eq!(summary.stamped, 1);
        assert_eq!(listing(dir.path()), vec!["DSCF0001.JPG"]);
    }

    #[test]
    fn test_rename_keeps_undated_file_under_temporary_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DSCF0001.JPG"), "").unwrap();

        let summary = rename_canonical(dir.path(), &FakeStore, false, false).unwrap();
        assert_eq!(summary.staged, 1);
        assert_eq!(summary.stamped, 0);
        assert_eq!(summary.undated, 1);
        let names = listing(dir.path());
        assert_eq!(names.len(), 1);
        // 32 caractères d'UUID plus l'extension en minuscules
        assert_eq!(names[0].len(), 36);
        assert!(names[0].ends_with(".jpg"));
    }

    #[test]
    fn test_force_restamps_canonical_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("IMG_19700101_000000_00.jpg"),
            "2024:06:02 14:15:30",
        )
        .unwrap();

        let summary = rename_canonical(dir.path(), &FakeStore, true, false).unwrap();
        assert_eq!(summary.staged, 1);
        assert_eq!(summary.stamped, 1);
        assert_eq!(listing(dir.path()), vec!["IMG_20240602_141530_00.jpg"]);
    }

    #[test]
    fn test_files_in_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), "").unwrap();
        fs::write(dir.path().join("a.jpg"), "").unwrap();
        fs::create_dir(dir.path().join("sous_dossier")).unwrap();
        fs::write(dir.path().join("sous_dossier").join("c.jpg"), "").unwrap();

        let files = files_in(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|path| file_name(path)).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }
}
