//! Routage des médias vers l'arborescence de destination OCA
//!
//! Une passe de copie lit le manifeste du répertoire caméra, construit
//! l'arborescence de destination (un répertoire racine par caméra, un
//! sous-répertoire par relevé) puis copie chaque média éligible sous son
//! nom OCA `IMG_nnnn_Espèce_Quantité[_Détail]`, avec un fichier de
//! destination par espèce taguée. Les médias où une activité humaine est
//! taguée passent d'abord par l'anonymiseur. Les tags et la date de
//! modification sont propagés depuis le fichier original.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use camtrap::{naming, SpeciesPolicy, TagClassifier};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::anonymize::Anonymizer;
use crate::config::{Manifest, MANIFEST_NAME};
use crate::metadata::MetadataStore;
use crate::rename::modification_time;

/// Bilan d'une passe de copie
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Médias rencontrés dans le répertoire source
    pub examined: usize,
    /// Médias retenus par le filtre incrémental
    pub eligible: usize,
    /// Fichiers écrits dans l'arborescence de destination
    pub copied: usize,
    /// Médias passés par l'anonymiseur
    pub anonymized: usize,
    /// Noms de destination retombés sur un nom déjà pris
    pub collisions: usize,
    /// Médias abandonnés sur erreur
    pub failures: usize,
}

/// Arborescence de destination d'une caméra
struct DestinationTree {
    root: PathBuf,
    /// Dates de relevé AAAAMMJJ, triées croissant
    surveys: Vec<String>,
    /// Date du dernier relevé déjà copié, jalon du mode incrémental
    watermark: String,
}

impl DestinationTree {
    /// Relevé de rattachement d'un média: le premier relevé dont la date
    /// est au moins celle du média, sinon le dernier relevé. Sans relevé,
    /// le média reste à la racine.
    fn bucket_for(&self, date: &str) -> Option<&str> {
        self.surveys
            .iter()
            .find(|stamp| date <= stamp.as_str())
            .or_else(|| self.surveys.last())
            .map(String::as_str)
    }
}

/// Copie des médias d'un répertoire caméra vers l'arborescence OCA
pub struct MediaRouter<'a> {
    classifier: &'a TagClassifier,
    policy: &'a SpeciesPolicy,
    store: &'a dyn MetadataStore,
    anonymizer: &'a dyn Anonymizer,
    full: bool,
    dry_run: bool,
}

impl<'a> MediaRouter<'a> {
    pub fn new(
        classifier: &'a TagClassifier,
        policy: &'a SpeciesPolicy,
        store: &'a dyn MetadataStore,
        anonymizer: &'a dyn Anonymizer,
    ) -> Self {
        Self {
            classifier,
            policy,
            store,
            anonymizer,
            full: false,
            dry_run: false,
        }
    }

    /// Copie complète: ignore le jalon du dernier relevé copié
    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Mode répétition: tout est journalisé, rien n'est écrit
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Copie les médias de `source` vers l'arborescence OCA sous
    /// `destination`. Les médias déjà couverts par un relevé copié sont
    /// ignorés, sauf en copie complète.
    pub fn route(&self, source: &Path, destination: &Path) -> Result<RunSummary> {
        let manifest = Manifest::load(source)?;
        let Some(export) = manifest.export_oca else {
            bail!("{MANIFEST_NAME} has no export_oca key");
        };
        if !export {
            info!("export_oca is false, nothing to copy");
            return Ok(RunSummary::default());
        }

        let tree = self.build_tree(&manifest, source, destination)?;
        let mode = if self.full { "full" } else { "incremental" };
        info!(
            mode,
            watermark = %tree.watermark,
            "Copying media to the OCA tree"
        );

        let mut summary = RunSummary::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut sequence: u32 = 0;

        // Parcours trié: les numéros de séquence sont reproductibles.
        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !naming::is_media(entry.path()) {
                continue;
            }
            summary.examined += 1;
            let file = entry.path();
            let Some(date) = naming::canonical_date(file_name(file)) else {
                warn!(
                    file = %file_name(file),
                    "Media name is not canonical, file skipped"
                );
                continue;
            };
            if !self.full && date <= tree.watermark.as_str() {
                continue;
            }
            summary.eligible += 1;
            sequence += 1;
            debug!(file = %file_name(file), date, sequence, "Routing media");
            if let Err(err) = self.route_file(file, date, sequence, &tree, &mut claimed, &mut summary)
            {
                error!(
                    file = %file_name(file),
                    error = %err,
                    "Copy failed, media abandoned"
                );
                summary.failures += 1;
            }
        }
        info!(
            examined = summary.examined,
            eligible = summary.eligible,
            copied = summary.copied,
            anonymized = summary.anonymized,
            collisions = summary.collisions,
            failures = summary.failures,
            "Copy done"
        );
        Ok(summary)
    }

    /// Crée le répertoire racine et les sous-répertoires de relevé, et
    /// relève le jalon incrémental sur les relevés déjà présents
    fn build_tree(
        &self,
        manifest: &Manifest,
        source: &Path,
        destination: &Path,
    ) -> Result<DestinationTree> {
        let camera = manifest
            .camera
            .as_ref()
            .with_context(|| format!("{MANIFEST_NAME} has no caméra section"))?;
        let root = destination.join(root_name(&camera.name, source)?);
        if !root.is_dir() {
            info!(root = %root.display(), "Creating the destination root");
            if !self.dry_run {
                fs::create_dir(&root)
                    .with_context(|| format!("Failed to create {}", root.display()))?;
            }
        }
        if !self.dry_run {
            fs::copy(source.join(MANIFEST_NAME), root.join(MANIFEST_NAME))
                .with_context(|| format!("Failed to copy {MANIFEST_NAME}"))?;
        }

        let mut surveys = manifest
            .surveys
            .iter()
            .map(|date| naming::survey_stamp(date))
            .collect::<camtrap::Result<Vec<_>>>()?;
        surveys.sort();

        let mut watermark = String::from("00000000");
        for stamp in &surveys {
            let dir = root.join(stamp);
            if dir.is_dir() {
                watermark.clone_from(stamp);
            } else {
                info!(survey = %stamp, "Creating the survey directory");
                if !self.dry_run {
                    fs::create_dir_all(&dir)
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                }
            }
        }
        Ok(DestinationTree {
            root,
            surveys,
            watermark,
        })
    }

    /// Copie un média vers un fichier de destination par espèce taguée
    fn route_file(
        &self,
        file: &Path,
        date: &str,
        sequence: u32,
        tree: &DestinationTree,
        claimed: &mut HashSet<PathBuf>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let capture = self.store.read(file)?;
        let classification = self.classifier.classify(&capture.tags);
        if classification.species.is_empty() {
            warn!(file = %file_name(file), "No species tagged, media not copied");
            return Ok(());
        }

        // Activité humaine taguée: le média est anonymisé avant copie.
        // La copie retombe sur l'original si l'anonymiseur échoue.
        let mut anonymized: Option<NamedTempFile> = None;
        if classification.species.iter().any(|s| self.policy.is_human(s)) {
            info!(
                file = %file_name(file),
                "Human activity tagged, anonymizing before copy"
            );
            summary.anonymized += 1;
            if !self.dry_run {
                anonymized = self.anonymize_to_temp(file);
            }
        }
        let copy_source = anonymized.as_ref().map_or(file, NamedTempFile::path);
        let extension = file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        for species in &classification.species {
            let count = classification.quantity_for(species);
            let detail = classification.detail_for(species);
            let dest_name = naming::oca_name(
                sequence,
                self.policy.correct(species),
                count,
                detail,
                extension,
            );
            let relative = match tree.bucket_for(date) {
                Some(bucket) => PathBuf::from(bucket).join(&dest_name),
                None => PathBuf::from(&dest_name),
            };
            let (relative, collided) = claim_destination(relative, file_name(file), claimed);
            if collided {
                summary.collisions += 1;
                warn!(
                    dest = %relative.display(),
                    "Destination name already taken, digest suffix added"
                );
            }
            info!(
                file = %file_name(file),
                dest = %relative.display(),
                "Copying media"
            );
            summary.copied += 1;
            if self.dry_run {
                continue;
            }
            let dest = tree.root.join(&relative);
            if dest.exists() {
                warn!(dest = %relative.display(), "Destination file overwritten");
            }
            self.copy_with_metadata(copy_source, file, &dest)?;
        }
        Ok(())
    }

    /// Passe le média par l'anonymiseur dans un fichier temporaire qui
    /// garde l'extension d'origine. Retourne None sur échec, le média
    /// original sert alors de source de copie.
    fn anonymize_to_temp(&self, file: &Path) -> Option<NamedTempFile> {
        let suffix = file
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = match tempfile::Builder::new().suffix(&suffix).tempfile() {
            Ok(temp) => temp,
            Err(err) => {
                error!(
                    error = %err,
                    "Temporary file creation failed, copying the original file"
                );
                return None;
            }
        };
        match self.anonymizer.anonymize(file, temp.path()) {
            Ok(()) => Some(temp),
            Err(err) => {
                error!(
                    file = %file_name(file),
                    error = %err,
                    "Anonymization failed, copying the original file"
                );
                None
            }
        }
    }

    /// Copie le fichier puis propage la date de modification et les tags
    /// depuis l'original. Un échec de propagation des tags est journalisé
    /// sans abandonner la copie.
    fn copy_with_metadata(&self, copy_source: &Path, original: &Path, dest: &Path) -> Result<()> {
        fs::copy(copy_source, dest).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                copy_source.display(),
                dest.display()
            )
        })?;
        let mtime = modification_time(original)?;
        filetime::set_file_times(dest, mtime, mtime)
            .with_context(|| format!("Failed to restore times on {}", dest.display()))?;

        let source_sidecar = naming::sidecar_path(original);
        if source_sidecar.exists() {
            let dest_sidecar = naming::sidecar_path(dest);
            match self.store.copy_tags(&source_sidecar, &dest_sidecar) {
                Ok(()) => {
                    filetime::set_file_times(&dest_sidecar, mtime, mtime).with_context(|| {
                        format!("Failed to restore times on {}", dest_sidecar.display())
                    })?;
                    let _ = fs::remove_file(naming::backup_artifact(&dest_sidecar));
                }
                Err(err) => {
                    error!(
                        dest = %dest_sidecar.display(),
                        error = %err,
                        "Tag propagation to the sidecar failed"
                    );
                }
            }
        }
        match self.store.copy_tags(original, dest) {
            Ok(()) => {
                filetime::set_file_times(dest, mtime, mtime)
                    .with_context(|| format!("Failed to restore times on {}", dest.display()))?;
                let _ = fs::remove_file(naming::backup_artifact(dest));
            }
            Err(err) => {
                error!(
                    dest = %dest.display(),
                    error = %err,
                    "Tag propagation to the media failed"
                );
            }
        }
        Ok(())
    }
}

/// Nom du répertoire racine de destination: nom de caméra, massif sans
/// préfixe de département, segment de date sans tirets bas
pub fn root_name(camera: &str, source: &Path) -> Result<String> {
    let mut segments = source.components().rev().filter_map(|part| match part {
        Component::Normal(segment) => segment.to_str(),
        _ => None,
    });
    let folder = segments
        .next()
        .with_context(|| format!("Source directory {} has no usable name", source.display()))?;
    let parent = segments.next().unwrap_or_default();
    Ok(format!(
        "{}_{}_{}",
        camera,
        naming::strip_department_prefix(parent),
        folder.replace('_', "")
    ))
}

/// Réserve un chemin de destination pour cette passe. En cas de collision,
/// un condensat du nom du fichier source est inséré avant l'extension.
fn claim_destination(
    relative: PathBuf,
    source_name: &str,
    claimed: &mut HashSet<PathBuf>,
) -> (PathBuf, bool) {
    if claimed.insert(relative.clone()) {
        return (relative, false);
    }
    let digest = blake3::hash(source_name.as_bytes()).to_hex();
    let tag = &digest.as_str()[..8];
    let name = relative
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let mut attempt = 0;
    loop {
        let suffix = if attempt == 0 {
            tag.to_string()
        } else {
            format!("{tag}_{attempt}")
        };
        let renamed = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{name}_{suffix}"),
        };
        let candidate = relative.with_file_name(renamed);
        if claimed.insert(candidate.clone()) {
            return (candidate, true);
        }
        attempt += 1;
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}
