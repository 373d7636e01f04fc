//! Définition et implémentation des commandes CLI
//!
//! Chaque commande couvre une étape de la chaîne de traitement:
//! - `rename`: renommage canonique des médias d'un répertoire caméra
//! - `convert`: conversion des vidéos AVI en MP4 HEVC
//! - `geotag`: écriture de la position de la caméra dans les sidecars
//! - `verify`: contrôle du tagging avant transmission
//! - `copy`: copie vers l'arborescence OCA de destination
//! - `export`: export des observations en CSV Lambert-93
//! - `compare`: comparaison des comptes source/destination
//! - `analyze`: synthèse des espèces déjà transmises

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use camtrap::{naming, TagClassifier, DEFAULT_REGION_PREFIX};
use chrono::{Local, TimeZone};
use clap::{Args, Subcommand};
use filetime::FileTime;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::anonymize::{Deface, DEFAULT_EXECUTION_PROVIDER};
use crate::config::{load_policy, Manifest};
use crate::export::export_to_csv;
use crate::metadata::{ExifTool, MetadataStore};
use crate::observation::ObservationBuilder;
use crate::rename::{self, files_in, modification_time};
use crate::report::{CompareReport, SpeciesTally, VerifyReport};
use crate::router::{root_name, MediaRouter};
use crate::transcode::{Ffmpeg, Transcoder};

#[derive(Subcommand)]
pub enum Commands {
    /// Renomme les médias au format canonique IMG_date_heure_NN
    Rename(RenameArgs),
    /// Convertit les vidéos AVI en MP4 HEVC
    Convert(ConvertArgs),
    /// Écrit la position de la caméra dans les sidecars XMP
    Geotag(GeotagArgs),
    /// Contrôle le tagging des photos et vidéos
    Verify(VerifyArgs),
    /// Copie les médias vers l'arborescence OCA de destination
    Copy(CopyArgs),
    /// Exporte les observations en CSV Lambert-93
    Export(ExportArgs),
    /// Compare les répertoires caméra et l'arborescence OCA
    Compare(CompareArgs),
    /// Synthèse par espèce des médias transmis
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
pub struct RenameArgs {
    /// Répertoire des médias à renommer
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Renomme aussi les fichiers déjà au format canonique
    #[arg(long)]
    pub force: bool,

    /// Mode essai: journalise sans renommer
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Répertoire des vidéos AVI à convertir
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Répertoire des vidéos converties
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Mode essai: journalise sans convertir
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct GeotagArgs {
    /// Répertoire caméra avec son manifeste information.yaml
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Mode essai: journalise sans écrire les tags
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Répertoire des médias à contrôler
    #[arg(short, long)]
    pub input_dir: PathBuf,
}

#[derive(Args)]
pub struct CopyArgs {
    /// Répertoire caméra source
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Racine de l'arborescence OCA de destination
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Copie complète, sans filtre incrémental
    #[arg(long)]
    pub full: bool,

    /// Mode essai: journalise sans copier
    #[arg(long)]
    pub dry_run: bool,

    /// Fichier YAML de politique d'espèces
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Fournisseur d'exécution de l'anonymiseur
    #[arg(long, default_value = DEFAULT_EXECUTION_PROVIDER)]
    pub execution_provider: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Répertoire des médias à exporter
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Fichier CSV de sortie
    #[arg(short, long)]
    pub output: PathBuf,

    /// Remplace le fichier d'export s'il existe déjà
    #[arg(long)]
    pub replace: bool,

    /// Fichier YAML de politique d'espèces
    #[arg(long)]
    pub policy: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompareArgs {
    /// Racine des répertoires caméra source
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Racine de l'arborescence OCA de destination
    #[arg(short, long)]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Racine de l'arborescence OCA transmise
    #[arg(short, long)]
    pub input_dir: PathBuf,
}

/// Renommage canonique des médias d'un répertoire caméra
pub fn cmd_rename(args: RenameArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    let store = ExifTool::from_env();
    let summary = rename::rename_canonical(&args.input_dir, &store, args.force, args.dry_run)?;
    info!(
        staged = summary.staged,
        stamped = summary.stamped,
        undated = summary.undated,
        "Rename done"
    );
    Ok(())
}

/// Conversion des vidéos AVI en MP4 HEVC, tags et dates préservés
pub fn cmd_convert(args: ConvertArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    if !args.output_dir.is_dir() {
        info!(dir = %args.output_dir.display(), "Creating the output directory");
        if !args.dry_run {
            fs::create_dir_all(&args.output_dir)
                .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
        }
    }

    let store = ExifTool::from_env();
    let transcoder = Ffmpeg::from_env();
    let mut converted = 0usize;
    let mut failures = 0usize;
    for file in files_in(&args.input_dir)? {
        if !naming::is_unconverted(&file) {
            continue;
        }
        let stem = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let dest = args.output_dir.join(format!("{stem}_c.mp4"));
        info!(
            from = %file_name(&file),
            to = %file_name(&dest),
            "Converting video"
        );
        if args.dry_run {
            converted += 1;
            continue;
        }
        let mtime = modification_time(&file)?;
        if let Err(err) = transcoder.transcode(&file, &dest, &creation_timestamp(mtime)) {
            error!(
                file = %file_name(&file),
                error = %err,
                "Conversion failed, video skipped"
            );
            failures += 1;
            continue;
        }
        converted += 1;
        filetime::set_file_times(&dest, mtime, mtime)
            .with_context(|| format!("Failed to restore times on {}", dest.display()))?;

        match store.copy_tags(&file, &dest) {
            Ok(()) => {
                filetime::set_file_times(&dest, mtime, mtime)
                    .with_context(|| format!("Failed to restore times on {}", dest.display()))?;
                let _ = fs::remove_file(naming::backup_artifact(&dest));
            }
            Err(err) => {
                error!(
                    dest = %file_name(&dest),
                    error = %err,
                    "Tag propagation to the converted video failed"
                );
            }
        }
        let source_sidecar = naming::sidecar_path(&file);
        if source_sidecar.exists() {
            let dest_sidecar = naming::sidecar_path(&dest);
            match store.copy_tags(&source_sidecar, &dest_sidecar) {
                Ok(()) => {
                    filetime::set_file_times(&dest_sidecar, mtime, mtime).with_context(|| {
                        format!("Failed to restore times on {}", dest_sidecar.display())
                    })?;
                    let _ = fs::remove_file(naming::backup_artifact(&dest_sidecar));
                }
                Err(err) => {
                    error!(
                        dest = %file_name(&dest_sidecar),
                        error = %err,
                        "Tag propagation to the sidecar failed"
                    );
                }
            }
        }
    }
    info!(converted, failures, "Conversion done");
    Ok(())
}

/// Écrit la position de la caméra du manifeste dans les sidecars XMP
pub fn cmd_geotag(args: GeotagArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    let manifest = Manifest::load(&args.input_dir)?;
    let camera = manifest
        .camera
        .as_ref()
        .context("information.yaml has no caméra section")?;
    debug!(
        latitude = camera.latitude,
        longitude = camera.longitude,
        altitude = camera.altitude,
        "Camera position"
    );
    let position = [
        ("XMP:GPSLatitude".to_string(), camera.latitude.to_string()),
        ("XMP:GPSLongitude".to_string(), camera.longitude.to_string()),
        ("XMP:GPSAltitude".to_string(), camera.altitude.to_string()),
    ];

    let store = ExifTool::from_env();
    let mut tagged = 0usize;
    let mut missing = 0usize;
    let mut failures = 0usize;
    for file in files_in(&args.input_dir)? {
        if !naming::is_media(&file) {
            continue;
        }
        let sidecar = naming::sidecar_path(&file);
        if !sidecar.is_file() {
            warn!(file = %file_name(&file), "No sidecar file, media not geotagged");
            missing += 1;
            continue;
        }
        debug!(file = %file_name(&file), "Writing the camera position");
        tagged += 1;
        if args.dry_run {
            continue;
        }
        if let Err(err) = store.write_tags(&sidecar, &position) {
            error!(
                file = %file_name(&file),
                error = %err,
                "Position write failed"
            );
            failures += 1;
        }
    }

    // L'écriture des tags laisse des artefacts supprimés en fin de passe.
    for file in files_in(&args.input_dir)? {
        if !file_name(&file).ends_with(".xmp_original") {
            continue;
        }
        debug!(file = %file_name(&file), "Removing the backup artifact");
        if !args.dry_run {
            fs::remove_file(&file)
                .with_context(|| format!("Failed to remove {}", file.display()))?;
        }
    }
    info!(tagged, missing, failures, "Geotag done");
    Ok(())
}

/// Contrôle du tagging d'un répertoire, avec bilan en fin de passe
pub fn cmd_verify(args: VerifyArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    let store = ExifTool::from_env();
    let classifier = TagClassifier::new(DEFAULT_REGION_PREFIX);
    let mut report = VerifyReport::new(&dir_label(&args.input_dir));

    for entry in WalkDir::new(&args.input_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file = entry.path();
        let unconverted = naming::is_unconverted(file);
        if !naming::is_media(file) && !unconverted {
            continue;
        }
        report.files += 1;

        if unconverted {
            warn!(file = %relative(file, &args.input_dir), "Unconverted AVI video");
            report.unconverted += 1;
        }
        if !naming::is_canonical(file_name(file)) {
            warn!(
                file = %relative(file, &args.input_dir),
                "Media name is not canonical"
            );
            report.misnamed += 1;
        }

        let capture = match store.read(file) {
            Ok(capture) => capture,
            Err(err) => {
                error!(
                    file = %relative(file, &args.input_dir),
                    error = %err,
                    "Metadata read failed"
                );
                continue;
            }
        };
        let classification = classifier.classify(&capture.tags);
        if classification.species.is_empty() {
            warn!(file = %relative(file, &args.input_dir), "No species tag");
        } else {
            report.with_species += 1;
        }
        if !classification.quantities.is_empty() {
            report.with_quantity += 1;
        }
        if !classification.details.is_empty() {
            report.with_details += 1;
        }
        if classification.locations.is_empty() {
            warn!(file = %relative(file, &args.input_dir), "No location tag");
        } else {
            report.with_location += 1;
        }
        if capture.gps.is_some() {
            report.with_gps += 1;
        } else {
            warn!(file = %relative(file, &args.input_dir), "No GPS position");
        }
    }
    report.display();
    Ok(())
}

/// Copie des médias d'un répertoire caméra vers l'arborescence OCA
pub fn cmd_copy(args: CopyArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    ensure_dir(&args.output_dir)?;
    let policy = load_policy(args.policy.as_deref())?;
    let classifier = TagClassifier::new(DEFAULT_REGION_PREFIX);
    let store = ExifTool::from_env();
    let anonymizer = Deface::from_env(args.execution_provider);

    let router = MediaRouter::new(&classifier, &policy, &store, &anonymizer)
        .full(args.full)
        .dry_run(args.dry_run);
    router.route(&args.input_dir, &args.output_dir)?;
    Ok(())
}

/// Export des observations en CSV Lambert-93
pub fn cmd_export(args: ExportArgs) -> Result<()> {
    if args.output.exists() && !args.replace {
        bail!("Export file {} already exists", args.output.display());
    }
    ensure_dir(&args.input_dir)?;
    let policy = load_policy(args.policy.as_deref())?;
    let classifier = TagClassifier::new(DEFAULT_REGION_PREFIX);
    let builder = ObservationBuilder::new(&classifier, &policy);
    let store = ExifTool::from_env();

    let mut observations = Vec::new();
    let mut files = 0usize;
    let mut without_species = 0usize;
    let mut without_gps = 0usize;
    let mut failures = 0usize;
    for entry in WalkDir::new(&args.input_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !naming::is_media(entry.path()) {
            continue;
        }
        files += 1;
        let file = entry.path();
        debug!(file = %relative(file, &args.input_dir), "Reading observations");
        match store.read(file) {
            Ok(capture) => {
                if classifier.species(&capture.tags).is_empty() {
                    without_species += 1;
                }
                if capture.gps.is_none() {
                    without_gps += 1;
                }
                observations.extend(builder.build(file, &capture));
            }
            Err(err) => {
                error!(
                    file = %relative(file, &args.input_dir),
                    error = %err,
                    "Metadata read failed, media skipped"
                );
                failures += 1;
            }
        }
    }

    export_to_csv(&observations, &args.output)?;
    info!(
        files,
        observations = observations.len(),
        without_species,
        without_gps,
        failures,
        output = %args.output.display(),
        "Export done"
    );
    Ok(())
}

/// Comparaison des comptes de fichiers entre source et destination
pub fn cmd_compare(args: CompareArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    ensure_dir(&args.output_dir)?;
    let mut report = CompareReport::new();

    // Côté source: un répertoire caméra par manifeste rencontré
    for entry in WalkDir::new(&args.input_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() || !Manifest::exists_in(entry.path()) {
            continue;
        }
        let dir = entry.path();
        let manifest = match Manifest::load(dir) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    error = %err,
                    "Unreadable manifest, directory skipped"
                );
                continue;
            }
        };
        if manifest.export_oca == Some(false) {
            continue;
        }
        let Some(camera) = manifest.camera.as_ref() else {
            warn!(dir = %dir.display(), "Manifest has no caméra section, directory skipped");
            continue;
        };
        let root = root_name(&camera.name, dir)?;
        let files = files_in(dir)?.len();
        debug!(dir = %dir.display(), root = %root, files, "Source camera directory");
        report.add_source(&root, files);
    }

    // Côté destination: un répertoire de relevé par sous-répertoire de racine
    for root_entry in WalkDir::new(&args.output_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let root_entry = root_entry?;
        if !root_entry.file_type().is_dir() {
            continue;
        }
        let root = file_name(root_entry.path()).to_string();
        if root.starts_with('.') {
            continue;
        }
        for survey_entry in WalkDir::new(root_entry.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let survey_entry = survey_entry?;
            if !survey_entry.file_type().is_dir() {
                continue;
            }
            let mut files = 0usize;
            let mut bytes = 0u64;
            let mut photos = 0usize;
            let mut videos = 0usize;
            for file in files_in(survey_entry.path())? {
                files += 1;
                bytes += fs::metadata(&file)
                    .with_context(|| format!("Failed to read metadata of {}", file.display()))?
                    .len();
                if naming::is_photo(&file) {
                    photos += 1;
                }
                if naming::is_video(&file) {
                    videos += 1;
                }
            }
            if !report.add_destination(&root, files, bytes, photos, videos) {
                warn!(root = %root, "Destination root without matching source directory");
            }
        }
    }

    report.display();
    Ok(())
}

/// Synthèse des occurrences et individus par espèce transmise
pub fn cmd_analyze(args: AnalyzeArgs) -> Result<()> {
    ensure_dir(&args.input_dir)?;
    let mut tally = SpeciesTally::new();
    for entry in WalkDir::new(&args.input_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !naming::is_media(entry.path()) {
            continue;
        }
        let name = file_name(entry.path());
        debug!(file = %name, "Analyzing media name");
        if let Some((species, count)) = naming::parse_oca_name(name) {
            tally.record(&species, count);
        }
    }
    tally.display();
    Ok(())
}

/// Horodatage local ISO 8601 à la seconde, pour les métadonnées vidéo
fn creation_timestamp(mtime: FileTime) -> String {
    Local
        .timestamp_opt(mtime.unix_seconds(), 0)
        .single()
        .map(|stamp| stamp.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| String::from("1970-01-01T00:00:00"))
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("{} is not a valid directory", path.display());
    }
    Ok(())
}

/// Nom affiché d'un répertoire dans les bilans
fn dir_label(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Chemin relatif au répertoire de la commande, pour les journaux
fn relative<'a>(file: &'a Path, root: &Path) -> std::path::Display<'a> {
    file.strip_prefix(root).unwrap_or(file).display()
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_parse_copy_arguments() {
        let cli = TestCli::parse_from([
            "camtrap-oca",
            "copy",
            "--input-dir",
            "/data/FR38_Belledonne/2024_06",
            "--output-dir",
            "/oca",
            "--full",
            "--dry-run",
        ]);
        let Commands::Copy(args) = cli.command else {
            panic!("copy attendu");
        };
        assert_eq!(args.input_dir, PathBuf::from("/data/FR38_Belledonne/2024_06"));
        assert_eq!(args.output_dir, PathBuf::from("/oca"));
        assert!(args.full);
        assert!(args.dry_run);
        assert_eq!(args.execution_provider, DEFAULT_EXECUTION_PROVIDER);
    }

    #[test]
    fn test_parse_export_defaults() {
        let cli = TestCli::parse_from([
            "camtrap-oca",
            "export",
            "-i",
            "/data",
            "-o",
            "/tmp/export.csv",
        ]);
        let Commands::Export(args) = cli.command else {
            panic!("export attendu");
        };
        assert!(!args.replace);
        assert!(args.policy.is_none());
    }

    #[test]
    fn test_ensure_dir_rejects_missing_path() {
        let err = ensure_dir(Path::new("/chemin/inexistant")).unwrap_err();
        assert!(err.to_string().contains("/chemin/inexistant"));
    }

    #[test]
    fn test_creation_timestamp_shape() {
        let stamp = creation_timestamp(FileTime::from_unix_time(1_717_337_730, 0));
        assert_eq!(stamp.len(), 19);
        assert_eq!(stamp.as_bytes()[10], b'T');
    }

    #[test]
    fn test_dir_label_uses_last_segment() {
        assert_eq!(dir_label(Path::new("/data/FR38_Belledonne/2024_06")), "2024_06");
    }

    #[test]
    fn test_relative_strips_root() {
        let shown = relative(
            Path::new("/data/2024_06/IMG_20240602_141530_00.jpg"),
            Path::new("/data/2024_06"),
        );
        assert_eq!(shown.to_string(), "IMG_20240602_141530_00.jpg");
    }
}
