//! Anonymisation des médias montrant des personnes
//!
//! Les médias classés avec une activité humaine (randonneur, chasseur...)
//! passent par `deface` avant copie vers l'archive: les visages sont floutés,
//! les métadonnées conservées. Le trait [`Anonymizer`] isole le sous-processus
//! pour que les tests substituent un flouteur factice.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Fournisseur d'exécution onnxruntime par défaut (GPU NVIDIA)
pub const DEFAULT_EXECUTION_PROVIDER: &str = "CUDAExecutionProvider";

/// Floutage des visages d'un média
pub trait Anonymizer {
    /// Écrit dans `dest` une copie de `source` aux visages floutés
    fn anonymize(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// Implémentation deface
#[derive(Debug, Clone)]
pub struct Deface {
    program: PathBuf,
    execution_provider: String,
}

impl Deface {
    pub fn new(program: PathBuf, execution_provider: String) -> Self {
        Self {
            program,
            execution_provider,
        }
    }

    /// Résout l'exécutable: variable `CAMTRAP_DEFACE`, sinon `deface`
    /// trouvé dans le PATH
    pub fn from_env(execution_provider: String) -> Self {
        let program = std::env::var("CAMTRAP_DEFACE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("deface"));
        Self::new(program, execution_provider)
    }
}

impl Anonymizer for Deface {
    fn anonymize(&self, source: &Path, dest: &Path) -> Result<()> {
        debug!(source = %source.display(), dest = %dest.display(), "Running deface");
        // macro_block_size 8 pour accepter les résolutions des pièges photo
        let output = Command::new(&self.program)
            .arg("--keep-metadata")
            .args(["--ffmpeg-config", r#"{"macro_block_size": 8}"#])
            .args(["--execution-provider", &self.execution_provider])
            .arg("--output")
            .arg(dest)
            .arg(source)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "deface failed on {}: {}",
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_falls_back_to_path() {
        std::env::remove_var("CAMTRAP_DEFACE");
        let deface = Deface::from_env(DEFAULT_EXECUTION_PROVIDER.to_string());
        assert_eq!(deface.program, PathBuf::from("deface"));
        assert_eq!(deface.execution_provider, DEFAULT_EXECUTION_PROVIDER);
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let deface = Deface::new(
            PathBuf::from("/nonexistent/deface"),
            DEFAULT_EXECUTION_PROVIDER.to_string(),
        );
        let result = deface.anonymize(Path::new("a.jpg"), Path::new("b.jpg"));
        assert!(result.is_err());
    }
}
