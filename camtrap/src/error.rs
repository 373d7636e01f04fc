//! Types d'erreurs pour le crate camtrap

use thiserror::Error;

/// Erreurs pouvant survenir lors du traitement des médias
#[derive(Debug, Error)]
pub enum CamtrapError {
    /// Erreur d'I/O lors de la lecture d'un fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Date de relevé invalide dans le manifeste
    #[error("Invalid survey date '{date}': {reason}")]
    InvalidDate { date: String, reason: String },

    /// Code de grain de dégradation inconnu
    #[error("Unknown degradation grain: {0}")]
    InvalidGrain(String),

    /// Nom de fichier inexploitable
    #[error("Invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl CamtrapError {
    /// Crée une erreur de date invalide avec contexte
    pub fn invalid_date(date: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            date: date.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de nom de fichier invalide
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Alias de résultat pour le crate
pub type Result<T> = std::result::Result<T, CamtrapError>;
