//! # camtrap-oca
//!
//! Organisation des médias de pièges photographiques pour un suivi OCA.
//!
//! ## Fonctions
//!
//! - Renommage canonique `IMG_AAAAMMJJ_HHMMSS_NN` des photos et vidéos
//! - Conversion des vidéos AVI en MP4 HEVC
//! - Géotag des sidecars XMP depuis le manifeste de la caméra
//! - Copie vers l'arborescence OCA par relevé, avec anonymisation des
//!   passages humains et propagation des tags
//! - Export CSV Lambert-93 des observations, espèces sensibles dégradées
//!
//! ## Usage CLI
//!
//! ```bash
//! # Renommage canonique d'un répertoire caméra
//! camtrap-oca rename --input-dir ./2024_06
//!
//! # Copie incrémentale vers l'arborescence OCA
//! camtrap-oca copy --input-dir ./FR38_Belledonne/2024_06 --output-dir ./OCA
//!
//! # Export des observations en CSV
//! camtrap-oca export --input-dir ./FR38_Belledonne --output ./observations.csv
//! ```

pub mod anonymize;
pub mod config;
pub mod export;
pub mod metadata;
pub mod observation;
pub mod projection;
pub mod rename;
pub mod report;
pub mod router;
pub mod transcode;

pub use metadata::{CaptureMetadata, ExifTool, GpsPosition, MetadataStore};
pub use observation::{Observation, ObservationBuilder};
pub use router::{MediaRouter, RunSummary};
