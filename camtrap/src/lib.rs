//! # camtrap
//!
//! Bibliothèque de traitement des médias de pièges photographiques:
//! classification des tags hiérarchiques digiKam, politique d'espèces
//! (exclusions, corrections, sensibilité) et conventions de nommage des
//! fichiers.
//!
//! ## Usage
//!
//! ```rust
//! use camtrap::{SpeciesPolicy, TagClassifier};
//!
//! let classifier = TagClassifier::default();
//! let policy = SpeciesPolicy::default();
//!
//! let tags = vec![
//!     "Nature|Animaux|Mammifères|Chamois {Rupicapra rupicapra}".to_string(),
//!     "Quantité|Chamois_2".to_string(),
//! ];
//!
//! let classification = classifier.classify(&tags);
//! for species in &classification.species {
//!     if !policy.is_human(species) {
//!         println!(
//!             "{}: {}",
//!             policy.correct(species),
//!             classification.quantity_for(species)
//!         );
//!     }
//! }
//! ```

pub mod classifier;
pub mod error;
pub mod naming;
pub mod policy;
pub mod types;

pub use classifier::{TagClassifier, DEFAULT_REGION_PREFIX};
pub use error::{CamtrapError, Result};
pub use policy::{Grain, SpeciesPolicy};
pub use types::{Classification, SpeciesCount, SpeciesDetail};
