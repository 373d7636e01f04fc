//! Bilans affichés en fin de commande
//!
//! Ce module fournit des structures pour collecter et afficher les bilans
//! de vérification du tagging, de comparaison source/destination et de
//! synthèse par espèce. L'affichage liste d'abord les écarts à corriger.

use std::collections::BTreeMap;

/// Bilan du tagging d'un répertoire de médias
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Nom du répertoire vérifié
    pub directory: String,
    /// Médias rencontrés, vidéos AVI comprises
    pub files: usize,
    /// Vidéos AVI non converties
    pub unconverted: usize,
    /// Médias au nom non canonique
    pub misnamed: usize,
    /// Médias avec au moins un tag espèce
    pub with_species: usize,
    /// Médias avec un tag quantité
    pub with_quantity: usize,
    /// Médias avec un tag détails
    pub with_details: usize,
    /// Médias avec un tag localisation
    pub with_location: usize,
    /// Médias géolocalisés
    pub with_gps: usize,
}

impl VerifyReport {
    /// Crée un bilan vide pour un répertoire
    pub fn new(directory: &str) -> Self {
        Self {
            directory: directory.to_string(),
            ..Default::default()
        }
    }

    /// Médias sans tag espèce
    pub fn missing_species(&self) -> usize {
        self.files - self.with_species
    }

    /// Médias sans tag localisation
    pub fn missing_location(&self) -> usize {
        self.files - self.with_location
    }

    /// Médias sans géolocalisation
    pub fn missing_gps(&self) -> usize {
        self.files - self.with_gps
    }

    /// Affiche le bilan sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("Contenu de {}", self.directory);
        println!("{}", "=".repeat(60));
        println!("Fichiers: {}", self.files);

        let gaps = [
            ("Fichiers vidéo non convertis", self.unconverted),
            ("Fichiers mal nommés", self.misnamed),
            ("Fichiers sans espèce", self.missing_species()),
            ("Fichiers sans localisation", self.missing_location()),
            ("Fichiers sans géolocalisation", self.missing_gps()),
        ];
        if gaps.iter().any(|(_, count)| *count > 0) {
            println!("\n--- À CORRIGER ---");
            for (label, count) in gaps {
                if count > 0 {
                    println!("{label}: {count}");
                }
            }
        }

        println!("\n--- TAGS ---");
        println!("Tags espèce: {}", self.with_species);
        println!("Tags quantité: {}", self.with_quantity);
        println!("Tags détails: {}", self.with_details);
        println!("{}", "=".repeat(60));
    }
}

/// Comptes d'un répertoire racine OCA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    /// Fichiers du répertoire caméra source
    pub source: usize,
    /// Fichiers copiés dans la destination, manifeste compris
    pub destination: usize,
    /// Octets copiés dans la destination
    pub size_bytes: u64,
    /// Photos copiées
    pub photos: usize,
    /// Vidéos copiées
    pub videos: usize,
}

impl DirStats {
    /// Médias copiés, photos et vidéos
    pub fn media(&self) -> usize {
        self.photos + self.videos
    }

    /// Ecart de comptage entre destination et source
    pub fn gap(&self) -> i64 {
        self.destination as i64 - self.source as i64
    }
}

/// Bilan de la comparaison entre répertoires caméra et arborescence OCA
#[derive(Debug, Clone, Default)]
pub struct CompareReport {
    /// Comptes par répertoire racine, triés par nom
    pub roots: BTreeMap<String, DirStats>,
}

impl CompareReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Déclare un répertoire caméra source et son nombre de fichiers.
    /// Le compte destination part à 1 pour le manifeste copié.
    pub fn add_source(&mut self, root: &str, files: usize) {
        let stats = self.roots.entry(root.to_string()).or_default();
        stats.source = files;
        stats.destination = 1;
    }

    /// Ajoute le contenu d'un répertoire de relevé de la destination.
    /// Retourne false quand la racine n'a pas de source connue, elle est
    /// alors ignorée.
    pub fn add_destination(
        &mut self,
        root: &str,
        files: usize,
        bytes: u64,
        photos: usize,
        videos: usize,
    ) -> bool {
        match self.roots.get_mut(root) {
            Some(stats) => {
                stats.destination += files;
                stats.size_bytes += bytes;
                stats.photos += photos;
                stats.videos += videos;
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Affiche le tableau de synthèse avec une ligne TOTAL
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("Synthèse fichiers OCA");
        println!("{}", "=".repeat(60));
        println!(
            "{:<34} {:>7} {:>11} {:>6} {:>12} {:>7} {:>7} {:>7}",
            "Répertoire", "Source", "Destination", "Ecart", "Taille", "Médias", "Photos", "Vidéos"
        );
        let mut total = DirStats::default();
        for (root, stats) in &self.roots {
            println!(
                "{:<34} {:>7} {:>11} {:>6} {:>12} {:>7} {:>7} {:>7}",
                root,
                stats.source,
                stats.destination,
                stats.gap(),
                format_size(stats.size_bytes),
                stats.media(),
                stats.photos,
                stats.videos
            );
            total.source += stats.source;
            total.destination += stats.destination;
            total.size_bytes += stats.size_bytes;
            total.photos += stats.photos;
            total.videos += stats.videos;
        }
        println!(
            "{:<34} {:>7} {:>11} {:>6} {:>12} {:>7} {:>7} {:>7}",
            "TOTAL",
            total.source,
            total.destination,
            total.gap(),
            format_size(total.size_bytes),
            total.media(),
            total.photos,
            total.videos
        );
        println!("{}", "=".repeat(60));
    }
}

/// Occurrences et individus cumulés d'une espèce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeciesStats {
    /// Fichiers où l'espèce apparaît
    pub occurrences: usize,
    /// Individus cumulés sur ces fichiers
    pub individuals: u32,
}

/// Synthèse par espèce des médias transmis
#[derive(Debug, Clone, Default)]
pub struct SpeciesTally {
    /// Comptes par espèce
    pub counts: BTreeMap<String, SpeciesStats>,
}

impl SpeciesTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute une occurrence d'une espèce et son nombre d'individus
    pub fn record(&mut self, species: &str, count: u32) {
        let stats = self.counts.entry(species.to_string()).or_default();
        stats.occurrences += 1;
        stats.individuals += count;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Affiche la synthèse, espèces les plus vues en premier
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("Synthèse espèces OCA");
        println!("{}", "=".repeat(60));
        println!(
            "{:<36} {:>11} {:>9}",
            "Espèce", "Occurrences", "Individus"
        );
        let mut rows: Vec<_> = self.counts.iter().collect();
        rows.sort_by(|(name_a, stats_a), (name_b, stats_b)| {
            stats_b
                .occurrences
                .cmp(&stats_a.occurrences)
                .then_with(|| name_a.cmp(name_b))
        });
        for (species, stats) in rows {
            println!(
                "{:<36} {:>11} {:>9}",
                species, stats.occurrences, stats.individuals
            );
        }
        println!("{}", "=".repeat(60));
    }
}

/// Taille lisible en unités binaires
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value >= KB * KB * KB {
        format!("{:.2} GB", value / (KB * KB * KB))
    } else if value >= KB * KB {
        format!("{:.2} MB", value / (KB * KB))
    } else if value >= KB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_report_missing_counts() {
        let mut report = VerifyReport::new("2024_06");
        report.files = 10;
        report.with_species = 7;
        report.with_location = 10;
        report.with_gps = 4;

        assert_eq!(report.missing_species(), 3);
        assert_eq!(report.missing_location(), 0);
        assert_eq!(report.missing_gps(), 6);
    }

    #[test]
    fn test_compare_report_accumulates_per_root() {
        let mut report = CompareReport::new();
        report.add_source("CamA_Belledonne_202406", 12);
        assert!(report.add_destination("CamA_Belledonne_202406", 6, 4096, 5, 1));
        assert!(report.add_destination("CamA_Belledonne_202406", 8, 2048, 6, 2));

        let stats = report.roots.get("CamA_Belledonne_202406").unwrap();
        assert_eq!(stats.source, 12);
        // 1 pour le manifeste, puis les deux relevés
        assert_eq!(stats.destination, 15);
        assert_eq!(stats.size_bytes, 6144);
        assert_eq!(stats.media(), 14);
        assert_eq!(stats.gap(), 3);
    }

    #[test]
    fn test_compare_report_ignores_unknown_root() {
        let mut report = CompareReport::new();
        report.add_source("CamA_Belledonne_202406", 12);
        assert!(!report.add_destination("Inconnu_Vercors_202301", 3, 100, 3, 0));
        assert!(!report.roots.contains_key("Inconnu_Vercors_202301"));
    }

    #[test]
    fn test_species_tally_accumulates() {
        let mut tally = SpeciesTally::new();
        tally.record("Renard roux", 2);
        tally.record("Renard roux", 1);
        tally.record("Chevreuil europeen", 3);

        let renard = tally.counts.get("Renard roux").unwrap();
        assert_eq!(renard.occurrences, 2);
        assert_eq!(renard.individuals, 3);
        let chevreuil = tally.counts.get("Chevreuil europeen").unwrap();
        assert_eq!(chevreuil.occurrences, 1);
        assert_eq!(chevreuil.individuals, 3);
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
