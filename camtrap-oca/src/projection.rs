//! Projection WGS84 vers Lambert 93 (EPSG:4326 -> EPSG:2154)
//!
//! Lambert conique conforme sécant sur l'ellipsoïde GRS80, en Rust pur.
//! Les observations sont publiées en Lambert 93; les coordonnées des espèces
//! sensibles sont ensuite dégradées sur la maille de leur grain.

use geo::Point;

use camtrap::Grain;

/// Ellipsoïde GRS80 (utilisé par Lambert 93)
struct Grs80;

impl Grs80 {
    /// Demi-grand axe en mètres
    const A: f64 = 6378137.0;
    /// Aplatissement
    const F: f64 = 1.0 / 298.257222101;
    /// Première excentricité au carré
    const E2: f64 = 2.0 * Self::F - Self::F * Self::F;
    /// Première excentricité
    const E: f64 = 0.0818191910428158; // sqrt(E2)
}

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    /// Crée depuis des degrés. L'ordre des arguments fait partie du
    /// contrat: longitude d'abord, latitude ensuite.
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Calcule la latitude isométrique
fn isometric_latitude(lat: f64, e: f64) -> f64 {
    let sin_lat = lat.sin();
    let term = ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).powf(e / 2.0);
    ((std::f64::consts::FRAC_PI_4 + lat / 2.0).tan() * term).ln()
}

/// Calcule le grand normal (rayon de courbure dans le plan vertical)
fn grande_normale(lat: f64, a: f64, e2: f64) -> f64 {
    a / (1.0 - e2 * lat.sin().powi(2)).sqrt()
}

/// Projection Lambert 93, constantes du cône calculées une fois
#[derive(Debug, Clone)]
pub struct Lambert93 {
    /// Longitude origine (3°E)
    lon0: f64,
    /// Exposant du cône
    n: f64,
    /// Constante de la projection
    c: f64,
    /// Rayon à la latitude origine
    r0: f64,
    /// False easting
    x0: f64,
    /// False northing
    y0: f64,
}

impl Default for Lambert93 {
    fn default() -> Self {
        Self::new()
    }
}

impl Lambert93 {
    /// Construit la projection (EPSG:2154): origine 3°E / 46.5°N,
    /// parallèles sécants 44°N et 49°N, origine fictive 700000 / 6600000.
    pub fn new() -> Self {
        let lon0 = 3.0_f64.to_radians();
        let lat0 = 46.5_f64.to_radians();
        let lat1 = 44.0_f64.to_radians();
        let lat2 = 49.0_f64.to_radians();

        let e = Grs80::E;
        let e2 = Grs80::E2;
        let a = Grs80::A;

        let n1 = grande_normale(lat1, a, e2);
        let n2 = grande_normale(lat2, a, e2);

        let iso_lat0 = isometric_latitude(lat0, e);
        let iso_lat1 = isometric_latitude(lat1, e);
        let iso_lat2 = isometric_latitude(lat2, e);

        // Exposant du cône
        let n = ((n1 * lat1.cos()).ln() - (n2 * lat2.cos()).ln()) / (iso_lat2 - iso_lat1);

        // Constante C et rayon à l'origine
        let c = (n1 * lat1.cos() / n) * (n * iso_lat1).exp();
        let r0 = c * (-n * iso_lat0).exp();

        Self {
            lon0,
            n,
            c,
            r0,
            x0: 700000.0,
            y0: 6600000.0,
        }
    }

    /// Projette un point géographique WGS84 en Lambert 93 (mètres)
    pub fn project(&self, geo: Geographic) -> Point<f64> {
        let iso_lat = isometric_latitude(geo.lat, Grs80::E);

        // Rayon du parallèle et angle polaire
        let r = self.c * (-self.n * iso_lat).exp();
        let gamma = self.n * (geo.lon - self.lon0);

        let x = self.x0 + r * gamma.sin();
        let y = self.y0 + self.r0 - r * gamma.cos();

        Point::new(x, y)
    }
}

/// Recentre une coordonnée sur la maille du grain
pub fn degrade(value: f64, grain: Grain) -> f64 {
    let cell = grain.cell_size();
    (value / cell).floor() * cell + cell / 2.0
}

/// Recentre un point projeté sur la maille du grain, axe par axe
pub fn degrade_point(point: Point<f64>, grain: Grain) -> Point<f64> {
    Point::new(degrade(point.x(), grain), degrade(point.y(), grain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_false_origin() {
        let proj = Lambert93::new();
        let p = proj.project(Geographic::from_degrees(3.0, 46.5));
        assert!((p.x() - 700000.0).abs() < 1e-3, "x={}", p.x());
        assert!((p.y() - 6600000.0).abs() < 1e-3, "y={}", p.y());
    }

    #[test]
    fn test_central_meridian_has_no_easting_offset() {
        let proj = Lambert93::new();
        let p = proj.project(Geographic::from_degrees(3.0, 48.0));
        assert!((p.x() - 700000.0).abs() < 1e-6, "x={}", p.x());
        assert!(p.y() > 6600000.0, "y={}", p.y());
    }

    #[test]
    fn test_easting_symmetry_around_central_meridian() {
        let proj = Lambert93::new();
        let east = proj.project(Geographic::from_degrees(4.0, 45.0));
        let west = proj.project(Geographic::from_degrees(2.0, 45.0));
        assert!(
            ((east.x() - 700000.0) + (west.x() - 700000.0)).abs() < 1e-6,
            "east={} west={}",
            east.x(),
            west.x()
        );
        assert!((east.y() - west.y()).abs() < 1e-6);
    }

    #[test]
    fn test_paris() {
        // Tour Eiffel approximativement
        let proj = Lambert93::new();
        let p = proj.project(Geographic::from_degrees(2.2945, 48.8584));

        assert!((p.x() - 648237.0).abs() < 1000.0, "x={}", p.x());
        assert!((p.y() - 6862107.0).abs() < 1500.0, "y={}", p.y());
    }

    #[test]
    fn test_marseille() {
        // Vieux-Port approximativement
        let proj = Lambert93::new();
        let p = proj.project(Geographic::from_degrees(5.37, 43.30));

        assert!((p.x() - 893193.0).abs() < 10000.0, "x={}", p.x());
        assert!((p.y() - 6245829.0).abs() < 10000.0, "y={}", p.y());
    }

    #[test]
    fn test_degrade_cells() {
        assert_eq!(degrade(652216.0, Grain::M1), 652500.0);
        assert_eq!(degrade(652216.0, Grain::M2), 653000.0);
        assert_eq!(degrade(652216.0, Grain::M5), 652500.0);
        assert_eq!(degrade(652216.0, Grain::M10), 655000.0);
    }

    #[test]
    fn test_degrade_point_both_axes() {
        let p = degrade_point(Point::new(652216.0, 6862087.0), Grain::M10);
        assert_eq!(p.x(), 655000.0);
        assert_eq!(p.y(), 6865000.0);
    }

    #[test]
    fn test_degrade_is_idempotent() {
        let once = degrade(652216.0, Grain::M5);
        assert_eq!(degrade(once, Grain::M5), once);
    }
}
