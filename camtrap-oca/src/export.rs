//! Export CSV des observations avec geozero pour la géométrie (streaming).

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;

use crate::observation::Observation;

/// En-tête du fichier d'export, colonnes dans l'ordre attendu par l'observatoire.
pub const CSV_HEADER: &str =
    "Commune;Date;Espèce;Quantité;Détails;X_L93;Y_L93;Altitude;Géometrie";

/// Exporte les observations en CSV (séparateur `;`, UTF-8).
pub fn export_to_csv(observations: &[Observation], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, observations)?;
    writer.flush()?;

    Ok(())
}

/// Écrit l'en-tête puis une ligne par observation.
pub fn write_csv<W: Write>(writer: &mut W, observations: &[Observation]) -> Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;

    let mut wkt_buf = Vec::new();
    for observation in observations {
        write_row(writer, observation, &mut wkt_buf)?;
    }

    Ok(())
}

/// Écrit une ligne d'observation
fn write_row<W: Write>(
    writer: &mut W,
    observation: &Observation,
    wkt_buf: &mut Vec<u8>,
) -> Result<()> {
    write!(
        writer,
        "{};{};{};{};{};",
        escape_field(&observation.commune),
        escape_field(&observation.date),
        escape_field(&observation.species),
        observation.count,
        escape_field(&observation.detail),
    )?;

    match observation.position {
        Some(point) => {
            // Geometry en WKT via geozero
            wkt_buf.clear();
            {
                let mut wkt = WktWriter::new(&mut *wkt_buf);
                Geometry::Point(point)
                    .process_geom(&mut wkt)
                    .context("Failed to encode position to WKT")?;
            }
            write!(writer, "{};{};", point.x(), point.y())?;
            match observation.altitude {
                Some(altitude) => write!(writer, "{altitude};")?,
                None => write!(writer, ";")?,
            }
            writer.write_all(&wkt_buf[..])?;
            writeln!(writer)?;
        }
        None => {
            // Sans GPS les quatre colonnes géographiques restent vides
            writeln!(writer, ";;;")?;
        }
    }

    Ok(())
}

/// Échappe un champ texte pour le CSV à séparateur `;`
fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains(';') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        Cow::Owned(quoted)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use std::io::Cursor;

    fn observation() -> Observation {
        Observation {
            commune: "Chichilianne".to_string(),
            date: "2023:06:12 04:31:08".to_string(),
            species: "Chevreuil européen".to_string(),
            count: 2,
            detail: "femelle et jeune".to_string(),
            position: Some(Point::new(935482.0, 6458745.0)),
            altitude: Some(1650.0),
        }
    }

    #[test]
    fn test_write_csv_full_row() {
        let mut buffer = Cursor::new(Vec::new());
        write_csv(&mut buffer, &[observation()]).unwrap();

        let csv = String::from_utf8(buffer.into_inner()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Commune;Date;Espèce;Quantité;Détails;X_L93;Y_L93;Altitude;Géometrie")
        );
        assert_eq!(
            lines.next(),
            Some(
                "Chichilianne;2023:06:12 04:31:08;Chevreuil européen;2;\
                 femelle et jeune;935482;6458745;1650;POINT(935482 6458745)"
            )
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_csv_without_position() {
        let mut buffer = Cursor::new(Vec::new());
        let obs = Observation {
            position: None,
            altitude: None,
            ..observation()
        };
        write_csv(&mut buffer, &[obs]).unwrap();

        let csv = String::from_utf8(buffer.into_inner()).unwrap();
        assert_eq!(
            csv.lines().nth(1),
            Some("Chichilianne;2023:06:12 04:31:08;Chevreuil européen;2;femelle et jeune;;;;")
        );
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("Chevreuil européen"), "Chevreuil européen");
        assert_eq!(escape_field("mâle; femelle"), "\"mâle; femelle\"");
        assert_eq!(escape_field("dit \"le vieux\""), "\"dit \"\"le vieux\"\"\"");
        assert_eq!(escape_field("deux\nlignes"), "\"deux\nlignes\"");
    }

    #[test]
    fn test_export_to_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("observations.csv");

        export_to_csv(&[observation()], &output_path).unwrap();

        let content = std::fs::read_to_string(&output_path).unwrap();
        assert!(content.starts_with(CSV_HEADER));
        assert!(content.contains("POINT(935482 6458745)"));
    }
}
