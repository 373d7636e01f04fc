//! Conversion des vidéos AVI en MP4 optimisé via ffmpeg
//!
//! Les pièges photo produisent des AVI volumineux; l'archivage passe par un
//! réencodage HEVC accéléré GPU. Le trait [`Transcoder`] isole le
//! sous-processus pour que les tests substituent un convertisseur factice.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Réglages hevc_nvenc retenus pour les vidéos de pièges photo
const ENCODER_ARGS: [&str; 42] = [
    "-c:v",
    "hevc_nvenc",
    "-preset",
    "p7",
    "-tune",
    "hq",
    "-profile",
    "main",
    "-rc",
    "vbr",
    "-rc-lookahead",
    "60",
    "-fps_mode",
    "passthrough",
    "-multipass",
    "fullres",
    "-temporal-aq",
    "1",
    "-spatial-aq",
    "1",
    "-aq-strength",
    "12",
    "-cq",
    "24",
    "-b:v",
    "0M",
    "-bufsize",
    "500M",
    "-maxrate",
    "250M",
    "-qmin",
    "0",
    "-g",
    "250",
    "-bf",
    "3",
    "-b_ref_mode",
    "each",
    "-i_qfactor",
    "0.75",
    "-b_qfactor",
    "1.1",
];

/// Réencodage d'une vidéo
pub trait Transcoder {
    /// Convertit `source` en MP4 dans `dest`, en inscrivant `creation_time`
    /// (ISO 8601 à la seconde) dans les métadonnées du conteneur
    fn transcode(&self, source: &Path, dest: &Path, creation_time: &str) -> Result<()>;
}

/// Implémentation ffmpeg
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Résout l'exécutable: variable `CAMTRAP_FFMPEG`, sinon `ffmpeg`
    /// trouvé dans le PATH
    pub fn from_env() -> Self {
        let program = std::env::var("CAMTRAP_FFMPEG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ffmpeg"));
        Self { program }
    }
}

impl Transcoder for Ffmpeg {
    fn transcode(&self, source: &Path, dest: &Path, creation_time: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .args(["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"])
            .arg("-i")
            .arg(source)
            .args(["-map_metadata", "0:s:0"])
            .arg("-metadata")
            .arg(format!("creation_time={creation_time}"))
            .args(ENCODER_ARGS)
            .arg(dest);

        let mut child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        // Progression ffmpeg sur stderr, lignes time=
        if let Some(stderr) = child.stderr.take() {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                if let Ok(line) = line {
                    if let Some(seconds) = parse_ffmpeg_time(&line) {
                        debug!(source = %source.display(), seconds, "Transcoding");
                    }
                }
            }
        }

        let status = child.wait().context("ffmpeg process error")?;
        if !status.success() {
            let _ = std::fs::remove_file(dest);
            bail!(
                "ffmpeg exited with code {} on {}",
                status.code().unwrap_or(-1),
                source.display()
            );
        }

        Ok(())
    }
}

/// Position `time=HH:MM:SS.cs` d'une ligne de progression ffmpeg, en secondes
fn parse_ffmpeg_time(line: &str) -> Option<f64> {
    let idx = line.find("time=")?;
    let after = &line[idx + 5..];
    let end = after
        .find(|c: char| c == ' ' || c == '\r' || c == '\n')
        .unwrap_or(after.len());
    let stamp = &after[..end];

    // ffmpeg émet time=-… ou time=N/A avant la première frame
    if stamp.starts_with('-') || stamp.starts_with('N') {
        return None;
    }

    let (hours, rest) = stamp.split_once(':')?;
    let (minutes, seconds) = rest.split_once(':')?;
    if seconds.contains(':') {
        return None;
    }
    Some(
        hours.parse::<f64>().ok()? * 3600.0
            + minutes.parse::<f64>().ok()? * 60.0
            + seconds.parse::<f64>().ok()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffmpeg_time() {
        let line = "frame=  100 fps= 25 q=24.0 time=00:01:23.45 bitrate= 900kbits/s";
        let seconds = parse_ffmpeg_time(line).unwrap();
        assert!((seconds - 83.45).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ffmpeg_time_not_yet_started() {
        assert_eq!(parse_ffmpeg_time("time=N/A bitrate=N/A"), None);
        assert_eq!(parse_ffmpeg_time("time=-577014:32:22.77"), None);
    }

    #[test]
    fn test_parse_ffmpeg_time_absent() {
        assert_eq!(parse_ffmpeg_time("frame= 100 fps= 25"), None);
    }

    #[test]
    fn test_from_env_falls_back_to_path() {
        std::env::remove_var("CAMTRAP_FFMPEG");
        let ffmpeg = Ffmpeg::from_env();
        assert_eq!(ffmpeg.program, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let ffmpeg = Ffmpeg::new(PathBuf::from("/nonexistent/ffmpeg"));
        let result = ffmpeg.transcode(
            Path::new("a.avi"),
            Path::new("a_c.mp4"),
            "2023-06-12T04:31:08",
        );
        assert!(result.is_err());
    }
}
