use std::path::PathBuf;

use clap::ValueEnum;

use crate::settings::RecorderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Synthetic,
    Replay,
}

#[derive(clap::Parser, Debug)]
#[command(version, about = "Records camera frames around detected motion", long_about = None)]
pub struct Args {
    /// Settings file (JSON); missing keys fall back to defaults.
    #[arg(long, default_value = "motion-recorder.json")]
    pub config: PathBuf,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Pre-roll length and cooldown, in frames.
    #[arg(long)]
    pub margin: Option<usize>,

    /// Per-pixel intensity change that counts as "changed".
    #[arg(long)]
    pub threshold: Option<u8>,

    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
    pub source: SourceKind,

    /// Directory of still images for `--source replay`.
    #[arg(long, required_if_eq("source", "replay"))]
    pub replay_dir: Option<PathBuf>,

    /// Number of synthetic frames; 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    #[arg(long, default_value_t = 320)]
    pub width: u32,

    #[arg(long, default_value_t = 240)]
    pub height: u32,

    /// Episode catalogue; defaults to `episodes.sqlite3` in the output directory.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Write the effective settings back to `--config` before starting.
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    /// Command-line values win over the settings file and the environment.
    pub fn apply_to(&self, settings: &mut RecorderSettings) {
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(margin) = self.margin {
            settings.margin = margin;
        }
        if let Some(threshold) = self.threshold {
            settings.pixel_threshold = threshold;
        }
    }

    pub fn catalogue_path(&self, settings: &RecorderSettings) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| settings.output_dir.join("episodes.sqlite3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_overrides_settings() {
        let args = Args::parse_from(["motion-recorder", "--margin", "12", "--output-dir", "/tmp/out"]);
        let mut settings = RecorderSettings::default();
        args.apply_to(&mut settings);

        assert_eq!(settings.margin, 12);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.pixel_threshold, 10);
        assert_eq!(args.catalogue_path(&settings), PathBuf::from("/tmp/out/episodes.sqlite3"));
        assert!(!args.save_config);
    }

    #[test]
    fn replay_requires_directory() {
        assert!(Args::try_parse_from(["motion-recorder", "--source", "replay"]).is_err());
        let args =
            Args::try_parse_from(["motion-recorder", "--source", "replay", "--replay-dir", "frames"])
                .unwrap();
        assert_eq!(args.source, SourceKind::Replay);
    }
}
