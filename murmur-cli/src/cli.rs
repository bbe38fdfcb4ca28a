//! Command-line interface for murmur.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use murmur_core::Dtype;

/// Long-form speech transcription
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about = "Long-form speech transcription")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Verbose logging (-v: debug, -vv: trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a 16 kHz WAV file
    Transcribe(TranscribeArgs),

    /// List the built-in model catalog
    Models,

    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct TranscribeArgs {
    /// Input WAV file (16 kHz, any channel count)
    #[arg(value_name = "WAV")]
    pub input: PathBuf,

    /// Catalog model key (see `murmur models`)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Directory holding model artifacts
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Spoken language (e.g. en, de). "auto" lets the model detect it
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Weight precision: fp16, fp32, q8 or q4
    #[arg(long, value_name = "DTYPE")]
    pub dtype: Option<Dtype>,

    /// Translate to English instead of transcribing
    #[arg(long)]
    pub translate: bool,

    /// Window length in seconds
    #[arg(long, value_name = "SECONDS")]
    pub chunk: Option<f64>,

    /// Overlap between windows in seconds
    #[arg(long, value_name = "SECONDS")]
    pub stride: Option<f64>,

    /// Drop segments repeated in the overlap between windows
    #[arg(long)]
    pub dedupe: bool,

    /// Write the transcript to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Output format: txt or json (default: from --output extension, else txt)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Do not print segments while transcribing
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,

    /// Print the settings file location
    Path,

    /// Update and save settings
    Set {
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,

        #[arg(long, value_name = "DIR")]
        models_dir: Option<PathBuf>,

        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Weight precision: fp16, fp32, q8 or q4
        #[arg(long, value_name = "DTYPE")]
        dtype: Option<Dtype>,

        #[arg(long, value_name = "SECONDS")]
        chunk: Option<f64>,

        #[arg(long, value_name = "SECONDS")]
        stride: Option<f64>,

        /// Overlap handling: keep or drop-overlapping
        #[arg(long, value_name = "POLICY")]
        overlap: Option<String>,
    },

    /// Restore defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_transcribe_with_options() {
        let cli = Cli::try_parse_from([
            "murmur",
            "transcribe",
            "talk.wav",
            "--model",
            "whisper-base",
            "--chunk",
            "20",
            "--stride",
            "4",
            "--dedupe",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Transcribe(args) => {
                assert_eq!(args.input, PathBuf::from("talk.wav"));
                assert_eq!(args.model.as_deref(), Some("whisper-base"));
                assert_eq!(args.chunk, Some(20.0));
                assert_eq!(args.stride, Some(4.0));
                assert!(args.dedupe);
                assert_eq!(args.output, Some(PathBuf::from("out.json")));
                assert!(args.format.is_none());
            }
            other => panic!("expected transcribe, got {other:?}"),
        }
    }

    #[test]
    fn dtype_flag_accepts_aliases() {
        let cli =
            Cli::try_parse_from(["murmur", "transcribe", "a.wav", "--dtype", "int8"]).unwrap();
        match cli.command {
            Commands::Transcribe(args) => assert_eq!(args.dtype, Some(Dtype::Q8)),
            other => panic!("expected transcribe, got {other:?}"),
        }

        let cli = Cli::try_parse_from(["murmur", "settings", "set", "--dtype", "fp32"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Settings {
                action: Some(SettingsAction::Set {
                    dtype: Some(Dtype::Fp32),
                    ..
                })
            }
        ));

        let err = Cli::try_parse_from(["murmur", "transcribe", "a.wav", "--dtype", "bf16"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn transcribe_requires_input() {
        let err = Cli::try_parse_from(["murmur", "transcribe"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::try_parse_from(["murmur", "models", "-vv", "--settings", "s.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.settings, Some(PathBuf::from("s.json")));
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn settings_without_action_defaults_to_none() {
        let cli = Cli::try_parse_from(["murmur", "settings"]).unwrap();
        assert!(matches!(cli.command, Commands::Settings { action: None }));
    }

    #[test]
    fn invalid_command_returns_error() {
        let err = Cli::try_parse_from(["murmur", "record"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }
}
