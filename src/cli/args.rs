//! CLI argument definitions
//!
//! All Clap derive structs for `akashic` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Scripted terminal breach theatre that ends in a real web search.
#[derive(Parser, Debug)]
#[command(name = "akashic", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "AKASHIC_COLOR")]
    pub color: ColorChoice,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play the sequence in the terminal.
    Run(RunArgs),

    /// Validate sequence files without playing them.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Run / Validate
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a YAML sequence file (defaults to the built-in narrative).
    #[arg(short, long, env = "AKASHIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Submit this query instead of reading one from stdin.
    #[arg(long)]
    pub query: Option<String>,

    /// Use the gated two-segment processing log.
    #[arg(long)]
    pub gated: bool,

    /// Perform the manual override as soon as the gate is raised.
    #[arg(long)]
    pub auto_override: bool,

    /// Multiply every delay by this factor (e.g. 0.01 for a fast demo).
    #[arg(long, value_name = "FACTOR")]
    pub pace: Option<f64>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Stream cosmetic background noise while the sequence plays.
    #[arg(long)]
    pub noise: bool,

    /// Open the final URL with the platform browser launcher.
    #[arg(long)]
    pub open: bool,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Sequence files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON lines.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn run_defaults() {
        let args = run_args(&["akashic", "run"]);
        assert!(args.query.is_none());
        assert!(!args.gated);
        assert!(!args.auto_override);
        assert!(args.pace.is_none());
        assert_eq!(args.format, OutputFormat::Human);
    }

    #[test]
    fn run_with_everything() {
        let args = run_args(&[
            "akashic",
            "run",
            "--config",
            "seq.yaml",
            "--query",
            "truth",
            "--gated",
            "--auto-override",
            "--pace",
            "0.01",
            "--format",
            "json",
            "--noise",
            "--open",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("seq.yaml")));
        assert_eq!(args.query.as_deref(), Some("truth"));
        assert!(args.gated && args.auto_override && args.noise && args.open);
        assert_eq!(args.pace, Some(0.01));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn bad_pace_is_rejected() {
        assert!(Cli::try_parse_from(["akashic", "run", "--pace", "fast"]).is_err());
    }

    #[test]
    fn validate_requires_files() {
        assert!(Cli::try_parse_from(["akashic", "validate"]).is_err());
        assert!(Cli::try_parse_from(["akashic", "validate", "a.yaml", "b.yaml"]).is_ok());
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["akashic", "-vvv", "version"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn color_choices_parse() {
        for variant in ["auto", "always", "never"] {
            let cli = Cli::try_parse_from(["akashic", "--color", variant, "version"]);
            assert!(cli.is_ok(), "failed to parse color={variant}");
        }
    }

    #[test]
    fn version_flag() {
        let err = Cli::try_parse_from(["akashic", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
