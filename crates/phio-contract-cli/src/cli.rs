use clap::{Parser, Subcommand, ValueEnum};
use phio_contract::ComplianceLevel;

#[derive(Parser)]
#[command(
    name = "phio-contract",
    about = "Phi⊗O contract probe: CLI, zone and formula contract validation for scoring instruments",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe an instrument and write its contract report
    Probe {
        /// Path to the instrument program
        #[arg(long)]
        instrument: String,

        /// Output JSON report path (parent directories are created)
        #[arg(long)]
        out: String,

        /// Also run one deterministic score to verify the output schema
        #[arg(long)]
        check_formula: bool,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        zones: ZoneArgs,

        /// Exit 1 when the global compliance level is below this
        #[arg(long, value_enum)]
        require: Option<RequireLevelArg>,

        /// Print the report JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Extract only the zone contract of an instrument
    Zones {
        /// Path to the instrument program
        #[arg(long)]
        instrument: String,

        /// Optional TOML probe config
        #[arg(long)]
        config: Option<String>,

        #[command(flatten)]
        zones: ZoneArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the content hash of a file
    Hash {
        /// File to hash
        path: String,
    },
}

/// How the target is run.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Optional TOML probe config; flags override its values
    #[arg(long)]
    pub config: Option<String>,

    /// Interpreter used to run the instrument (default: python3)
    #[arg(long, conflicts_with = "direct")]
    pub interpreter: Option<String>,

    /// Execute the instrument directly, without an interpreter
    #[arg(long)]
    pub direct: bool,

    /// Bound on every instrument invocation, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Require and request only the ASCII `--agg_tau` spelling
    #[arg(long)]
    pub ascii_tau: bool,
}

/// Zone extraction strategy selection.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ZoneArgs {
    /// External zone extractor program; the instrument path is appended
    #[arg(long)]
    pub zone_extractor: Option<String>,

    /// Extra leading argument for the zone extractor (repeatable)
    #[arg(long = "zone-extractor-arg", requires = "zone_extractor")]
    pub zone_extractor_args: Vec<String>,

    /// Disable the built-in syntax-tree zone strategy
    #[arg(long)]
    pub no_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RequireLevelArg {
    Full,
    Partial,
    Minimal,
}

impl From<RequireLevelArg> for ComplianceLevel {
    fn from(level: RequireLevelArg) -> Self {
        match level {
            RequireLevelArg::Full => Self::Full,
            RequireLevelArg::Partial => Self::Partial,
            RequireLevelArg::Minimal => Self::Minimal,
        }
    }
}
