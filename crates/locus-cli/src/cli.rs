use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "locus",
    about = "Locus: inspect normalized content, translation memories, tasks and job artifacts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DecoderArg {
    /// `<b>`, `</b>`, `<br/>`
    Xml,
    /// `{name}`, `{{name}}`
    Brace,
    /// `%s`, `%1$d`
    Printf,
    /// Literal newlines
    Newline,
    /// `&lt;` and friends
    Entities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FlattenFormat {
    Linear,
    Xml,
    Ordinal,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the guid of a segment
    Guid {
        /// Raw source string
        text: String,

        /// Resource id
        #[arg(long)]
        rid: String,

        /// Segment id
        #[arg(long)]
        sid: String,

        /// Decoder to apply (repeatable; default: all)
        #[arg(long = "decoder", value_enum)]
        decoders: Vec<DecoderArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize a string and print one of its flattened forms
    Flatten {
        /// Raw source string
        text: String,

        #[arg(long, value_enum, default_value = "linear")]
        format: FlattenFormat,

        /// Decoder to apply (repeatable; default: all)
        #[arg(long = "decoder", value_enum)]
        decoders: Vec<DecoderArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Translation memory snapshots
    Tm {
        #[command(subcommand)]
        command: TmCommands,
    },

    /// Persisted scheduler tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Job artifacts
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TmCommands {
    /// Summarize a TM snapshot
    Stats {
        /// Path to the TM snapshot JSONL
        #[arg(long)]
        snapshot: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up entries by guid, or exact matches by source text
    Lookup {
        /// Path to the TM snapshot JSONL
        #[arg(long)]
        snapshot: String,

        /// TU guid
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        guid: Option<String>,

        /// Raw source text for an exact-match lookup
        #[arg(long)]
        text: Option<String>,

        /// Decoder applied to --text (repeatable; default: all)
        #[arg(long = "decoder", value_enum)]
        decoders: Vec<DecoderArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Show the ops of a persisted task
    Show {
        /// Task id
        task_id: String,

        /// Directory of the JSONL task store
        #[arg(long, default_value = ".locus/tasks")]
        store: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum JobsCommands {
    /// List jobs for a language pair
    List {
        /// Source language
        #[arg(long)]
        source: String,

        /// Target language
        #[arg(long)]
        target: String,

        /// Job store root
        #[arg(long, default_value = ".locus/jobs")]
        root: String,

        /// Only jobs whose latest response is pending
        #[arg(long)]
        pending: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Path to locus.toml (defaults apply when omitted)
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}
