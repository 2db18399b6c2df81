use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "clinrag",
    version,
    about = "Guideline retrieval and drug-safety verification for the clinical pipeline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk and embed the guideline document, then persist the index snapshot.
    BuildIndex(BuildIndexArgs),
    /// Fetch guideline passages for a clinical query.
    Search(SearchArgs),
    /// Check drug names against the drug-label safety source.
    CheckDrugs(CheckDrugsArgs),
    /// Serve the tool-invocation protocol over HTTP.
    Serve(ServeArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbedderKind {
    LocalHash,
    Openai,
}

impl EmbedderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalHash => "local-hash",
            Self::Openai => "openai",
        }
    }
}

/// Knowledge-base location, chunking and embedding settings.
#[derive(Args, Debug, Clone)]
pub struct KbArgs {
    #[arg(long, env = "CLINRAG_CACHE_ROOT", default_value = ".cache/clinrag")]
    pub cache_root: PathBuf,

    /// Guideline document (PDF or plain text, pages separated by form feeds).
    #[arg(
        long,
        env = "CLINRAG_DOCUMENT",
        default_value = "standard-treatment-guidelines.pdf"
    )]
    pub document: PathBuf,

    /// Defaults to `<cache-root>/kb_index.sqlite`.
    #[arg(long, env = "CLINRAG_SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    #[arg(long, default_value_t = 300)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 50)]
    pub chunk_overlap: usize,

    #[arg(long, value_enum, env = "CLINRAG_EMBEDDER", default_value_t = EmbedderKind::LocalHash)]
    pub embedder: EmbedderKind,

    #[arg(long, env = "CLINRAG_MODEL_ID")]
    pub model_id: Option<String>,

    #[arg(long, env = "CLINRAG_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    #[arg(
        long,
        env = "CLINRAG_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, default_value_t = 30_000)]
    pub embed_timeout_ms: u64,
}

impl KbArgs {
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("kb_index.sqlite"))
    }
}

/// Endpoints of the co-located tool service tried before any local path.
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    #[arg(
        long,
        env = "CLINRAG_KB_TOOL_URL",
        default_value = "http://127.0.0.1:8001/invoke_tool"
    )]
    pub kb_tool_url: String,

    #[arg(
        long,
        env = "CLINRAG_FDA_TOOL_URL",
        default_value = "http://127.0.0.1:8001/invoke_tool"
    )]
    pub fda_tool_url: String,

    #[arg(long, default_value_t = 10_000)]
    pub kb_timeout_ms: u64,

    #[arg(long, default_value_t = 8_000)]
    pub fda_timeout_ms: u64,

    /// Skip the tool service and go straight to the local/public path.
    #[arg(long, default_value_t = false)]
    pub no_remote: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OpenFdaArgs {
    #[arg(
        long,
        env = "CLINRAG_OPENFDA_BASE",
        default_value = "https://api.fda.gov/drug/label.json"
    )]
    pub openfda_base_url: String,

    #[arg(long, default_value_t = 10_000)]
    pub openfda_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct BuildIndexArgs {
    #[command(flatten)]
    pub kb: KbArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub kb: KbArgs,

    #[command(flatten)]
    pub tools: ToolArgs,

    #[arg(long)]
    pub query: String,

    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    /// Query the local index directly and print ranked hits with distances.
    #[arg(long, default_value_t = false)]
    pub local_hits: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckDrugsArgs {
    #[command(flatten)]
    pub tools: ToolArgs,

    #[command(flatten)]
    pub openfda: OpenFdaArgs,

    /// Drug names; comma-separated lists are split.
    #[arg(required = true)]
    pub names: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub kb: KbArgs,

    #[command(flatten)]
    pub openfda: OpenFdaArgs,

    /// Both tool URLs of `search` and `check-drugs` default to this address.
    #[arg(long, env = "CLINRAG_BIND", default_value = "127.0.0.1:8001")]
    pub bind: String,

    /// Load or build the index before accepting requests.
    #[arg(long, default_value_t = false)]
    pub warm: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub kb: KbArgs,
}
