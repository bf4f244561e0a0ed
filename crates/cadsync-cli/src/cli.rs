use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CadSync - CAD-to-database synchronization
#[derive(Parser, Debug)]
#[command(name = "cadsync")]
#[command(about = "Synchronize CAD drawings with canonical spatial records", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show what would happen without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Storage backend to use (memory or postgres)
    #[arg(long, global = true, default_value = "memory")]
    pub storage: StorageBackend,

    /// Snapshot file backing the memory store between runs
    #[arg(long, global = true, default_value = ".cadsync/state.json")]
    pub state: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Confidence at or above which an entity becomes a typed object
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Decimal places kept when hashing coordinates
    #[arg(long, global = true)]
    pub hash_precision: Option<u32>,

    /// Maximum round-trip error accepted by coordinate transforms
    #[arg(long, global = true)]
    pub transform_tolerance: Option<f64>,

    /// Layer used for objects without a derivable layer on export
    #[arg(long, global = true)]
    pub default_layer: Option<String>,

    /// Round-trip every imported geometry through this SRID
    #[arg(long, global = true)]
    pub verify_srid: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StorageBackend {
    /// JSON snapshot on disk, loaded into memory per run
    Memory,
    /// PostgreSQL/PostGIS persistent storage
    Postgres,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a drawing into a project
    Import(ImportArgs),

    /// Reimport a drawing and reconcile it with the stored records
    Reimport(ReimportArgs),

    /// Export a project's objects as a DXF drawing
    Export(ExportArgs),

    /// Classify a layer name with a project's rules
    Classify(ClassifyArgs),

    /// List generic objects awaiting review
    Queue(QueueArgs),

    /// Approve or ignore a generic object
    Review(ReviewArgs),

    /// Promote a generic object to a typed one
    Reclassify(ReclassifyArgs),

    /// Load projects and layer pattern rules from a JSON file
    Seed(SeedArgs),

    /// Show the resolved configuration and where each value came from
    Config,

    /// Manage database operations
    Db(DbArgs),
}

impl Commands {
    /// Whether the command writes to the store
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Import(_)
                | Commands::Reimport(_)
                | Commands::Review(_)
                | Commands::Reclassify(_)
                | Commands::Seed(_)
        )
    }
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Project id
    pub project: String,

    /// Drawing file (.dxf or .json)
    pub file: PathBuf,

    /// Stable drawing identifier recorded on every link
    #[arg(long)]
    pub drawing_id: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ReimportArgs {
    /// Project id
    pub project: String,

    /// Drawing file (.dxf or .json)
    pub file: PathBuf,

    /// Stable drawing identifier recorded on every link
    #[arg(long)]
    pub drawing_id: Option<String>,

    /// Links considered for deletion
    #[arg(long, default_value = "project")]
    pub scope: ScopeArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    /// Every active link in the project
    Project,
    /// Only links recorded for --drawing-id
    Drawing,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Project id
    pub project: String,

    /// Output DXF path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Client layer template, e.g. "{type}-{attributes}-{phase}"
    #[arg(long)]
    pub template: Option<String>,

    /// Reproject output coordinates to this SRID
    #[arg(long)]
    pub target_srid: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Project id
    pub project: String,

    /// Layer names to classify
    #[arg(required = true)]
    pub layers: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct QueueArgs {
    /// Project id
    pub project: String,
}

#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Project id
    pub project: String,

    /// Generic object id
    pub object: String,

    /// Review decision
    #[arg(long)]
    pub decision: DecisionArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DecisionArg {
    Approve,
    Ignore,
}

#[derive(Parser, Debug)]
pub struct ReclassifyArgs {
    /// Project id
    pub project: String,

    /// Generic object id
    pub object: String,

    /// Layer name the object should have had
    pub layer: String,
}

#[derive(Parser, Debug)]
pub struct SeedArgs {
    /// JSON file with "projects" and "pattern_rules" arrays
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DbArgs {
    /// Database management command
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Apply pending migrations
    Migrate,

    /// Show applied and pending migrations
    Status,
}
