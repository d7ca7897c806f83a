use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;

use lotledger_core::VERSION;

/// Lotledger - inventory lot ledger with FIFO picking and an append-only log
#[derive(Parser)]
#[command(name = "lotledger")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the ledger database
    #[arg(short, long, global = true, env = "LOTLEDGER_PATH")]
    pub db: Option<String>,

    /// Who performs the operation (recorded in every ledger entry)
    #[arg(short, long, global = true, env = "LOTLEDGER_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the ledger database will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,

    /// Config path override
    #[arg(long)]
    pub config_path: Option<String>,
}

/// Arguments for the `stock` command
#[derive(Args)]
pub struct StockArgs {
    /// Item (part number)
    #[arg(value_name = "ITEM")]
    pub item: String,

    /// Quantity received
    #[arg(value_name = "QUANTITY")]
    pub quantity: i64,

    /// Storage location
    #[arg(short, long)]
    pub location: String,

    /// Add to an existing lot instead of creating one
    #[arg(long, value_name = "LOT_ID")]
    pub lot: Option<i64>,

    /// Manufacturer part number (new lots only)
    #[arg(long)]
    pub mpn: Option<String>,

    /// Manufacturer date code (new lots only)
    #[arg(long)]
    pub date_code: Option<String>,

    /// Moisture-sensitivity level (new lots only)
    #[arg(long)]
    pub msl: Option<String>,

    /// Work order reference
    #[arg(short, long)]
    pub work_order: Option<String>,
}

/// Arguments for the `pick` command
#[derive(Args)]
pub struct PickArgs {
    /// Item (part number)
    #[arg(value_name = "ITEM")]
    pub item: String,

    /// Quantity to stage
    #[arg(value_name = "QUANTITY")]
    pub quantity: i64,

    /// Pick from this lot only (FIFO across all lots otherwise)
    #[arg(long, value_name = "LOT_ID")]
    pub lot: Option<i64>,

    /// Where the staged stock goes
    #[arg(long)]
    pub destination: Option<String>,

    /// Work order reference
    #[arg(short, long)]
    pub work_order: Option<String>,
}

/// Arguments for the `restock` command
#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["lot", "item"])))]
pub struct RestockArgs {
    /// Quantity to return
    #[arg(value_name = "QUANTITY")]
    pub quantity: i64,

    /// Return to this lot
    #[arg(long, value_name = "LOT_ID")]
    pub lot: Option<i64>,

    /// Return to the oldest lot of this item with enough staged
    #[arg(long)]
    pub item: Option<String>,

    /// New storage location
    #[arg(short, long)]
    pub location: Option<String>,

    /// Work order reference
    #[arg(short, long)]
    pub work_order: Option<String>,
}

/// Arguments for the `adjust` command
#[derive(Args)]
pub struct AdjustArgs {
    /// Lot to correct
    #[arg(value_name = "LOT_ID")]
    pub lot: i64,

    /// Signed on-hand correction (e.g. -3)
    #[arg(value_name = "DELTA", allow_negative_numbers = true)]
    pub delta: i64,

    /// Work order or count reference
    #[arg(short, long)]
    pub work_order: Option<String>,
}

/// Arguments for the `lots` command
#[derive(Args)]
pub struct LotsArgs {
    /// Only lots of this item
    #[arg(value_name = "ITEM")]
    pub item: Option<String>,
}

/// Arguments for the `history` command
#[derive(Args)]
pub struct HistoryArgs {
    /// Filter by lot
    #[arg(long, value_name = "LOT_ID")]
    pub lot: Option<i64>,

    /// Filter by item
    #[arg(long)]
    pub item: Option<String>,

    /// Filter by kind (stock, pick, restock, adjust)
    #[arg(long)]
    pub kind: Option<String>,

    /// Filter by work order
    #[arg(short, long)]
    pub work_order: Option<String>,

    /// Filter by operation id
    #[arg(long, value_name = "UUID")]
    pub operation: Option<String>,

    /// Limit number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Most recent entries first
    #[arg(long)]
    pub newest_first: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ledger database and config file
    Init(InitArgs),

    /// Receive stock into a new or existing lot
    Stock(StockArgs),

    /// Move stock from on-hand to staged
    Pick(PickArgs),

    /// Return staged stock to on-hand
    Restock(RestockArgs),

    /// Correct a lot's on-hand quantity after a count
    Adjust(AdjustArgs),

    /// Show one lot
    Lot {
        /// Lot identifier
        #[arg(value_name = "LOT_ID")]
        lot_id: i64,
    },

    /// List lots
    Lots(LotsArgs),

    /// Show ledger entries
    History(HistoryArgs),

    /// Check database integrity and reconcile the log
    Check,

    /// Backup the ledger
    Backup {
        /// Destination path
        #[arg(value_name = "DEST")]
        destination: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}
