//! CLI interface (§4.9 ambient stack: the `clap`-derived entry point).

pub mod commands;
pub mod table;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mediabroker")]
#[command(about = "Batch generative-media task broker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML config file, if any.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mission lifecycle commands.
    #[command(subcommand)]
    Mission(MissionCommands),

    /// Boots the Store, the configured `TaskEngine`s, the Platform Manager, and the
    /// Retry Checker / Scheduler background tasks; blocks until interrupted.
    Serve,
}

#[derive(Subcommand)]
pub enum MissionCommands {
    /// Creates a mission and its batch items.
    Create {
        /// Mission name.
        name: String,

        /// One of `text_to_image`, `image_to_image`, `text_to_video`, `image_to_video`.
        #[arg(long)]
        task_kind: String,

        /// Optional free-form description.
        #[arg(long)]
        description: Option<String>,

        /// Provider model identifier.
        #[arg(long)]
        model_id: Option<String>,

        /// Mission-level parameters shared by every item, as a JSON object.
        #[arg(long, default_value = "{}")]
        fixed_config: String,

        /// Per-item input parameters, as a JSON object. Repeat once per item; the
        /// batch size is the number of times this flag is given.
        #[arg(long = "item", required = true)]
        items: Vec<String>,

        /// RFC3339 timestamp to hold the mission at `scheduled` until due. Omit to
        /// start the mission `queued` immediately.
        #[arg(long)]
        scheduled_time: Option<chrono::DateTime<chrono::Utc>>,

        /// Which configured engine track owns this mission.
        #[arg(long, default_value = "api")]
        track: String,
    },

    /// Lists missions, optionally filtered by status.
    List {
        /// One of `scheduled`, `queued`, `running`, `completed`, `failed`, `cancelled`.
        #[arg(long)]
        status: Option<String>,

        /// 1-indexed page number.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Missions per page.
        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Which configured engine track to list from.
        #[arg(long, default_value = "api")]
        track: String,
    },

    /// Shows a mission and its items.
    Show {
        /// Mission id.
        id: i64,

        /// Which configured engine track the mission belongs to.
        #[arg(long, default_value = "api")]
        track: String,
    },

    /// Cancels a mission and its pending items.
    Cancel {
        /// Mission id.
        id: i64,

        #[arg(long, default_value = "api")]
        track: String,
    },

    /// Re-queues a terminal mission's failed items.
    Retry {
        /// Mission id.
        id: i64,

        #[arg(long, default_value = "api")]
        track: String,
    },

    /// Deletes a mission, cascading to its items.
    Delete {
        /// Mission id.
        id: i64,

        #[arg(long, default_value = "api")]
        track: String,
    },
}
