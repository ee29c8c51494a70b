//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::domain::{Gender, MemberId, Relation};

/// Build genograms from family member records: tree, layout, spouses and relation editing
#[derive(Parser, Debug)]
#[command(name = "genotree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Member document (default: `default_document` setting)
    #[arg(short, long, global = true, env = "GENOTREE_DOCUMENT", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the genogram as a tree
    Tree,

    /// Print node positions as JSON
    Layout {
        /// Canvas width override
        #[arg(short, long)]
        width: Option<f64>,
    },

    /// Print the spouse map
    Spouses,

    /// Report data problems found while building
    Check,

    /// Show member details
    Show {
        /// Member id
        id: MemberId,
    },

    /// Add a new member
    Add {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// male, female or unspecified
        #[arg(short, long, default_value = "unspecified")]
        gender: Gender,

        #[arg(short, long)]
        birth_year: Option<i32>,

        #[arg(short, long, value_hint = ValueHint::Url)]
        photo_url: Option<String>,

        /// Relation to an existing member, e.g. `child:<id>` (repeatable)
        #[arg(short, long)]
        relation: Vec<Relation>,
    },

    /// Relate an existing member to another
    Link {
        /// Member id
        id: MemberId,

        /// `parent:<id>`, `child:<id>`, `spouse:<id>`, `sibling:<id>` or `none`
        relation: Relation,
    },

    /// Clear a member's parents and spouse
    Unlink {
        /// Member id
        id: MemberId,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,
}
