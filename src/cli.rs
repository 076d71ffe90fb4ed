//! The clap cli interface defined via the clap crate and its tooling.

use clap::Parser;

/// An optimizing interpreter for the eight-token imperative language whose
/// tokens are `> < + - . , [ ]`.
#[derive(Parser, Debug, PartialEq, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the program source; reads stdin if omitted
    pub file_path: Option<String>,

    /// Sets the size of cells in bits (8, 16 or 32)
    #[arg(long, default_value_t = 8)]
    pub cell_size: u32,

    /// Treats cells as signed rather than unsigned integers
    #[arg(long, default_value_t = false)]
    pub signed: bool,

    /// Sets the number of cells on the tape
    #[arg(long, default_value_t = 65_536)]
    pub tape_size: usize,

    /// Limits each VM re-entry slice to this many instructions
    #[arg(long)]
    pub budget: Option<u64>,

    /// Print the IR in human-readable form and exit without running
    #[arg(long, default_value_t = false)]
    pub ir: bool,

    /// Print the IR as JSON and exit without running
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Print a metrics line (token/op counts, byte sizes) after running
    #[arg(long, default_value_t = false)]
    pub metrics: bool,
}
