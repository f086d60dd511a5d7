// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod regmap_gen;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Xtask {
    /// Log every merge decision, accepted pair and rollback.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    xtask: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge, normalize and cluster register maps loaded from JSON.
    Regmap {
        /// Register map of the primary core (or the only core).
        #[arg(long, value_name = "FILE")]
        core1: PathBuf,

        /// Register map of the secondary core of a dual-core device.
        #[arg(long, value_name = "FILE")]
        core2: Option<PathBuf>,

        /// TOML policy file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Prefix for primary-core-only resources, e.g. CM7.
        #[arg(long, requires = "secondary")]
        primary: Option<String>,

        /// Prefix for secondary-core-only resources, e.g. CM4.
        #[arg(long, requires = "primary")]
        secondary: Option<String>,

        /// Drop peripheral-name words from register names.
        #[arg(long)]
        strip_register_prefixes: bool,

        /// Where to write the annotated map; printed when absent.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Xtask::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    let result = match cli.xtask {
        Commands::Regmap {
            core1,
            core2,
            config,
            primary,
            secondary,
            strip_register_prefixes,
            output,
        } => regmap_gen::generate(&regmap_gen::Options {
            core1,
            core2,
            config,
            cores: primary.zip(secondary),
            strip_register_prefixes,
            output,
        }),
    };
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
