mod build;
mod defmt;
mod qemu;
mod runner;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::build::discover_examples;
use crate::runner::{RunOptions, run_example};

#[derive(Parser)]
#[command(name = "xtask", about = "Build and test tasks for irq-uart")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a testsuite example in QEMU and print its log
    Qemu {
        /// Name of the example to run
        example: String,

        /// Run in release mode
        #[arg(long)]
        release: bool,
    },

    /// Run all testsuite examples in QEMU
    Test {
        /// Only run examples whose name contains this
        filter: Option<String>,

        /// Update expected output files instead of comparing
        #[arg(long)]
        bless: bool,

        /// Run in release mode
        #[arg(long)]
        release: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Qemu { example, release } => {
            let opts = RunOptions {
                verbose: true,
                bless: false,
                release,
            };
            if !run_example(&example, &opts)? {
                bail!("'{example}' failed");
            }
        }

        Commands::Test {
            filter,
            bless,
            release,
        } => {
            let examples: Vec<_> = discover_examples()?
                .into_iter()
                .filter(|e| filter.as_ref().is_none_or(|f| e.contains(f.as_str())))
                .collect();

            if examples.is_empty() {
                bail!("No tests found");
            }

            let opts = RunOptions {
                verbose: false,
                bless,
                release,
            };

            let mut passed = 0;
            let mut failed = 0;

            for example in &examples {
                println!("\n=== Test: {example} ===");
                match run_example(example, &opts) {
                    Ok(true) => passed += 1,
                    Ok(false) => failed += 1,
                    Err(e) => {
                        println!("  ERROR: {e:#}");
                        failed += 1;
                    }
                }
            }

            println!("\n=== Summary ===");
            println!("{passed} passed, {failed} failed");

            if failed > 0 {
                bail!("{failed} test(s) failed");
            }
        }
    }

    Ok(())
}
