//! Capstan CLI entry point.

use std::io::Read;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capstan")]
#[command(about = "Capstan capability machine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a program
    Run {
        /// Input program file (or - for stdin)
        file: String,

        /// Skip validation before executing
        #[arg(long)]
        no_validate: bool,
    },

    /// Validate a program without executing it
    Check {
        /// Input program file(s) (or - for stdin)
        #[arg(required = true)]
        files: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("capstan=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, no_validate } => {
            let program = load_program(&file)?;

            if !no_validate {
                capstan_ir::validate(&program)?;
            }

            info!(source = %file, "executing");
            let result = capstan_runtime::evaluate(&program)?;
            println!("{}", result);
        }

        Commands::Check { files } => {
            for file in files {
                let program = load_program(&file)?;
                capstan_ir::validate(&program)?;
                println!(
                    "{}: ok ({} procedures)",
                    file,
                    program.procedures.len()
                );
            }
        }
    }

    Ok(())
}

fn load_program(file: &str) -> Result<capstan_ir::Program, Box<dyn std::error::Error>> {
    let input = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    Ok(serde_json::from_str(&input)?)
}
