use clap::{Parser as CliParser, Subcommand};
use std::fs;
use std::path::PathBuf;

use tablewire::{schema_to_json, Parser, WireError};

#[derive(CliParser)]
#[command(name = "tablewire-cli")]
#[command(about = "Compile tablewire schemas and JSON payloads into binary buffers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema file, encoding its JSON root object if present
    Compile {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to the input name with a `.bin` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a schema file and print its registries as JSON
    Describe {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<(), WireError> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Compile { input, output } => {
            let text = fs::read_to_string(input).map_err(WireError::Io)?;
            let mut parser = Parser::new();
            parser.parse(&text)?;
            let out_path = if let Some(output) = output {
                output.clone()
            } else {
                let mut path = input.clone();
                path.set_extension("bin");
                path
            };
            fs::write(&out_path, parser.buffer()).map_err(WireError::Io)?;
            println!("Compiled {} → {}", input.display(), out_path.display());
            Ok(())
        }

        Commands::Describe { input } => {
            let text = fs::read_to_string(input).map_err(WireError::Io)?;
            let mut parser = Parser::new();
            parser.parse(&text)?;
            println!("{}", schema_to_json(&parser));
            Ok(())
        }
    }
}
