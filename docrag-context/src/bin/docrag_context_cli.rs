use clap::Parser;
use docrag_context::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, WindowChunker, WindowConfig, chunk_page};
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to window a text file into overlapping chunks and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Document identifier recorded on every chunk.
    #[arg(short, long, default_value = "stdin")]
    document: String,

    /// Page number recorded on every chunk.
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Window length in characters.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive windows.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let page_text = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let config = WindowConfig::new(args.chunk_size, args.overlap)?;
    let chunker = WindowChunker::new(config);
    let chunks = chunk_page(&chunker, &args.document, args.page, &page_text);

    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
