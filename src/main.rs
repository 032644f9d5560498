use std::path::PathBuf;

use anyhow::{Context, Result};
use cbef_reader::{
    DEFAULT_MAX_CHUNK_SIZE, DecryptOptions, KeyMap, ReaderOptions, decrypt_file,
    default_decrypt_output_path, read_header_from_file,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cbef",
    version,
    about = "Decrypt and inspect CBEF encrypted files"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decrypt a file (decompressing it if the header says so)
    Dec(DecArgs),
    /// Print the header of an encrypted file
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct DecArgs {
    /// Input file (encrypted)
    #[arg(short = 'i', long = "in")]
    input: PathBuf,

    /// Output file (plaintext). If omitted, ".cbef" is stripped or ".dec" is appended.
    #[arg(short = 'o', long = "out")]
    output: Option<PathBuf>,

    /// Key file: one `<key-id> <hex key>` per line
    #[arg(short = 'k', long = "keys")]
    keys: PathBuf,

    /// Overwrite the output file if it already exists.
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// Reject chunks whose declared size exceeds this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: u32,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Encrypted file
    file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let cli = Cli::parse();
    match cli.cmd {
        Command::Dec(a) => cmd_dec(a),
        Command::Inspect(a) => cmd_inspect(a),
    }
}

fn cmd_dec(a: DecArgs) -> Result<()> {
    let keys = KeyMap::load(&a.keys)
        .with_context(|| format!("failed to load key file {}", a.keys.display()))?;

    let target = a
        .output
        .clone()
        .unwrap_or_else(|| default_decrypt_output_path(&a.input));
    if target.exists() && !a.force {
        anyhow::bail!("output exists; use --force to overwrite");
    }

    let opts = DecryptOptions {
        force: a.force,
        reader: ReaderOptions::default().with_max_chunk_size(a.max_chunk_size),
    };
    let out = decrypt_file(&a.input, Some(&target), &keys, &opts)
        .with_context(|| "decryption failed")?;

    eprintln!("Wrote {}", out.display());
    Ok(())
}

fn cmd_inspect(a: InspectArgs) -> Result<()> {
    let header = read_header_from_file(&a.file)
        .with_context(|| format!("failed to read header of {}", a.file.display()))?;

    println!("version:     {}", header.version());
    println!("compression: {}", header.compression());
    println!("kdf:         {}", header.kdf());
    println!("key id:      {}", String::from_utf8_lossy(header.key_id()));
    println!("salt:        {}", hex::encode(header.salt()));
    Ok(())
}
