//! SovereignIdentity CLI: the `sid` command.
//!
//! Generates identities, writes signed public exports, verifies exports
//! and looks identities up by key attributes. Identities are plain JSON
//! files; the library does all validation and signature checking.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use sovereign_identity::identity::Name;
use sovereign_identity::{
    AddressBook, Identity, IdentityConfig, IndexSpec, KeyFilter, Network,
};

// ── File helpers ──────────────────────────────────────────────────────────────

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn write_json(value: &Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize identity")?;
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn load_config(config: Option<&Path>, lenient: bool) -> Result<IdentityConfig> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            IdentityConfig::from_json_str(&text)?
        }
        None => IdentityConfig::default(),
    };
    Ok(if lenient { config.lenient(true) } else { config })
}

fn load_identity(path: &Path, config: IdentityConfig) -> Result<Identity> {
    let json = read_json(path)?;
    let identity = Identity::from_json_with(&json, config)
        .with_context(|| format!("failed to load identity from {}", path.display()))?;
    log::debug!("loaded {} ({} keys)", path.display(), identity.all_keys().len());
    Ok(identity)
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// SovereignIdentity CLI: generate, export, verify and index
/// self-sovereign identities.
#[derive(Parser, Debug)]
#[command(
    name = "sid",
    about = "SovereignIdentity CLI",
    version,
    long_about = "sid: SovereignIdentity CLI\n\nGenerate multi-key identities, export them with proofs of key\npossession, verify signed exports, and look identities up by key."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new identity with the default key set (private keys included)
    Generate {
        /// Formatted name for the identity
        #[arg(long)]
        name: Option<String>,

        /// Bitcoin network for the payment and messaging keys (bitcoin, testnet)
        #[arg(long, default_value = "bitcoin")]
        network: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Export the public identity with a signature from every key
    Export {
        /// Private identity file
        #[arg(long)]
        input: PathBuf,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Load an identity, verifying any embedded signatures
    Verify {
        /// Identity file
        #[arg(long)]
        input: PathBuf,

        /// JSON configuration with required keys
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip keys of unrecognized type instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Display the keys of an identity
    Show {
        /// Identity file
        #[arg(long)]
        input: PathBuf,
    },

    /// Find which of several identities holds a key attribute value
    Lookup {
        /// Key attribute to index (pub, fingerprint, label, networkName, ...)
        #[arg(long, default_value = "pub")]
        index: String,

        /// Value to look up
        #[arg(long)]
        value: String,

        /// Identity files to index
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::Generate {
            name,
            network,
            output,
        } => cmd_generate(name, &network, output.as_deref(), verbose),
        Commands::Export { input, output } => cmd_export(&input, output.as_deref(), verbose),
        Commands::Verify {
            input,
            config,
            lenient,
        } => cmd_verify(&input, config.as_deref(), lenient, verbose),
        Commands::Show { input } => cmd_show(&input, verbose),
        Commands::Lookup {
            index,
            value,
            inputs,
        } => cmd_lookup(&index, &value, &inputs, verbose),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `sid generate [--name NAME] [--network NET] [--output FILE]`
fn cmd_generate(
    name: Option<String>,
    network: &str,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let network: Network = network.parse()?;
    let mut identity = Identity::generate(network).context("failed to generate keys")?;
    if let Some(name) = name {
        identity.set_name(Name::formatted(&name));
    }

    let json = identity.to_json(true)?;
    write_json(&json, output)?;

    if let Some(path) = output {
        eprintln!("Created identity {}", path.display());
        if verbose {
            eprintln!("  Hash: {}", identity.hash()?);
            eprintln!("  Keys: {}", identity.all_keys().len());
        }
    }
    Ok(())
}

/// `sid export --input FILE [--output FILE]`
fn cmd_export(input: &Path, output: Option<&Path>, verbose: bool) -> Result<()> {
    let identity = load_identity(input, IdentityConfig::default())?;
    let signed = identity
        .export_signed()
        .context("export requires the private key of every key")?;
    write_json(&signed, output)?;

    if verbose {
        eprintln!("Signed with {} keys", identity.all_keys().len());
    }
    Ok(())
}

/// `sid verify --input FILE [--config FILE] [--lenient]`
fn cmd_verify(input: &Path, config: Option<&Path>, lenient: bool, verbose: bool) -> Result<()> {
    let config = load_config(config, lenient)?;
    let identity = load_identity(input, config)?;

    println!("OK {}", identity.hash()?);
    if verbose {
        println!("  {identity}");
    }
    Ok(())
}

/// `sid show --input FILE`
fn cmd_show(input: &Path, verbose: bool) -> Result<()> {
    let identity = load_identity(input, IdentityConfig::permissive())?;

    println!("Identity: {identity}");
    if let Some(summary) = identity.summary() {
        println!("  Summary: {summary}");
    }
    println!();
    println!("  {:<8} {:<10} FINGERPRINT", "TYPE", "PURPOSE");
    for key in identity.keys(KeyFilter::All) {
        let secret = if key.has_private() { " (private)" } else { "" };
        println!(
            "  {:<8} {:<10} {}{secret}",
            key.key_type().as_str(),
            key.purpose().as_str(),
            key.fingerprint()
        );
        if verbose {
            println!("           value: {}", key.value());
        }
    }
    Ok(())
}

/// `sid lookup [--index NAME] --value VALUE FILE...`
fn cmd_lookup(index: &str, value: &str, inputs: &[PathBuf], verbose: bool) -> Result<()> {
    let identities = inputs
        .iter()
        .map(|path| load_identity(path, IdentityConfig::permissive()))
        .collect::<Result<Vec<_>>>()?;

    let mut book = AddressBook::new();
    if !book.has_index(index) {
        book.add_index(IndexSpec::non_unique(index))?;
    }
    for (identity, path) in identities.iter().zip(inputs) {
        book.add(identity, false)
            .with_context(|| format!("cannot index {}", path.display()))?;
    }
    if verbose {
        eprintln!("Indexed {} keys from {} files", book.size(), inputs.len());
    }

    let matches = book.lookup_all(index, value)?;
    if matches.is_empty() {
        return Err(anyhow!("no identity has {index} = {value}"));
    }
    for entry in matches {
        let position = identities
            .iter()
            .position(|i| std::ptr::eq(i, entry.identity))
            .ok_or_else(|| anyhow!("address book returned an unknown identity"))?;
        println!(
            "{} {} {}",
            inputs[position].display(),
            entry.key.key_type().as_str(),
            entry.key.fingerprint()
        );
    }
    Ok(())
}
