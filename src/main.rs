use clap::{Parser, Subcommand, ValueEnum};
use ipalink::{
    resolve, FileKind, GithubStore, IpaLinkError, IsGd, LinkShortener, MemoryStore, NoShortener,
    Publisher, PublisherConfig, Result,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ipalink")]
#[command(about = "Host an .ipa with an over-the-air install manifest and get an install link")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON publisher config (defaults to GITHUB_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the metadata resolved from an .ipa
    Inspect {
        /// The .ipa to read
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the install manifest for an .ipa hosted at a given URL
    Manifest {
        /// The .ipa to read metadata from
        input: PathBuf,

        /// Public URL the .ipa is served from
        #[arg(short, long)]
        url: String,

        /// Output path (stdout if unspecified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing files without confirming
        #[arg(long)]
        overwrite: bool,
    },

    /// Upload an .ipa and its manifest, print the install link
    Publish {
        /// The .ipa to publish
        input: PathBuf,

        /// Keep the full itms-services link
        #[arg(long)]
        no_shorten: bool,

        /// Resolve and build everything but upload nowhere
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List recently published files
    List {
        kind: Kind,

        /// How many to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Delete a published file
    Delete {
        kind: Kind,

        /// File name inside its folder, e.g. a1b2c3.ipa
        name: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Kind {
    Ipa,
    Plist,
}

impl From<Kind> for FileKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Ipa => FileKind::Ipa,
            Kind::Plist => FileKind::Plist,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("[!] {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "ipalink=info",
        _ => "ipalink=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect { input, json } => run_inspect(&input, json),
        Commands::Manifest {
            input,
            url,
            output,
            overwrite,
        } => run_manifest(&input, &url, output, overwrite),
        Commands::Publish {
            input,
            no_shorten,
            dry_run,
            json,
        } => run_publish(&input, cli.config.as_deref(), no_shorten, dry_run, json),
        Commands::List { kind, limit } => run_list(cli.config.as_deref(), kind, limit),
        Commands::Delete { kind, name } => run_delete(cli.config.as_deref(), kind, &name),
    }
}

fn load_config(path: Option<&Path>) -> Result<PublisherConfig> {
    match path {
        Some(p) => PublisherConfig::from_file(p),
        None => PublisherConfig::from_env(),
    }
}

/// Read an .ipa, returning its bytes and the file name to fall back on.
fn read_ipa(input: &Path) -> Result<(Vec<u8>, String)> {
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());

    if !matches!(ext.as_deref(), Some("ipa") | Some("tipa")) {
        return Err(IpaLinkError::InvalidInput(
            "Input must be an .ipa or .tipa".to_string(),
        ));
    }
    if !input.is_file() {
        return Err(IpaLinkError::FileNotFound(input.to_path_buf()));
    }

    let bytes = fs::read(input)?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((bytes, name))
}

fn run_inspect(input: &Path, json: bool) -> Result<()> {
    let (bytes, name) = read_ipa(input)?;
    let metadata = resolve(&bytes, &name);

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        println!("[*] name: {}", metadata.app_name);
        println!("[*] bundle id: {}", metadata.bundle_id);
        println!("[*] version: {}", metadata.version);
        match &metadata.team_id {
            Some(id) => println!("[*] team: {} ({})", metadata.team_name, id),
            None => println!("[*] team: {}", metadata.team_name),
        }
    }
    Ok(())
}

fn run_manifest(input: &Path, url: &str, output: Option<PathBuf>, overwrite: bool) -> Result<()> {
    let (bytes, name) = read_ipa(input)?;
    let metadata = resolve(&bytes, &name);
    let document = ipalink::generate(url, &metadata)?;

    let Some(output) = output else {
        std::io::stdout().write_all(&document)?;
        return Ok(());
    };

    if output.exists() && !overwrite && !confirm(&format!("{} already exists. overwrite?", output.display()))? {
        println!("[>] quitting.");
        return Ok(());
    }

    fs::write(&output, &document)?;
    println!("[*] wrote manifest for {} to {}", metadata.app_name, output.display());
    Ok(())
}

fn run_publish(
    input: &Path,
    config: Option<&Path>,
    no_shorten: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let (bytes, name) = read_ipa(input)?;

    let shortener: Box<dyn LinkShortener> = if no_shorten || dry_run {
        Box::new(NoShortener)
    } else {
        Box::new(IsGd::new(Duration::from_secs(10)))
    };

    let published = if dry_run {
        let store = MemoryStore::new("https://dry-run.invalid");
        Publisher::new(&store, shortener.as_ref()).publish(&bytes, &name)?
    } else {
        let config = load_config(config)?;
        let shortener: Box<dyn LinkShortener> = if config.shorten_links {
            shortener
        } else {
            Box::new(NoShortener)
        };
        let store = GithubStore::new(config.clone())?;

        println!(
            "[*] uploading {} (~{}s)...",
            name,
            ipalink::publish::estimate_seconds(bytes.len() as u64)
        );
        Publisher::new(&store, shortener.as_ref())
            .folders(&config.ipa_dir, &config.plist_dir)
            .publish(&bytes, &name)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&published)?);
    } else {
        println!("[*] done");
        println!("{}", published);
    }
    Ok(())
}

fn run_list(config: Option<&Path>, kind: Kind, limit: usize) -> Result<()> {
    let config = load_config(config)?;
    let store = GithubStore::new(config.clone())?;
    let publisher = Publisher::new(&store, &NoShortener).folders(&config.ipa_dir, &config.plist_dir);

    let files = publisher.recent(kind.into(), limit)?;
    if files.is_empty() {
        println!("[*] no .{} files", FileKind::from(kind).extension());
        return Ok(());
    }
    for file in files {
        println!("{}\t{}\t{}", file.name, file.size, config.public_url(&file.path));
    }
    Ok(())
}

fn run_delete(config: Option<&Path>, kind: Kind, name: &str) -> Result<()> {
    let config = load_config(config)?;
    let store = GithubStore::new(config.clone())?;
    let publisher = Publisher::new(&store, &NoShortener).folders(&config.ipa_dir, &config.plist_dir);

    if publisher.remove(kind.into(), name)? {
        println!("[*] deleted {}", name);
    } else {
        println!("[?] {} not found", name);
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("[<] {} [Y/n] ", question);
    std::io::stdout().flush()?;

    let mut response = String::new();
    std::io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();

    Ok(matches!(response.as_str(), "y" | "yes" | ""))
}
