use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use stac_curator::catalog::generate_stac_metadata;
use stac_curator::config::{CatalogType, GenerationConfig};
use stac_curator::dataset::{DatasetRecord, StacDataset};
use stac_curator::extensions::{parse_mapping_entry, ExtensionMap, ExtensionNames};
use stac_curator::scanner::{get_asset_table, AssetTable, DEFAULT_IMAGE_FORMAT};
use std::path::PathBuf;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "stac-curator", version, about = "Generate STAC catalogs for directories of GeoTIFF rasters")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan, build and persist a catalog for ROOT
    Generate(GenerateArgs),
    /// Write the asset table of ROOT as JSON
    Scan(ScanArgs),
    /// Print a STAC dataset record for a persisted catalog
    Record(RecordArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    root: PathBuf,
    #[arg(long)]
    id: Option<String>,
    /// TOML file with generation options; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    format: Option<String>,
    #[arg(long, value_enum)]
    catalog_type: Option<CatalogType>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<Url>,
    /// Precomputed asset table written by `scan`
    #[arg(long)]
    asset_table: Option<PathBuf>,
    /// LABEL=NAME[,NAME]
    #[arg(long = "extension", value_parser = parse_mapping_entry)]
    extensions: Vec<(String, ExtensionNames)>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    root: PathBuf,
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// LABEL=NAME[,NAME]
    #[arg(long = "extension", value_parser = parse_mapping_entry)]
    extensions: Vec<(String, ExtensionNames)>,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct RecordArgs {
    catalog_dir: PathBuf,
    #[arg(long)]
    uid: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn generation_config(args: &GenerateArgs) -> Result<GenerationConfig> {
    let mut config = match (&args.config, &args.id) {
        (Some(path), _) => GenerationConfig::read(path)?,
        (None, Some(id)) => GenerationConfig::new(id),
        (None, None) => bail!("either --id or --config is required"),
    };
    if let Some(id) = &args.id {
        config.id = id.clone();
    }
    if let Some(title) = &args.title {
        config.title = Some(title.clone());
    }
    if let Some(description) = &args.description {
        config.description = description.clone();
    }
    if let Some(format) = &args.format {
        config.image_format = format.clone();
    }
    if let Some(catalog_type) = args.catalog_type {
        config.catalog_type = catalog_type;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    merge_extensions(&mut config.extensions, &args.extensions);
    config.validate()?;
    Ok(config)
}

fn merge_extensions(map: &mut ExtensionMap, entries: &[(String, ExtensionNames)]) {
    for (label, names) in entries {
        map.insert(label.clone(), names.clone());
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let config = generation_config(&args)?;
    let table = args.asset_table.as_ref().map(AssetTable::read).transpose()?;

    let catalog = generate_stac_metadata(&args.root, &config, table)?;
    let items: usize = catalog.collections.iter().map(|c| c.items.len()).sum();
    println!(
        "Generated catalog {} with {} collections and {} items in {}",
        catalog.id,
        catalog.collections.len(),
        items,
        config.output_dir.display()
    );
    Ok(())
}

fn scan(args: ScanArgs) -> Result<()> {
    let (mut extensions, config_format) = match &args.config {
        Some(path) => {
            let config = GenerationConfig::read(path)?;
            (config.extensions, Some(config.image_format))
        }
        None => (ExtensionMap::new(), None),
    };
    merge_extensions(&mut extensions, &args.extensions);
    let format = args
        .format
        .or(config_format)
        .unwrap_or_else(|| DEFAULT_IMAGE_FORMAT.to_string());

    let mapping = (!extensions.is_empty()).then_some(&extensions);
    let table = get_asset_table(&args.root, mapping, &format)?;
    table.write(&args.out)?;
    info!("Wrote {} assets to {:?}", table.len(), args.out);
    Ok(())
}

fn record(args: RecordArgs) -> Result<()> {
    let mut dataset = StacDataset::from_catalog_dir(&args.catalog_dir, &args.uid, &args.name)?;
    if let Some(description) = args.description {
        dataset.description = description;
    }
    dataset.tags = args.tags;
    println!("{}", serde_json::to_string_pretty(&DatasetRecord::Stac(dataset))?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Scan(args) => scan(args),
        Command::Record(args) => record(args),
    }
}
