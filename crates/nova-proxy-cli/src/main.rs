use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nova_proxy::{
    encode, init_tracing, Descriptor, HierarchyLoader, MethodLocator, MethodRecord, ProxyConfig,
    ReturnShape, StaticClassProvider, TypeShape,
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "nova-proxy",
    version,
    about = "Proxy runtime support (descriptors, method resolution)"
)]
struct Cli {
    /// TOML config file (`[logging]`, `[locator]`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the method descriptor for source-style type names
    Descriptor(DescriptorArgs),
    /// Resolve a method by name and descriptor in a class hierarchy
    Resolve(ResolveArgs),
    /// Resolve the inherited/declared method pair used by an interception stub
    Pair(PairArgs),
}

#[derive(Args)]
struct DescriptorArgs {
    /// Parameter type, e.g. `int`, `java.lang.String[]` (repeatable)
    #[arg(long = "param")]
    params: Vec<String>,
    /// Return type (defaults to `void`)
    #[arg(long = "returns", default_value = "void")]
    return_type: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum LookupMode {
    /// Only methods the class declares itself
    Declared,
    /// The class, its superclass chain, then its interfaces
    Inherited,
    /// Like `inherited` but starting above the class
    Super,
}

#[derive(Args)]
struct ResolveArgs {
    /// JSON hierarchy file (`{ "classes": [...] }`)
    hierarchy: PathBuf,
    /// Binary name of the class to search
    class: String,
    /// Method name
    name: String,
    /// Method descriptor, e.g. `(I)V`
    descriptor: String,
    #[arg(long, value_enum, default_value = "inherited")]
    mode: LookupMode,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PairArgs {
    /// JSON hierarchy file (`{ "classes": [...] }`)
    hierarchy: PathBuf,
    /// Binary name of the proxy class
    class: String,
    #[arg(long)]
    super_method: String,
    #[arg(long)]
    this_method: Option<String>,
    #[arg(long)]
    descriptor: String,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct MethodReport {
    class: String,
    name: String,
    descriptor: String,
}

impl From<&MethodRecord> for MethodReport {
    fn from(record: &MethodRecord) -> Self {
        Self {
            class: record.declaring_class.name().to_string(),
            name: record.name.clone(),
            descriptor: record.descriptor.to_string(),
        }
    }
}

#[derive(Serialize)]
struct PairReport {
    inherited: Option<MethodReport>,
    declared: Option<MethodReport>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ProxyConfig::load_from_path(path)?,
        None => ProxyConfig::default(),
    };
    init_tracing(&config.logging);
    let locator = MethodLocator::new(config.locator);

    match cli.command {
        Command::Descriptor(args) => {
            let params: Vec<TypeShape> = args
                .params
                .iter()
                .map(|p| TypeShape::from_source_name(p))
                .collect();
            let return_type = ReturnShape::from(args.return_type);
            println!("{}", encode(&params, &return_type)?);
            Ok(0)
        }
        Command::Resolve(args) => {
            let mut loader = open_hierarchy(&args.hierarchy)?;
            let class = loader.ensure_class(&args.class)?;
            let descriptor = Descriptor::parse(&args.descriptor)?;
            let found = match args.mode {
                LookupMode::Declared => locator.find_declared(&class, &args.name, &descriptor),
                LookupMode::Inherited => locator.find_inherited(&class, &args.name, &descriptor),
                LookupMode::Super => locator.find_super_method(&class, &args.name, &descriptor),
            };
            let found = match found {
                Ok(found) => found,
                Err(err) if err.is_not_found() => {
                    eprintln!("{err}");
                    return Ok(1);
                }
                Err(err) => return Err(err.into()),
            };
            print_output(&MethodReport::from(&found), &found.to_string(), args.json)?;
            Ok(0)
        }
        Command::Pair(args) => {
            let mut loader = open_hierarchy(&args.hierarchy)?;
            let class = loader.ensure_class(&args.class)?;
            let descriptor = Descriptor::parse(&args.descriptor)?;
            let mut slots: Vec<Option<MethodRecord>> = vec![None; 2];
            if let Err(err) = locator.resolve_pair(
                &class,
                &args.super_method,
                args.this_method.as_deref(),
                0,
                &descriptor,
                &mut slots,
            ) {
                if err.is_not_found() {
                    eprintln!("{err}");
                    return Ok(1);
                }
                return Err(err.into());
            }

            let report = PairReport {
                inherited: slots[0].as_ref().map(MethodReport::from),
                declared: slots[1].as_ref().map(MethodReport::from),
            };
            let text = slots
                .iter()
                .map(|slot| match slot {
                    Some(record) => record.to_string(),
                    None => "-".to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n");
            print_output(&report, &text, args.json)?;
            Ok(0)
        }
    }
}

fn open_hierarchy(path: &Path) -> Result<HierarchyLoader> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read hierarchy file {}", path.display()))?;
    let provider: StaticClassProvider = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse hierarchy file {}", path.display()))?;
    tracing::debug!(
        target: "nova.proxy",
        path = %path.display(),
        classes = provider.classes().len(),
        "loaded hierarchy file"
    );
    Ok(HierarchyLoader::new(Arc::new(provider)))
}

fn print_output<T: Serialize>(value: &T, text: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
