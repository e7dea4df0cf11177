use anyhow::Context;
use clap::Parser;
use core_types::{GenerationRequest, PersistentOptions, SelectionValue};
use livepatch::{Config, Generator};
use mimalloc::MiMalloc;
use net::{CancelFlag, HttpOpener};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "livepatch", version, about = "Generate or refine a page from a prompt")]
struct Cli {
    /// Prompt sent to the generator.
    prompt: String,

    #[arg(short, long, default_value = "livepatch.toml")]
    config: PathBuf,

    /// Write the final document here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Refine this existing document instead of generating a new one.
    #[arg(long, value_name = "FILE")]
    refine: Option<PathBuf>,

    /// Prompt that produced the refined document; its cached result is dropped.
    #[arg(long, requires = "refine")]
    origin_prompt: Option<String>,

    /// Structured choice as NAME=VALUE; repeat for lists.
    #[arg(short, long = "select", value_name = "NAME=VALUE")]
    selections: Vec<String>,

    #[arg(long)]
    brand: Option<String>,

    #[arg(long)]
    business: Option<String>,

    #[arg(long)]
    no_cache: bool,

    /// Print the document to stderr each time it changes.
    #[arg(long)]
    watch: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let options = PersistentOptions {
        brand_name: cli.brand.clone(),
        business_description: cli.business.clone(),
        ..PersistentOptions::default()
    };
    let mut request = match &cli.refine {
        Some(path) => {
            let base = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GenerationRequest::refine(&cli.prompt, base)
        }
        None => GenerationRequest::generate(&cli.prompt),
    }
    .with_options(options);
    let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for raw in &cli.selections {
        let (name, value) = parse_selection(raw)?;
        grouped.entry(name).or_default().push(value.to_string());
    }
    for (name, mut values) in grouped {
        let value = match values.len() {
            1 => SelectionValue::Text(values.remove(0)),
            _ => SelectionValue::List(values),
        };
        request.selections.insert(name.to_string(), value);
    }

    let opener = HttpOpener::new(&config.http())?;
    let mut generator = Generator::from_config(opener, &config)?;
    let watch = cli.watch;
    let outcome = generator.generate(&request, &CancelFlag::new(), |phase, document| {
        log::debug!("{phase:?}: {} bytes", document.len());
        if watch {
            eprintln!("----- {phase:?} -----\n{document}");
        }
    })?;

    if let Some(origin) = &cli.origin_prompt {
        let origin = GenerationRequest {
            selections: request.selections.clone(),
            ..GenerationRequest::generate(origin.as_str()).with_options(request.options.clone())
        };
        generator.invalidate_origin(&origin);
    }
    if outcome.from_cache {
        log::info!("result served from cache");
    }
    if let Some(files) = &outcome.result.files {
        log::info!("response carried {} files", files.len());
    }

    match &cli.output {
        Some(path) => std::fs::write(path, &outcome.result.document)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", outcome.result.document),
    }
    Ok(())
}

fn parse_selection(raw: &str) -> anyhow::Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .with_context(|| format!("selection {raw:?} is not NAME=VALUE"))
}
