use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "toscana", about = "TOSCA parser and Clout compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a service template and report problems.
    Parse(CommonArgs),
    /// Parse a service template and compile it to a Clout document.
    Compile(CompileArgs),
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Root service template: a URL, a local path, or `-` for stdin.
    source: String,
    /// An input value, `name=YAML`. Repeatable.
    #[arg(long = "input", value_name = "NAME=YAML")]
    inputs: Vec<String>,
    /// URL of a YAML map of input values.
    #[arg(long = "inputs", value_name = "URL")]
    inputs_url: Option<String>,
    /// Enable a quirk by name. Repeatable.
    #[arg(long = "quirk", value_name = "NAME")]
    quirks: Vec<String>,
    /// Additional origin search paths for relative imports. Repeatable.
    #[arg(long = "path", value_name = "URL")]
    origins: Vec<String>,
    /// URL prefix rewrites, `from=to`. Repeatable.
    #[arg(long = "map-url", value_name = "FROM=TO")]
    url_rewrites: Vec<String>,
}

#[derive(clap::Args)]
struct CompileArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Output file; stdout when omitted.
    #[arg(long, short = 'o')]
    output: Option<std::path::PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    format: Format,
}

#[derive(Copy, Clone, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    match cli.command {
        Command::Parse(args) => {
            let parsed = parse(&args).await?;
            report(&parsed);
            Ok(parsed.is_clean())
        }
        Command::Compile(args) => {
            let parsed = parse(&args.common).await?;
            report(&parsed);
            let Some(template) = &parsed.template else {
                return Ok(false);
            };

            let clout = clout::compile(template).context("failed to compile Clout")?;
            let mut out: Box<dyn Write> = match &args.output {
                Some(path) => Box::new(
                    std::fs::File::create(path)
                        .with_context(|| format!("failed to create {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout().lock()),
            };
            match args.format {
                Format::Yaml => clout.write_yaml(&mut out)?,
                Format::Json => {
                    clout.write_json(&mut out)?;
                    writeln!(out)?;
                }
            }
            Ok(parsed.is_clean())
        }
    }
}

async fn parse(args: &CommonArgs) -> anyhow::Result<tosca::Parsed> {
    let url = resources::arg_to_url(&args.source)
        .with_context(|| format!("cannot resolve source {:?}", args.source))?;

    let origins = args
        .origins
        .iter()
        .map(|origin| {
            url::Url::parse(origin).with_context(|| format!("malformed origin {origin:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let rewrites = args
        .url_rewrites
        .iter()
        .map(|rewrite| {
            rewrite
                .split_once('=')
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .with_context(|| format!("malformed URL rewrite {rewrite:?} (want FROM=TO)"))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let urls = Arc::new(
        resources::UrlContext::new()
            .with_origins(origins)
            .with_rewrites(rewrites),
    );

    let (quirks, unknown) = tosca::Quirks::parse(&args.quirks);
    for name in unknown {
        anyhow::bail!("unknown quirk: {name:?}");
    }

    let inputs = gather_inputs(args, &urls).await?;

    let parsed = tosca::parse(
        urls,
        url,
        tosca::ParseOptions {
            quirks,
            inputs,
            cancel: None,
        },
    )
    .await;
    Ok(parsed)
}

/// Inputs come inline (`name=YAML`) or as one top-level YAML map loaded
/// from a URL; inline values override the loaded map.
async fn gather_inputs(
    args: &CommonArgs,
    urls: &resources::UrlContext,
) -> anyhow::Result<tosca::Inputs> {
    let mut inputs = tosca::Inputs::new();

    if let Some(inputs_url) = &args.inputs_url {
        let url = urls
            .resolve(inputs_url, None)
            .with_context(|| format!("cannot resolve inputs URL {inputs_url:?}"))?;
        let (value, _) = urls
            .read(&url)
            .await
            .with_context(|| format!("failed to read inputs from {url}"))?;
        let Some(map) = value.as_map() else {
            anyhow::bail!("inputs document is not a map: {url}");
        };
        for (name, value) in map {
            inputs.insert(name.key_string(), value.clone());
        }
    }

    for input in &args.inputs {
        let Some((name, value)) = input.split_once('=') else {
            anyhow::bail!("malformed input {input:?} (want NAME=YAML)");
        };
        let value: serde_yaml::Value = serde_yaml::from_str(value)
            .with_context(|| format!("malformed YAML for input {name:?}"))?;
        inputs.insert(name.to_string(), ir::Value::from_yaml(value));
    }

    Ok(inputs)
}

fn report(parsed: &tosca::Parsed) {
    let problems = parsed.catalog.problems.to_vec();
    if problems.is_empty() {
        tracing::info!(
            files = parsed.catalog.file_count(),
            "parsed with no problems"
        );
        return;
    }

    eprintln!("{} problem(s):", problems.len());
    for problem in problems {
        eprintln!("  {problem}");
    }
}
