use crate::config::load_config;
use crate::layout::compute_stages;
use crate::layout_dump::{layout_dump_json, write_layout_dump};
use crate::parser::parse_graph;
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orthodraw", version, about = "Orthogonal grid drawings of planar-ish graphs")]
pub struct Args {
    /// Input graph (.gml, .json, .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Ignore any placement in the input and embed combinatorially
    #[arg(long = "no-positions")]
    pub no_positions: bool,

    /// Draw bend points
    #[arg(long = "show-bends")]
    pub show_bends: bool,

    /// Abort the layout after this many milliseconds
    #[arg(long = "time-budget")]
    pub time_budget_ms: Option<u64>,

    /// Also write the layout as JSON to this path
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if args.show_bends {
        config.render.show_bends = true;
    }
    if args.time_budget_ms.is_some() {
        config.layout.time_budget_ms = args.time_budget_ms;
    }

    let input = read_input(args.input.as_deref())?;
    let parsed = parse_graph(&input)?;
    let positions = if args.no_positions {
        None
    } else {
        parsed.positions.as_ref()
    };
    info!(
        vertices = parsed.graph.vertex_count(),
        edges = parsed.graph.edge_count(),
        placed = positions.is_some(),
        "graph loaded"
    );

    let stages = compute_stages(&parsed.graph, positions, &config.layout)
        .context("layout failed")?;
    if let Some(path) = args.dump_layout.as_deref() {
        write_layout_dump(path, &stages.drawing, &parsed.graph)?;
    }

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&stages.drawing, &config.theme, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&stages.drawing, &config.theme, &config.render);
            write_output_png(&svg, &output, &config.theme)?;
        }
        OutputFormat::Json => {
            let json = layout_dump_json(&stages)?;
            match args.output.as_deref() {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        debug!(%err, "tracing subscriber already installed");
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
