//! CLI for xlsxt - renders an XLSX template against JSON data
//!
//! Usage:
//!   xlsxt_cli render --template t.xlsx --data d.json --xlsx out.xlsx
//!   xlsxt_cli render --template t.xlsx --data d.json --pdf out.pdf --fonts ./fonts

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xlsxt::{ExportConfig, XlsxTemplate, XlsxtError};

#[derive(Parser)]
#[command(name = "xlsxt_cli")]
#[command(about = "Render XLSX report templates to XLSX, HTML and PDF")]
#[command(version)]
struct Cli {
    /// Log rendering decisions (same as RUST_LOG=debug)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind JSON data to a template and write the requested outputs
    #[command(after_help = "\
Examples:
  xlsxt_cli render -t invoice.xlsx -d order.json --xlsx invoice_out.xlsx
  xlsxt_cli render -t invoice.xlsx -d order.json --html invoice.html
  xlsxt_cli render -t invoice.xlsx -d order.json --pdf invoice.pdf --fonts ./fonts")]
    Render {
        /// Template workbook
        #[arg(long, short = 't')]
        template: PathBuf,

        /// JSON data file; an array binds one element per sheet
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Write the rendered workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// Write an HTML export
        #[arg(long)]
        html: Option<PathBuf>,

        /// Write a PDF export
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Directory with <Family><Bold><Italic>.ttf files
        #[arg(long, env = "XLSXT_FONT_DIR")]
        fonts: Option<PathBuf>,

        /// Export settings (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

struct RenderArgs {
    template: PathBuf,
    data: PathBuf,
    xlsx: Option<PathBuf>,
    html: Option<PathBuf>,
    pdf: Option<PathBuf>,
    fonts: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_render(args: RenderArgs) -> Result<(), XlsxtError> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    if let Some(dir) = args.fonts {
        config.font_dir = Some(dir);
    }

    let json = std::fs::read_to_string(&args.data)?;
    let data: serde_json::Value = serde_json::from_str(&json)?;

    let mut template = XlsxTemplate::open(&args.template)?.with_config(config);
    template.render_json(data)?;

    if args.xlsx.is_none() && args.html.is_none() && args.pdf.is_none() {
        eprintln!("Nothing to write: pass --xlsx, --html or --pdf");
    }
    if let Some(path) = &args.xlsx {
        template.save(path)?;
        report(path);
    }
    if let Some(path) = &args.html {
        template.save_html(path)?;
        report(path);
    }
    if let Some(path) = &args.pdf {
        template.save_pdf(path)?;
        report(path);
    }
    Ok(())
}

fn report(path: &Path) {
    eprintln!("Written: {}", path.display());
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Render {
            template,
            data,
            xlsx,
            html,
            pdf,
            fonts,
            config,
        } => cmd_render(RenderArgs {
            template,
            data,
            xlsx,
            html,
            pdf,
            fonts,
            config,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
