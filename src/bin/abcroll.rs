use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use abcroll::renderer::DEFAULT_VOICE_COLORS;
use abcroll::{PianoRollData, RenderOptions};

#[derive(Parser, Debug)]
#[command(
    name = "abcroll",
    version,
    about = "Piano-roll renderer for ABC, MusicXML and MIDI"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Render options JSON; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    render: RenderFlags,
}

#[derive(Args, Debug)]
struct RenderFlags {
    /// Roll width in pixels, key panel excluded.
    #[arg(long, global = true)]
    width: Option<f64>,

    /// Roll height in pixels.
    #[arg(long, global = true)]
    height: Option<f64>,

    /// Tick resolution per quarter note.
    #[arg(long, global = true)]
    ticks_per_beat: Option<u32>,

    /// Hide the key panel.
    #[arg(long, global = true, default_value_t = false)]
    no_key_panel: bool,

    /// Color every voice from the built-in palette instead of by scale.
    #[arg(long, global = true, default_value_t = false)]
    color_voices: bool,
}

impl RenderFlags {
    /// Override the values in `options` that were given on the command line.
    fn apply(&self, options: &mut RenderOptions) {
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(tpb) = self.ticks_per_beat {
            options.ticks_per_beat = tpb;
        }
        if self.no_key_panel {
            options.show_key_panel = false;
        }
        if self.color_voices {
            let palette = DEFAULT_VOICE_COLORS.iter().map(|c| c.to_string()).collect();
            options.voice_colors = Some(palette);
            options.highlight_voice = None;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an ABC, MusicXML, MXL or MIDI file as a piano-roll SVG.
    Render {
        input: PathBuf,
        /// Output SVG path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the flattened note events as JSON.
    Events { input: PathBuf },
    /// Show a file as an HTML page: the roll plus its track list.
    View {
        input: PathBuf,
        /// Output HTML path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Export the note events as a Standard MIDI File.
    Midi {
        input: PathBuf,
        /// Output .mid path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Render an analysis document with embedded <abc> blocks as HTML.
    Page {
        input: PathBuf,
        /// Output HTML path.
        #[arg(long)]
        out: PathBuf,
        /// Page heading; defaults to the file stem.
        #[arg(long)]
        title: Option<String>,
    },
    /// Build a static browser for a dataset directory.
    Site {
        dataset: PathBuf,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        /// Only list examples whose title contains this text.
        #[arg(long, default_value = "")]
        filter: String,
    },
    /// Convert MusicXML / MXL files below a directory to ABC.
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let options = render_options(&cli)?;

    match cli.cmd {
        Command::Render { input, out } => cmd_render(&input, &out, &options),
        Command::Events { input } => cmd_events(&input, &options),
        Command::View { input, out } => cmd_view(&input, &out, &options),
        Command::Midi { input, out } => cmd_midi(&input, &out, &options),
        Command::Page { input, out, title } => cmd_page(&input, &out, title, &options),
        Command::Site {
            dataset,
            out,
            filter,
        } => cmd_site(&dataset, &out, &filter, &options),
        Command::Convert { input, output } => cmd_convert(&input, &output),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render_options(cli: &Cli) -> anyhow::Result<RenderOptions> {
    let mut options = match &cli.config {
        Some(path) => RenderOptions::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => RenderOptions::default(),
    };
    cli.render.apply(&mut options);
    options.validate().context("invalid render options")?;
    Ok(options)
}

fn load(input: &Path, options: &RenderOptions) -> anyhow::Result<PianoRollData> {
    abcroll::load_roll(input, options.ticks_per_beat)
        .with_context(|| format!("load '{}'", input.display()))
}

fn write_output(out: &Path, contents: impl AsRef<[u8]>) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("write '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_render(input: &Path, out: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let data = load(input, options)?;
    write_output(out, abcroll::render_roll_to_svg(&data, options))
}

fn cmd_events(input: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let data = load(input, options)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn cmd_view(input: &Path, out: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let data = load(input, options)?;
    let title = data
        .title
        .clone()
        .or_else(|| input.file_name().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_else(|| "Piano roll".to_string());
    write_output(out, abcroll::render_roll_page(&title, &data, options))
}

fn cmd_midi(input: &Path, out: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let data = load(input, options)?;
    write_output(out, abcroll::events_to_midi(&data))
}

fn cmd_page(
    input: &Path,
    out: &Path,
    title: Option<String>,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("read analysis '{}'", input.display()))?;
    let title = title.unwrap_or_else(|| {
        input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Analysis")
            .to_string()
    });
    write_output(out, abcroll::render_analysis_page(&title, &text, options))
}

fn cmd_site(
    dataset: &Path,
    out: &Path,
    filter: &str,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let summary = abcroll::build_site(dataset, out, filter, options)
        .with_context(|| format!("build site from '{}'", dataset.display()))?;
    eprintln!(
        "wrote {} of {} examples to {} ({} failed)",
        summary.rendered,
        summary.listed,
        out.display(),
        summary.failed
    );
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> anyhow::Result<()> {
    let summary = abcroll::convert_dir(input, output)
        .with_context(|| format!("convert '{}'", input.display()))?;
    if !summary.succeeded() {
        anyhow::bail!(
            "{} of {} conversions failed",
            summary.failed,
            summary.attempted
        );
    }
    Ok(())
}
