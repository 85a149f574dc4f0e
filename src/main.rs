use anyhow::anyhow;
use bipv::output::FileOutput;
use bipv::{run_project, ProjectFlags};
use clap::Parser;
use std::fs;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct BipvArgs {
    input_file: String,
    #[arg(long, short, help = "Path to historical energy consumption data in .csv format")]
    energy_file: Option<String>,
    #[arg(long, short, help = "Path to a BIM element schedule export in .csv format")]
    bim_file: Option<String>,
    #[clap(long, default_value_t = false, help = "Write a self-contained HTML report")]
    html_report: bool,
    #[clap(long, default_value_t = false, help = "Write the project state as JSON")]
    save_state: bool,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
    #[clap(long, short, default_value_t = false, help = "Only log warnings and errors")]
    quiet: bool,
}

impl From<&BipvArgs> for ProjectFlags {
    fn from(args: &BipvArgs) -> Self {
        let mut flags = ProjectFlags::empty();
        if args.html_report {
            flags.insert(ProjectFlags::HTML_REPORT);
        }
        if args.save_state {
            flags.insert(ProjectFlags::STATE_SNAPSHOT);
        }
        flags
    }
}

fn open(path: &str) -> anyhow::Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| anyhow!("Could not open {path}: {err}"))
}

fn main() -> anyhow::Result<()> {
    let args = BipvArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let level = if args.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)?;

    let input_path = Path::new(&args.input_file);
    let input_file_stem = input_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("Could not derive a file stem from {}", args.input_file))?;

    let output_path = input_path.with_file_name(format!("{input_file_stem}__results"));
    fs::create_dir_all(&output_path)?;
    let file_output = FileOutput::new(
        output_path.clone(),
        format!("{input_file_stem}__{{}}.{{}}"),
    );

    let mut energy_file = args.energy_file.as_deref().map(open).transpose()?;
    let mut bim_file = args.bim_file.as_deref().map(open).transpose()?;

    let state = run_project(
        open(&args.input_file)?,
        &file_output,
        energy_file.as_mut().map(|file| file as &mut dyn Read),
        bim_file.as_mut().map(|file| file as &mut dyn Read),
        &(&args).into(),
    )?;

    info!(
        steps = state.completed_steps().len(),
        "results written to {}",
        output_path.display()
    );

    Ok(())
}
