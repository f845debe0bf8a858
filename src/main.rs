use clap::{Parser, Subcommand};
use console::Term;
use ec2_replacement_sim::config::{init_config, Options, Overrides};
use ec2_replacement_sim::exit_codes::exit_code_for_error;
use ec2_replacement_sim::report::render;
use ec2_replacement_sim::simulation::price_source_for;
use ec2_replacement_sim::{CapacityType, OutputFormat, Result, Simulation};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ec2-replacement-sim")]
#[command(
    about = "Find cheaper, compatible EC2 instance types to replace an expensive one",
    long_about = "ec2-replacement-sim prices every instance type in a flexibility set and lists\nthe ones cheaper than a fraction of the replacement type's price.\n\nExamples:\n  ec2-replacement-sim --replacement r5.xlarge\n  ec2-replacement-sim --replacement m5.2xlarge --pricing-multiplier 0.8 -o wide\n  ec2-replacement-sim --replacement c5.4xlarge --capacity-type on-demand -o yaml"
)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Replacement instance type (required)
    #[arg(long, value_name = "INSTANCE_TYPE")]
    replacement: Option<String>,

    /// Flexibility set (regex matched against the whole instance type name)
    #[arg(long, value_name = "REGEX")]
    flexibility: Option<String>,

    /// Pricing multiplier to determine the replacement threshold [default: 0.5]
    #[arg(long, value_name = "MULTIPLIER", allow_negative_numbers = true)]
    pricing_multiplier: Option<f64>,

    /// Capacity type (spot or on-demand) [default: spot]
    #[arg(long, value_name = "TYPE")]
    capacity_type: Option<CapacityType>,

    /// AWS region (defaults to the AWS shared config region)
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Output mode: short, wide, yaml, json [default: short]
    #[arg(short, long, value_name = "MODE")]
    output: Option<OutputFormat>,

    /// YAML or TOML config file
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Read prices from a YAML/JSON snapshot instead of AWS
    #[arg(long, value_name = "PATH")]
    price_file: Option<PathBuf>,

    /// Maximum seconds to wait for pricing data [default: 300]
    #[arg(long = "max-wait", value_name = "SECS")]
    max_wait: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with the default options
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = ".ec2-replacement-sim.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            replacement: self.replacement.clone(),
            flexibility: self.flexibility.clone(),
            pricing_multiplier: self.pricing_multiplier,
            capacity_type: self.capacity_type,
            region: self.region.clone(),
            output: self.output,
            verbose: self.verbose,
            max_wait_secs: self.max_wait,
            price_file: self.price_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code_for_error(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Init { output }) = &cli.command {
        return init_config(output);
    }

    let config_path = Options::locate(cli.file.as_deref())?;
    let from_file = match &config_path {
        Some(path) => Options::from_file(path)?,
        None => Options::default(),
    };
    let options = from_file.merge(cli.overrides());

    // Setup logging - only warnings and errors unless verbose
    let filter = if options.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &config_path {
        debug!("Loaded config from {}", path.display());
    }

    let show_progress = matches!(options.output, OutputFormat::Short | OutputFormat::Wide)
        && Term::stderr().is_term();
    let simulation = Simulation::new(&options)?.with_progress(show_progress);

    let (source, region) = price_source_for(&options).await?;
    let report = simulation.run(source.as_ref(), &region).await?;

    print!("{}", render(&report, options.output)?);
    Ok(())
}
