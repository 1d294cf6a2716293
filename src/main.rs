use anyhow::Context;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use pmta_ip_picker::output::OutputFormat;
use pmta_ip_picker::schema::TieBreak;
use pmta_ip_picker::{run_files, Cap, PickerError, Settings, TomlConfig};
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("pmta-ip-picker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Pick a bounded, priority-ordered set of IPv4 addresses for every PMTA")
        .long_about(
            "Reads two tables: a detailed one (IP, rDNS, fDNS, PMTA) and a PMTA list.\n\
             For every PMTA it selects IPs with clean rDNS first, backfills with No_rDNS\n\
             hosts, then fills remaining slots with No_fDNS hosts. The result is the PMTA\n\
             list with two extra columns, Priority1_rDNS and Priority2_No_fDNS.",
        )
        .arg(
            Arg::new("inputs")
                .value_name("FILE")
                .help("The two input files (CSV or spreadsheet), in any order")
                .num_args(0..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(TomlConfig::default_path()),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("cap")
                .short('n')
                .long("cap")
                .value_name("N")
                .help("IPs to select per PMTA (1-50)")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for the generated file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .help("Output format (xlsx, csv)"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("NAME")
                .help("Output file name prefix"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .help("Rank PMTA groups on N worker threads")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("tie-break")
                .long("tie-break")
                .value_name("POLICY")
                .help("When both files look detailed: first, more_rows or reject"),
        )
        .arg(
            Arg::new("preview")
                .long("preview")
                .value_name("ROWS")
                .help("Log the first ROWS rows of each input")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Print the run summary as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging, including per-PMTA decisions")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(TomlConfig::default_path());
    let explicit = matches.value_source("config") == Some(ValueSource::CommandLine);
    let loaded = match TomlConfig::load_or_default(config_path, explicit) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    init_logging(matches.get_flag("verbose"), config.log_level());
    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if let Err(e) = run(&matches, &config).await {
        if let Some(PickerError::InputCountMismatch { found }) = e.downcast_ref::<PickerError>() {
            if *found > 2 {
                eprintln!("❌ Too many files: expected two, got {found}");
            } else {
                eprintln!("❌ Please provide two files: the detailed IP file and the PMTA list");
            }
        } else {
            eprintln!("❌ {e:#}");
        }
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, config: &TomlConfig) -> anyhow::Result<()> {
    let settings = build_settings(matches, config)?;
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    log::info!("Starting PMTA IP selection ({} IPs per PMTA)", settings.cap);
    let processed = run_files(inputs.as_slice(), &settings).await.map_err(|e| match e {
        PickerError::InputCountMismatch { .. } => anyhow::Error::new(e),
        other => anyhow::Error::new(other).context("PMTA IP selection failed"),
    })?;

    if matches.get_flag("report") {
        let json = serde_json::to_string_pretty(&processed.summary)
            .context("Failed to serialize run summary")?;
        println!("{json}");
    } else {
        processed.summary.print();
    }
    Ok(())
}

fn build_settings(matches: &ArgMatches, config: &TomlConfig) -> anyhow::Result<Settings> {
    let mut settings = config.to_settings().context("Invalid configuration")?;

    if let Some(cap) = matches.get_one::<u32>("cap") {
        settings.cap = Cap::new(*cap)?;
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        settings.output_dir = dir.clone();
    }
    if let Some(format) = matches.get_one::<String>("format") {
        settings.format = format.parse::<OutputFormat>()?;
    }
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        settings.prefix = prefix.clone();
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        settings.workers = (*workers).max(1);
    }
    if let Some(policy) = matches.get_one::<String>("tie-break") {
        settings.tie_break = policy.parse::<TieBreak>()?;
    }
    if let Some(rows) = matches.get_one::<usize>("preview") {
        settings.preview_rows = *rows;
    }

    Ok(settings)
}

fn init_logging(verbose: bool, configured: Option<&str>) {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        configured
            .and_then(|level| level.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.init();
}

fn generate_default_config(path: &str) {
    let content = match TomlConfig::generate_default() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error generating configuration: {e}");
            process::exit(1);
        }
    };

    match std::fs::write(path, content) {
        Ok(()) => println!("Default configuration written to {path}"),
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
