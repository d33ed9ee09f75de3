use clap::{Arg, ArgAction, Command};

/// Parsed command line arguments.
#[derive(Debug)]
pub struct CliArgs {
    pub config_file: Option<String>,
    pub exchanges_file: Option<String>,
    pub log_level: Option<String>,
    pub validate_only: bool,
    pub print_config: bool,
    pub discover: bool,
}

pub fn parse_cli_args() -> CliArgs {
    let matches = Command::new("confluence")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cross-exchange cryptocurrency price aggregator")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults to config/<environment>.toml)"),
        )
        .arg(
            Arg::new("exchanges")
                .short('e')
                .long("exchanges")
                .value_name("FILE")
                .help("Exchange descriptor JSON document (overrides poller.exchanges_file)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level override (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("validate-only")
                .long("validate-only")
                .action(ArgAction::SetTrue)
                .help("Validate configuration and exchange descriptors, then exit"),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .action(ArgAction::SetTrue)
                .help("Print the effective configuration and exit"),
        )
        .arg(
            Arg::new("discover")
                .long("discover")
                .action(ArgAction::SetTrue)
                .help("Fetch tradable symbols from every exchange, print them as TSV, and exit"),
        )
        .get_matches();

    CliArgs {
        config_file: matches.get_one::<String>("config").cloned(),
        exchanges_file: matches.get_one::<String>("exchanges").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        validate_only: matches.get_flag("validate-only"),
        print_config: matches.get_flag("print-config"),
        discover: matches.get_flag("discover"),
    }
}
