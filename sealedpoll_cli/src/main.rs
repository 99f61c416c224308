use clap::{App, Arg, SubCommand};
use sealedpoll::Settings;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod command_e2e;
mod command_keygen;

use command_e2e::command_e2e;
use command_keygen::command_keygen;

fn main() {
    let matches = App::new("SealedPoll CLI")
        .version("0.1")
        .author("Patrick Hayes <patrick.d.hayes@gmail.com>")
        .about("Runs sealed-ballot polls")
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .takes_value(true)
                .help("Settings file - values can also be set with SEALEDPOLL_* environment variables"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate a voter or creator keypair"))
        .subcommand(
            SubCommand::with_name("e2e")
                .about("Run a complete poll in memory and print the revealed poll")
                .arg(
                    Arg::with_name("question")
                        .long("question")
                        .short("q")
                        .takes_value(true)
                        .required(true)
                        .help("The poll question"),
                )
                .arg(
                    Arg::with_name("option")
                        .long("option")
                        .short("o")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .required(true)
                        .help("An option label, repeat for each option"),
                )
                .arg(
                    Arg::with_name("duration")
                        .long("duration")
                        .short("d")
                        .takes_value(true)
                        .default_value("3600")
                        .help("Seconds the poll stays open"),
                )
                .arg(
                    Arg::with_name("VOTES")
                        .index(1)
                        .multiple(true)
                        .help("Option index chosen by each voter, one voter per value"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = matches.value_of("config").map(expand);
    let settings = match Settings::load(config_path.as_deref().map(Path::new)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("sealedpoll: {}", e);
            std::process::exit(1);
        }
    };

    // Subcommands
    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen(matches);
    } else if let Some(matches) = matches.subcommand_matches("e2e") {
        command_e2e(matches, settings);
    } else {
        eprintln!("sealedpoll: no subcommand given, see --help");
        std::process::exit(1);
    }
}

/// Expand `~` and environment variables in a path or value
pub fn expand(value: &str) -> String {
    match shellexpand::full(value) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            eprintln!("sealedpoll: unable to expand {}: {}", value, e);
            std::process::exit(1);
        }
    }
}
