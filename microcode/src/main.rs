mod builtin;
mod cli;
mod ds;
mod encoder;
mod error;
mod parser;
mod rom;
mod tables;
mod writer;

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    process::ExitCode,
};

use clap::Parser;
use cli::Cli;
use ds::{ControlWord, RomPlane, PLANE_COUNT};
use error::{EncodeError, Error};
use parser::ParserState;
use tables::IsaProfile;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let profile = load_profile(cli)?;
    let planes = compile(&profile)?;

    if cli.check {
        tracing::info!("Profile '{}' is valid, no files written", profile.name);
        return Ok(());
    }
    writer::write_planes(&planes, &cli.output, cli.format)?;

    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_profile(cli: &Cli) -> Result<IsaProfile, Error> {
    match &cli.profile {
        Some(path) if path.as_os_str() == "-" => read_profile(BufReader::new(io::stdin()), "stdin"),
        Some(path) => {
            let file = File::open(path).map_err(|source| Error::ReadProfile {
                path: path.clone(),
                source,
            })?;
            read_profile(BufReader::new(file), &profile_name(path))
        }
        None => {
            let profile = builtin::profile(&cli.builtin).ok_or_else(|| Error::UnknownProfile {
                name: cli.builtin.clone(),
                available: builtin::PROFILE_NAMES.join(", "),
            })??;
            Ok(profile)
        }
    }
}

fn read_profile<R: BufRead>(reader: R, name: &str) -> Result<IsaProfile, Error> {
    let mut parser = ParserState::new();
    parser.parse(reader)?;
    Ok(parser.finish(name)?)
}

fn profile_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned())
}

/// Encodes the whole control store and splits it into ROM chip images.
fn compile(profile: &IsaProfile) -> Result<[RomPlane; PLANE_COUNT], EncodeError> {
    let devices = &profile.write_devices;
    tracing::info!(
        "Compiling profile '{}': {} signals, {} write devices in bits {}..{}, {} instructions",
        profile.name,
        profile.signals.len(),
        devices.iter().count(),
        devices.offset(),
        devices.offset() + devices.width(),
        profile.instructions.len()
    );
    for signal in profile.signals.iter() {
        tracing::trace!(
            "{:>2} {} {}",
            signal.bit,
            signal.name,
            signal.description.as_deref().unwrap_or_default()
        );
    }

    let words = encoder::encode(&profile.instructions, &profile.signals, devices)?;
    let active = words
        .iter()
        .filter(|&(_, word)| word != ControlWord::IDLE)
        .count();
    tracing::info!("Encoded {} active control words", active);

    Ok(rom::split(&words))
}
