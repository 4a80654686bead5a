mod codecs;
mod convert;
mod error;
mod image;

use std::path::PathBuf;
use std::process::exit;

use clap::{value_parser, Arg, ArgAction, Command};
use log::{error, info, warn};

use crate::convert::{output_name, run_batch, ConversionTask};

fn create_cmd_args() -> Command {
    Command::new("ppm2png")
        .about("Converts ASCII ppm (P3) files from a directory to png files")
        .arg(
            Arg::new("in")
                .short('i')
                .help("Input directory")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("out")
                .short('o')
                .help("Output directory")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("parallel")
                .short('p')
                .help("Convert files in parallel")
                .action(ArgAction::SetTrue),
        )
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut cmd = create_cmd_args();
    let matches = cmd.clone().get_matches();
    let parallel = matches.get_flag("parallel");

    let (input, output) = match (
        matches.get_one::<PathBuf>("in"),
        matches.get_one::<PathBuf>("out"),
    ) {
        (Some(input), Some(output)) => (input, output),
        _ => {
            eprintln!("{}", cmd.render_usage());
            exit(1);
        }
    };

    let entries = match std::fs::read_dir(input) {
        Ok(entries) => entries,
        Err(e) => {
            error!("could not read directory {}: {}", input.display(), e);
            exit(1);
        }
    };

    let mut tasks = Vec::new();
    for entry in entries {
        let entry = match entry.and_then(|e| Ok((e.file_type()?, e))) {
            Ok((file_type, entry)) => {
                if file_type.is_dir() {
                    continue;
                }
                entry
            }
            Err(e) => {
                error!("could not read directory {}: {}", input.display(), e);
                exit(1);
            }
        };
        let name = entry.file_name();
        tasks.push(ConversionTask {
            source: entry.path(),
            destination: output.join(output_name(&name.to_string_lossy())),
        });
    }
    // read_dir order is platform dependent, keep sequential runs deterministic
    tasks.sort_by(|a, b| a.source.cmp(&b.source));

    let failed = run_batch(&tasks, parallel);
    if failed > 0 {
        warn!("{} of {} files failed to convert", failed, tasks.len());
    } else {
        info!("converted {} files", tasks.len());
    }
}
