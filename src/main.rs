#[macro_use]
extern crate log;
#[macro_use]
extern crate clap;
extern crate dds3model;

use clap::ArgMatches;
use dds3model::errors::{Result, ResultExt};
use dds3model::{info, logger, version};
use std::fs;
use std::path::Path;
use std::process::exit;

fn main() {
    let app = clap_app!(dds3model =>
        (@setting SubcommandRequiredElseHelp)
        (@setting VersionlessSubcommands)
        (version: crate_version!())
        (about: "Reader/writer for DDS3 model, texture, motion and field files")
        (@arg verbose: -v --verbose +multiple +global "Print more diagnostics (repeat for more)")
        (@arg quiet: -q --quiet +global "Print no diagnostics")
        (@subcommand info =>
            (about: "Print a summary of a file")
            (alias: "i")
            (@arg INPUT: +required "Model pack, model, texture, motion or field scene file")
        )
        (@subcommand roundtrip =>
            (about: "Load and save a file, checking the output is identical")
            (alias: "r")
            (@arg INPUT: +required "Model pack, model, texture, motion or field scene file")
            (@arg OUTPUT: -o --output +takes_value "Write the saved bytes here")
        )
        (@subcommand version =>
            (about: "Print build information")
        )
    );
    let matches = app.get_matches();

    let (subcmd, sub_matches) = match matches.subcommand() {
        (name, Some(sub_matches)) => (name, sub_matches),
        _ => exit(1),
    };
    logger::init(logger::level_for_verbosity(sub_matches.occurrences_of("verbose")));
    if sub_matches.is_present("quiet") {
        logger::silence();
    }

    let res = match subcmd {
        "info" => info_main(sub_matches),
        "roundtrip" => roundtrip_main(sub_matches),
        "version" => {
            version::print_version_info();
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(e) = res {
        error!("{}", e);
        for cause in e.iter().skip(1) {
            error!("  caused by: {}", cause);
        }
        exit(1);
    }
}

fn read_input(matches: &ArgMatches) -> Result<Vec<u8>> {
    let path = Path::new(matches.value_of_os("INPUT").unwrap_or_default());
    let bytes = fs::read(path)
        .chain_err(|| format!("couldn't read {}", path.display()))?;
    info!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn info_main(matches: &ArgMatches) -> Result<()> {
    let bytes = read_input(matches)?;
    let chunk = dds3model::load(&bytes)?;
    info::print_chunk(&chunk);
    Ok(())
}

fn roundtrip_main(matches: &ArgMatches) -> Result<()> {
    let bytes = read_input(matches)?;
    let chunk = dds3model::load(&bytes)?;
    info!("loaded a {}", chunk.kind_name());

    let saved = dds3model::save(&chunk)?;
    if saved == bytes {
        println!("identical ({} bytes)", saved.len());
    } else {
        match saved.iter().zip(&bytes).position(|(a, b)| a != b) {
            Some(pos) => println!("differs at {:#x}", pos),
            None => println!("differs in length: {} bytes, was {}", saved.len(), bytes.len()),
        }
    }

    if let Some(out) = matches.value_of_os("OUTPUT") {
        let out = Path::new(out);
        fs::write(out, &saved)
            .chain_err(|| format!("couldn't write {}", out.display()))?;
        info!("wrote {}", out.display());
    }
    Ok(())
}
