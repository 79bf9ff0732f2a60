//! ## hic_filter ##
//! -----------------
//! Removes technical artifacts from paired Hi-C reads.
//!
//! ## classify ##
//! --------------
//! Counts how often every restriction fragment is hit, determines the cutoff
//! for over-represented fragments and assigns each read pair to the artifact
//! categories (self-circle, dangling-end, extra dangling-end, error, duplicated,
//! too close from RE, too short, too large, over-represented).
//! The flagged read ids are written as a table and optionally directly applied.
//!
//! ## apply ##
//! -----------
//! Takes the table written by classify and the original read-pair file
//! and writes all lines which are not flagged by the chosen categories.

use clap::{app_from_crate,crate_name,crate_description,crate_authors,crate_version,App,SubCommand,Arg};
use std::env;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process;
extern crate pretty_env_logger;
#[macro_use] extern crate log;

// our library which is within the same project
extern crate hicfilter;
use hicfilter::lib::apply::{*};
use hicfilter::lib::classify::{*};
use hicfilter::lib::common::VersionInfo;
use hicfilter::lib::error::{FilterError, Result};

fn parse_arg<T: std::str::FromStr>(
    matches: &clap::ArgMatches,
    name: &str
) -> Result<T> {
    // all parsed arguments carry a default value
    let value = matches.value_of(name).unwrap_or_default();
    value.parse::<T>().map_err(|_| {
        FilterError::Parameter(format!("could not interpret {:?} for {}", value, name))
    })
}

/// None if no explicit list was given, meaning all categories
fn chosen_categories(
    matches: &clap::ArgMatches
) -> Result<Option<Vec<FilterCategory>>> {
    match matches.value_of("FILTERS") {
        Some(list) => Ok(Some(parse_categories(list)?)),
        None => Ok(None),
    }
}

fn run_classify(
    matches: &clap::ArgMatches,
    args_string: &str
) -> Result<()> {
    ////////////////////////
    ////  prep options  ////
    ////////////////////////
    let reads        = Path::new(matches.value_of("READS").unwrap_or_default());
    let mask_out     = matches.value_of("MASKS");
    let filtered_out = matches.value_of("OUT");
    let categories   = chosen_categories(matches)?;
    let params = FilterParams {
        max_molecule_length: parse_arg(matches, "MOLECULE")?,
        over_represented   : parse_arg(matches, "OVERREP")?,
        max_frag_size      : parse_arg(matches, "MAXFRAG")?,
        min_frag_size      : parse_arg(matches, "MINFRAG")?,
        re_proximity       : parse_arg(matches, "PROXIMITY")?,
        verbose            : !matches.is_present("QUIET"),
    };
    debug!("Classification parameters: {:?}", params);

    ////////////////////////
    ////   classify     ////
    ////////////////////////
    let masks = filter_reads(reads, &params)?;

    let infos = VersionInfo {
        program: "hic_filter classify",
        version: crate_version!(),
        author : crate_authors!(),
        command: args_string,
    };
    // either we write to file or STDOUT
    match mask_out {
        Some(x) => {
            let out = File::create(x).map_err(|e| FilterError::io(e, x))?;
            write_masks(&masks, out, &infos)?;
            eprintln!("INFO: flagged reads written to {}", x);
        },
        None => write_masks(&masks, io::stdout(), &infos)?,
    };

    if let Some(x) = filtered_out {
        let stats = apply_filter_to_file(reads, Path::new(x), &masks, categories.as_deref())?;
        eprintln!("INFO: kept {} lines, removed {} lines", stats.kept, stats.removed);
    }
    Ok(())
}

fn run_apply(
    matches: &clap::ArgMatches
) -> Result<()> {
    let reads        = Path::new(matches.value_of("READS").unwrap_or_default());
    let mask_in      = Path::new(matches.value_of("MASKS").unwrap_or_default());
    let filtered_out = matches.value_of("OUT");
    let categories   = chosen_categories(matches)?;

    let masks = read_masks(mask_in)?;
    for line in masks.summary() {
        debug!("{}", line);
    }
    let stats = match filtered_out {
        Some(x) => apply_filter_to_file(reads, Path::new(x), &masks, categories.as_deref())?,
        None => apply_filter(reads, io::stdout(), &masks, categories.as_deref())?,
    };
    eprintln!("INFO: kept {} lines, removed {} lines", stats.kept, stats.removed);
    Ok(())
}

fn build_cli() -> App<'static, 'static> {
    let reads_arg = Arg::with_name("READS")
        .short("i")
        .long("reads")
        .value_name("FILE")
        .help("tab-separated file with the pairs of reads and their restriction fragments")
        .takes_value(true)
        .required(true);
    let filters_arg = Arg::with_name("FILTERS")
        .short("f")
        .long("filters")
        .value_name("LIST")
        .help("comma separated ids or names of the categories to remove [default: all]")
        .takes_value(true)
        .required(false);

    app_from_crate!()
        .subcommand(SubCommand::with_name("classify")
            .about("classifying pairs of reads into artifact categories")
            .arg(reads_arg.clone())
            .arg(Arg::with_name("MASKS")
                .short("m")
                .long("masks")
                .value_name("FILE")
                .help("output table of flagged reads [default: STDOUT]")
                .takes_value(true)
                .required(false))
            .arg(Arg::with_name("OUT")
                .short("o")
                .long("out")
                .value_name("FILE")
                .help("if provided writes directly the filtered pairs of reads")
                .takes_value(true)
                .required(false))
            // without a filtered output the list would have no effect
            .arg(filters_arg.clone().requires("OUT"))
            .arg(Arg::with_name("MOLECULE")
                .long("max-molecule-length")
                .value_name("INT")
                .help("reads on different fragments closer than this and facing each other are extra dangling-ends")
                .takes_value(true)
                .default_value("500"))
            .arg(Arg::with_name("OVERREP")
                .long("over-represented")
                .value_name("FLOAT")
                .help("fraction of the most frequently detected fragments to remove")
                .takes_value(true)
                .default_value("0.005"))
            .arg(Arg::with_name("MAXFRAG")
                .long("max-frag-size")
                .value_name("INT")
                .help("reads from larger restriction fragments are removed")
                .takes_value(true)
                .default_value("100000"))
            .arg(Arg::with_name("MINFRAG")
                .long("min-frag-size")
                .value_name("INT")
                .help("reads from smaller restriction fragments are removed")
                .takes_value(true)
                .default_value("100"))
            .arg(Arg::with_name("PROXIMITY")
                .long("re-proximity")
                .value_name("INT")
                .help("reads closer than this to a restriction site are removed")
                .takes_value(true)
                .default_value("5"))
            .arg(Arg::with_name("QUIET")
                .short("q")
                .long("quiet")
                .help("do not report the number of reads per category")
                .takes_value(false)))
        .subcommand(SubCommand::with_name("apply")
            .about("writing the pairs of reads which were not flagged")
            .arg(reads_arg)
            .arg(Arg::with_name("MASKS")
                .short("m")
                .long("masks")
                .value_name("FILE")
                .help("table of flagged reads as written by classify")
                .takes_value(true)
                .required(true))
            .arg(Arg::with_name("OUT")
                .short("o")
                .long("out")
                .value_name("FILE")
                .help("output file with the filtered pairs of reads [default: STDOUT]")
                .takes_value(true)
                .required(false))
            .arg(filters_arg))
}

fn main() {
    pretty_env_logger::init();

    // now the next is not really for any argument
    // parsing but simply to get the command which
    // was used to execute as I cant get this from clap
    let args: Vec<String> = env::args().collect();
    let args_string = args.join(" ");

    let matches = build_cli().get_matches();

    let result = if let Some(matches) = matches.subcommand_matches("classify") {
        run_classify(matches, &args_string)
    }else if let Some(matches) = matches.subcommand_matches("apply") {
        run_apply(matches)
    }else{
        eprintln!("Please choose one of the sub-commands, specify --help for more information");
        process::exit(1);
    };
    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_filters_need_output(){
        let result = build_cli().get_matches_from_safe(vec!["hic_filter", "classify", "-i", "reads.tsv", "-f", "1,2"]);
        assert!(result.is_err());
        let result = build_cli().get_matches_from_safe(vec!["hic_filter", "classify", "-i", "reads.tsv", "-f", "1,2", "-o", "out.tsv"]);
        assert!(result.is_ok());
    }
    #[test]
    fn apply_filters_without_output(){
        // apply writes to STDOUT when no output is given
        let result = build_cli().get_matches_from_safe(vec!["hic_filter", "apply", "-i", "reads.tsv", "-m", "masks.tsv", "-f", "5"]);
        assert!(result.is_ok());
    }
    #[test]
    fn classify_defaults(){
        let matches = build_cli().get_matches_from(vec!["hic_filter", "classify", "-i", "reads.tsv"]);
        let sub = matches.subcommand_matches("classify").unwrap();
        let defaults = FilterParams::default();
        assert_eq!(parse_arg::<i64>(sub, "MOLECULE").unwrap(), defaults.max_molecule_length);
        assert_eq!(parse_arg::<f64>(sub, "OVERREP").unwrap(), defaults.over_represented);
        assert_eq!(parse_arg::<i64>(sub, "MAXFRAG").unwrap(), defaults.max_frag_size);
        assert_eq!(parse_arg::<i64>(sub, "MINFRAG").unwrap(), defaults.min_frag_size);
        assert_eq!(parse_arg::<i64>(sub, "PROXIMITY").unwrap(), defaults.re_proximity);
        assert!(chosen_categories(sub).unwrap().is_none());
    }
}
