use std::fs;
use std::path::Path;
use std::process;

use bytesize::ByteSize;
use clap::{Arg, ArgMatches, Command};
use env_logger;
use log;

use line_sort::progress::{self, ProgressTimer};
use line_sort::{generate_file, parse_size, ExternalSorterBuilder};

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

fn main() {
    let arg_parser = build_arg_parser();

    match arg_parser.subcommand() {
        Some(("generate", args)) => {
            init_logger(args);
            generate(args);
        }
        Some(("sort", args)) => {
            init_logger(args);
            sort(args);
        }
        _ => unreachable!("subcommand is required"),
    }
}

fn generate(args: &ArgMatches) {
    let size = parse_size(args.value_of("size").expect("value is required")).expect("value is pre-validated");
    let output = Path::new(args.value_of("output").expect("value has a default"));

    let timer = ProgressTimer::new();
    match generate_file(output, size.as_u64()) {
        Ok(stats) => log::info!(
            "generated {} ({} lines) in {}",
            ByteSize(stats.bytes).to_string_as(true),
            stats.lines,
            progress::format_elapsed(timer.elapsed())
        ),
        Err(err) => {
            log::error!("file generation error: {}", err);
            process::exit(1);
        }
    }
}

fn sort(args: &ArgMatches) {
    let input = Path::new(args.value_of("input").expect("value has a default"));
    if !input.is_file() {
        log::error!("input file not found: {}", input.display());
        process::exit(1);
    }

    let output = Path::new(args.value_of("output").expect("value has a default"));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = fs::create_dir_all(parent) {
            log::error!("output directory creation error: {}", err);
            process::exit(1);
        }
    }

    let tmp_dir = Path::new(args.value_of("tmp_dir").expect("value has a default"));
    let chunk_size = parse_size(args.value_of("chunk_size").expect("value has a default")).expect("value is pre-validated");
    let buf_size = parse_size(args.value_of("buf_size").expect("value has a default")).expect("value is pre-validated");
    let threads: usize = args.value_of_t_or_exit("threads");
    let max_open_files: usize = args.value_of_t_or_exit("max_open_files");

    let sorter = match ExternalSorterBuilder::new()
        .with_threads_number(threads)
        .with_tmp_dir(tmp_dir)
        .with_chunk_size(chunk_size)
        .with_max_open_files(max_open_files)
        .with_rw_buf_size(usize::try_from(buf_size.as_u64()).unwrap_or(usize::MAX))
        .build()
    {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let timer = ProgressTimer::new();
    match sorter.sort_file(input, output) {
        Ok(stats) => log::info!(
            "sorted {} records ({} runs, {} merge passes) into {} in {}",
            stats.records,
            stats.runs,
            stats.merge_passes,
            output.display(),
            progress::format_elapsed(timer.elapsed())
        ),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

fn size_validator(value: &str) -> Result<(), String> {
    match parse_size(value) {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn count_validator(value: &str) -> Result<(), String> {
    match value.parse::<usize>() {
        Ok(count) if count > 0 => Ok(()),
        Ok(_) => Err("value must be positive".to_string()),
        Err(err) => Err(format!("integer expected: {}", err)),
    }
}

fn build_arg_parser() -> ArgMatches {
    Command::new("line-sort")
        .about("external sorter of `<number>. <text>` line files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .global(true)
                .takes_value(true)
                .default_value("info")
                .possible_values(LOG_LEVELS),
        )
        .subcommand(
            Command::new("generate")
                .about("generate a file of random records")
                .arg(
                    Arg::new("size")
                        .help("file size, e.g. 500MB, 10GB or a number of bytes")
                        .required(true)
                        .takes_value(true)
                        .validator(size_validator),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .takes_value(true)
                        .default_value("files/input_data.txt"),
                ),
        )
        .subcommand(
            Command::new("sort")
                .about("sort a file of records")
                .arg(
                    Arg::new("input")
                        .help("file to be sorted")
                        .takes_value(true)
                        .default_value("files/input_data.txt"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .takes_value(true)
                        .default_value("files/sorted_output.txt"),
                )
                .arg(
                    Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store temporary data")
                        .takes_value(true)
                        .default_value("files/.tmp_sort"),
                )
                .arg(
                    Arg::new("chunk_size")
                        .short('c')
                        .long("chunk-size")
                        .help("approximate in-memory chunk size")
                        .takes_value(true)
                        .default_value("1GB")
                        .validator(size_validator),
                )
                .arg(
                    Arg::new("threads")
                        .short('t')
                        .long("threads")
                        .help("number of chunks sorted in parallel")
                        .takes_value(true)
                        .default_value("4")
                        .validator(count_validator),
                )
                .arg(
                    Arg::new("max_open_files")
                        .short('m')
                        .long("max-open-files")
                        .help("maximum number of runs merged at once")
                        .takes_value(true)
                        .default_value("128")
                        .validator(count_validator),
                )
                .arg(
                    Arg::new("buf_size")
                        .short('b')
                        .long("buf-size")
                        .help("file read/write buffer size")
                        .takes_value(true)
                        .default_value("1MB")
                        .validator(size_validator),
                ),
        )
        .get_matches()
}

fn init_logger(args: &ArgMatches) {
    let log_level: log::LevelFilter = args.value_of_t_or_exit("log_level");

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();
}
