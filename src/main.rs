use std::fs;
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use heap_ext_sort::{ExternalSorterBuilder, MalformedPolicy, RmpCodec, RunCodec, TextCodec};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let format: Format = arg_parser.value_of_t_or_exit("format");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let run_size = arg_parser.value_of("run_size").expect("value has default");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));
    let malformed_policy = if arg_parser.is_present("lenient") {
        MalformedPolicy::Truncate
    } else {
        MalformedPolicy::Reject
    };

    let input = arg_parser.value_of("input").expect("value is required");
    if !path::Path::new(input).exists() {
        log::error!("input file not found: {}", input);
        process::exit(1);
    }
    let input_stream = match fs::File::open(input) {
        Ok(file) => file,
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");
    let output_stream = match fs::File::create(output) {
        Ok(file) => file,
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let options = SortOptions {
        run_size: run_size.parse::<ByteSize>().expect("value is pre-validated").as_u64(),
        threads,
        tmp_dir,
        malformed_policy,
    };

    match format {
        Format::Text => run_sort::<TextCodec>(options, input_stream, output_stream),
        Format::Msgpack => run_sort::<RmpCodec>(options, input_stream, output_stream),
    }
}

struct SortOptions<'a> {
    run_size: u64,
    threads: Option<usize>,
    tmp_dir: Option<&'a str>,
    malformed_policy: MalformedPolicy,
}

fn run_sort<C: RunCodec>(options: SortOptions, input: fs::File, output: fs::File) {
    let mut sorter_builder = ExternalSorterBuilder::<C>::new()
        .with_run_size(options.run_size)
        .with_malformed_policy(options.malformed_policy);
    if let Some(threads) = options.threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = options.tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    match sorter.sort(input, output) {
        Ok(summary) => log::info!("{}", summary),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Format {
    Text,
    Msgpack,
}

impl Format {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Format::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Format as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("heap-ext-sort")
        .about("external merge sort for integer files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file with whitespace delimited integers to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("run_size")
                .short('r')
                .long("run-size")
                .help("memory budget of a single sorted run")
                .takes_value(true)
                .default_value("64MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Run size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("format")
                .short('f')
                .long("format")
                .help("temporary run files format")
                .takes_value(true)
                .default_value("text")
                .possible_values(Format::possible_values()),
        )
        .arg(
            clap::Arg::new("lenient")
                .long("lenient")
                .help("stop reading input at the first non-numeric token instead of failing"),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel run sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
