use std::fs;
use std::io::{self, prelude::*};
use std::path;

use env_logger;
use log;
use rand::Rng;

use heap_ext_sort::{ExternalSorter, ExternalSorterBuilder, RECORD_SIZE};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let mut input_writer = io::BufWriter::new(fs::File::create("input.txt").unwrap());
    let mut rng = rand::thread_rng();
    for _ in 0..1_000_000 {
        writeln!(input_writer, "{}", rng.gen_range(-1_000_000..=1_000_000)).unwrap();
    }
    input_writer.flush().unwrap();

    let sorter: ExternalSorter = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_run_size(128 * 1024 * RECORD_SIZE as u64)
        .build()
        .unwrap();

    let input_reader = fs::File::open("input.txt").unwrap();
    let output_writer = fs::File::create("output.txt").unwrap();

    let summary = sorter.sort(input_reader, output_writer).unwrap();
    log::info!("{}", summary);
}
