use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use bytesize::{ByteSize, MB};
use env_logger;
use log;

use line_sort::{generate_file, ExternalSorterBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    generate_file(Path::new("input.txt"), 20 * MB).unwrap();

    let sorter = ExternalSorterBuilder::new()
        .with_tmp_dir(Path::new("./"))
        .with_chunk_size(ByteSize::mb(2))
        .with_max_open_files(4)
        .build()
        .unwrap();

    let stats = sorter.sort_file(Path::new("input.txt"), Path::new("output.txt")).unwrap();
    log::info!("{:?}", stats);

    let output_reader = io::BufReader::new(fs::File::open("output.txt").unwrap());
    for line in output_reader.lines().take(5).map(Result::unwrap) {
        println!("{}", line);
    }
}
