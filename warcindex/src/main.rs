#[macro_use]
extern crate log;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{command, value_parser, Arg, ArgMatches, Command};
use indicatif::ProgressBar;
use thiserror::Error;

use warcindex::{
    index_records, open_writer, CdxStore, ConfigError, Counters, FilterSet, IndexError,
    IndexOptions, StoreError, WriteError,
};
use warcio::{OpenError, ReadError, ReadOptions, RecordReader};

const DEFAULT_DB: &str = "cdx.db";
/// Longest target URI printed by `ls`, in characters.
const LS_URI_WIDTH: usize = 100;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no index exists in {0:?}")]
    NoStore(PathBuf),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("failed to encode entry: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            _ => 1,
        }
    }
}

fn cli() -> Command<'static> {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("index")
                .about("Write a CDX index of WARC files")
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .takes_value(true)
                        .value_name("FORMAT")
                        .default_value("cdxj")
                        .help("Index format: cdx, cdxj, cdxpb or db"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .takes_value(true)
                        .value_name("OUT")
                        .help("Create this file for the index instead of writing to stdout"),
                )
                .arg(
                    Arg::new("db")
                        .long("db")
                        .takes_value(true)
                        .value_name("DIR")
                        .default_value(DEFAULT_DB)
                        .help("Directory of the index store used by the db format"),
                )
                .arg(
                    Arg::new("FILE")
                        .required(true)
                        .multiple_values(true)
                        .help("WARC files to index, in order"),
                ),
        )
        .subcommand(
            Command::new("ls")
                .about("List the records in a WARC file")
                .arg(
                    Arg::new("offset")
                        .short('o')
                        .long("offset")
                        .takes_value(true)
                        .value_parser(value_parser!(u64))
                        .help("Start at the record at this byte offset"),
                )
                .arg(
                    Arg::new("count")
                        .short('c')
                        .long("count")
                        .takes_value(true)
                        .value_parser(value_parser!(u64))
                        .help("List at most this many records, or all if 0 [default: 1 if an offset is given]"),
                )
                .arg(
                    Arg::new("strict")
                        .short('s')
                        .long("strict")
                        .help("Stop at the first malformed record"),
                )
                .arg(
                    Arg::new("id")
                        .long("id")
                        .takes_value(true)
                        .multiple_occurrences(true)
                        .value_name("ID")
                        .help("Only list records with this WARC-Record-ID"),
                )
                .arg(Arg::new("FILE").required(true)),
        )
        .subcommand(
            Command::new("query")
                .about("Print entries from an index store as CDXJ")
                .arg(
                    Arg::new("db")
                        .long("db")
                        .takes_value(true)
                        .value_name("DIR")
                        .default_value(DEFAULT_DB),
                )
                .arg(
                    Arg::new("filter")
                        .short('F')
                        .long("filter")
                        .takes_value(true)
                        .multiple_occurrences(true)
                        .value_name("FILTER")
                        .help("Only print entries matching [!][=|~]field:value"),
                )
                .arg(Arg::new("PREFIX").help("Only print entries for URIs with this prefix")),
        )
}

fn main() {
    pretty_env_logger::init();
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("index", args)) => index(args),
        Some(("ls", args)) => ls(args),
        Some(("query", args)) => query(args),
        _ => unreachable!("clap requires a known subcommand"),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Get the name of a file as recorded in index entries.
fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_else(|| path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn crop(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

fn index(args: &ArgMatches) -> Result<(), CliError> {
    let options = IndexOptions {
        format: args.value_of("format").unwrap_or("cdxj").to_owned(),
        output: args.value_of("output").map(PathBuf::from),
        db_dir: PathBuf::from(args.value_of("db").unwrap_or(DEFAULT_DB)),
    };
    let mut writer = open_writer(&options)?;
    writer.init()?;

    let progress = ProgressBar::new_spinner();
    let mut counters = Counters::default();
    for path in args.values_of("FILE").into_iter().flatten() {
        let path = Path::new(path);
        let name = file_name(path);
        info!("Indexing {:?}", path);
        let mut reader = RecordReader::open(path, 0, ReadOptions::default())?;

        let result = index_records(&mut reader, &name, writer.as_mut(), &mut counters, |c| {
            progress.set_message(format!("Count: {}", c.records))
        });
        reader.close();

        if let Err(e) = result {
            progress.finish_and_clear();
            match e {
                IndexError::Read(ref read) => eprintln!(
                    "Error: {}, rec num: {}, Offset {}",
                    read.kind, read.record, read.offset
                ),
                IndexError::Write { offset, ref source } => eprintln!(
                    "Error: {}, rec num: {}, Offset {}",
                    source, counters.records, offset
                ),
            }
            if let Err(close) = writer.close() {
                error!("Failed to close index writer: {}", close);
            }
            eprintln!("Count: {}", counters.records);
            return Err(e.into());
        }
    }

    progress.finish_and_clear();
    writer.close()?;
    if counters.rejected > 0 || counters.read_errors > 0 {
        warn!(
            "{} records were not indexed and {} damaged records were skipped",
            counters.rejected, counters.read_errors
        );
    }
    eprintln!("Count: {}", counters.records);
    Ok(())
}

/// The most records `ls` should list, if there is a limit.
fn record_limit(args: &ArgMatches) -> Option<u64> {
    match args.get_one::<u64>("count").copied() {
        // Zero lists everything
        Some(0) => None,
        Some(n) => Some(n),
        None => args.get_one::<u64>("offset").map(|_| 1),
    }
}

fn ls(args: &ArgMatches) -> Result<(), CliError> {
    let path = Path::new(args.value_of("FILE").expect("FILE is a required argument"));
    let offset = args.get_one::<u64>("offset").copied();
    let count = record_limit(args);
    let options = if args.is_present("strict") {
        ReadOptions::strict()
    } else {
        ReadOptions::default()
    };
    let ids: Vec<&str> = args.values_of("id").into_iter().flatten().collect();

    let mut reader = RecordReader::open(path, offset.unwrap_or(0), options)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut listed = 0u64;
    while count.map_or(true, |n| listed < n) {
        let (record, offset) = match reader.next() {
            None => break,
            Some(Ok(x)) => x,
            Some(Err(e)) if e.is_fatal() => {
                eprintln!(
                    "Error: {}, rec num: {}, Offset {}",
                    e.kind, e.record, e.offset
                );
                eprintln!("Count: {}", listed);
                return Err(e.into());
            }
            Some(Err(e)) => {
                warn!("{}", e);
                continue;
            }
        };

        let id = record.record_id().unwrap_or("-");
        if !ids.is_empty() && !ids.contains(&id) {
            continue;
        }
        writeln!(
            out,
            "{}\t{}\t{} \t{}",
            offset,
            id,
            record.record_type(),
            crop(record.header().target_uri().unwrap_or("-"), LS_URI_WIDTH)
        )?;
        listed += 1;
    }
    reader.close();

    eprintln!("Count: {}", listed);
    Ok(())
}

fn query(args: &ArgMatches) -> Result<(), CliError> {
    let filters = FilterSet::parse(args.values_of("filter").into_iter().flatten())
        .map_err(ConfigError::from)?;
    let dir = PathBuf::from(args.value_of("db").unwrap_or(DEFAULT_DB));
    if !dir.is_dir() {
        return Err(CliError::NoStore(dir));
    }

    let store = CdxStore::open(&dir)?;
    let entries = store.query(&filters, args.value_of("PREFIX"))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        writeln!(out, "{}", entry.to_cdxj_line()?)?;
    }

    eprintln!("Count: {}", entries.len());
    Ok(())
}
