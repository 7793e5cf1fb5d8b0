//! CLI entry point for rust-evio
//!
//! Provides command-line access to:
//! - Decoding an EVIO file through the full pipeline
//! - Scanning an EVIO file's top-level banks without decoding them
//! - Printing the effective configuration
//!
//! # Usage
//!
//! Decode with 8 workers, in stream order, dumping events as JSON lines:
//! ```bash
//! rust-evio decode run_030300.evio --workers 8 --strict-order --dump
//! ```
//!
//! Show the configuration after file and `RUST_EVIO_*` overrides:
//! ```bash
//! RUST_EVIO_PIPELINE__WORKERS=4 rust-evio config
//! ```
//!
//! List the top-level banks of the first 10 blocks:
//! ```bash
//! rust-evio scan run_030300.evio --max-blocks 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evio_pool::Pooled;
use rust_evio::config::{DecodeConfig, DEFAULT_CONFIG_PATH};
use rust_evio::cursor::WordCursor;
use rust_evio::error::{EvioError, ReadError};
use rust_evio::logging;
use rust_evio::parser::BankHeader;
use rust_evio::pipeline::{DecodePipeline, JsonLinesSink};
use rust_evio::reader::{BlockReader, EvioFileReader, ReadStatus};
use rust_evio::swap::swap_block;
use rust_evio::DecodedEvent;
use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rust-evio")]
#[command(about = "Decode EVIO detector readout files", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase verbosity (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a file through the pipeline
    Decode {
        /// EVIO file
        file: PathBuf,

        /// Decode worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Deliver events in stream order
        #[arg(long)]
        strict_order: bool,

        /// Only decode these readout controllers
        #[arg(long = "rocid", value_name = "ROCID")]
        rocids: Vec<u32>,

        /// Rewind at end of file and keep decoding
        #[arg(long = "loop")]
        loop_forever: bool,

        /// Stop after this many blocks
        #[arg(long)]
        max_blocks: Option<u64>,

        /// Write every decoded event to stdout as a JSON line
        #[arg(long)]
        dump: bool,

        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// List top-level banks without decoding them
    Scan {
        /// EVIO file
        file: PathBuf,

        /// Stop after this many blocks
        #[arg(long)]
        max_blocks: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match DecodeConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(2);
        }
    };
    config.verbosity = config.verbosity.saturating_add(cli.verbose).min(10);
    if let Err(err) = logging::init_from_config(&config) {
        eprintln!("Error: {err}");
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Commands::Decode {
            file,
            workers,
            strict_order,
            rocids,
            loop_forever,
            max_blocks,
            dump,
            json,
        } => {
            if let Some(workers) = workers {
                config.pipeline.workers = workers;
                config.pipeline.in_flight = config.pipeline.in_flight.max(workers);
            }
            config.pipeline.strict_order |= strict_order;
            config.pipeline.loop_forever |= loop_forever;
            if max_blocks.is_some() {
                config.pipeline.max_blocks = max_blocks;
            }
            if !rocids.is_empty() {
                config.rocids = rocids;
            }
            run_decode(file, config, dump, json)
        }
        Commands::Config => config
            .to_toml()
            .map(|text| print!("{text}"))
            .map_err(|err| EvioError::from(err).into()),
        Commands::Scan { file, max_blocks } => run_scan(file, max_blocks),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<EvioError>()
                .map_or(1, EvioError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run_decode(file: PathBuf, config: DecodeConfig, dump: bool, json: bool) -> Result<()> {
    config
        .validate()
        .map_err(|msg| EvioError::Config(rust_evio::error::ConfigError::Invalid(msg)))?;
    let reader = EvioFileReader::open(&file).map_err(EvioError::from)?;

    let stats = if dump {
        let sink = JsonLinesSink::new(BufWriter::new(io::stdout()));
        let mut pipeline = DecodePipeline::new(reader, sink, config);
        let stats = pipeline.run()?;
        let (_, sink) = pipeline.into_parts();
        sink.finish().context("Failed to write decoded events")?;
        stats
    } else {
        let discard = |_: u64, _: Pooled<DecodedEvent>| {};
        DecodePipeline::new(reader, discard, config).run()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        eprintln!(
            "{}: {} blocks, {} events, {} units abandoned",
            file.display(),
            stats.blocks_read,
            stats.events_delivered,
            stats.units_abandoned
        );
    }
    Ok(())
}

#[derive(Debug, Default)]
struct TagSummary {
    banks: u64,
    words: u64,
}

fn run_scan(file: PathBuf, max_blocks: Option<u64>) -> Result<()> {
    let mut reader = EvioFileReader::open(&file).map_err(EvioError::from)?;
    let mut buffer = vec![0u32; rust_evio::block::DEFAULT_BUFFER_WORDS];
    let mut summary: BTreeMap<u32, TagSummary> = BTreeMap::new();
    let mut blocks = 0u64;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    while max_blocks.map_or(true, |max| blocks < max) {
        let mut outcome = reader.read(&mut buffer);
        if let ReadStatus::BufferTooSmall { required } = outcome.status {
            buffer.resize(required, 0);
            outcome = reader.read(&mut buffer);
        }
        let len = match outcome.status {
            ReadStatus::Ok { len } => len,
            ReadStatus::EndOfStream => break,
            status => {
                let err = status.into_error().unwrap_or(ReadError::EndOfStream);
                return Err(EvioError::from(err).into());
            }
        };

        let words = &mut buffer[..len];
        if outcome.swap_needed {
            swap_block(words).map_err(EvioError::from)?;
        }
        let mut cur = WordCursor::new(words);
        while !cur.is_empty() {
            let (header, _) = BankHeader::read(&mut cur).map_err(EvioError::from)?;
            writeln!(
                out,
                "block {blocks:>6}  word {:>8}  tag {:#06x}  type {:?}  num {:>3}  len {}",
                header.offset, header.tag, header.data_type, header.num, header.payload_len
            )?;
            let entry = summary.entry(header.tag).or_default();
            entry.banks += 1;
            entry.words += header.payload_len as u64;
        }
        blocks += 1;
    }

    writeln!(out, "{blocks} blocks")?;
    for (tag, entry) in &summary {
        writeln!(out, "  tag {tag:#06x}: {} banks, {} words", entry.banks, entry.words)?;
    }
    Ok(())
}
