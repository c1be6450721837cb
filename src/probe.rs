//! Archive size probe that scrapes a summary tool's diagnostic output.
//!
//! The tool is run as if from the command line,
//! `zpaq add "" <path> -method <m> -threads <n>`, with its standard output
//! discarded and its standard error captured. The last `= <number> MB` in
//! the captured text is the archive size.

use std::fs::File;
use std::io;
use std::io::{BufReader, Write};
use std::sync::{Mutex, OnceLock, PoisonError};

use bytesize::ByteSize;
use regex::Regex;
use tracing::debug;

use crate::codec::CompressParams;
use crate::errors::*;
use crate::parallel::compress_size_parallel;

const USAGE: &str = "usage: add <archive> <files..> [-method M] [-threads N]";

/// Probes share process-wide output streams and must not overlap.
static PROBE_LOCK: Mutex<()> = Mutex::new(());

/// A program that reports on its work by printing.
pub trait SummaryTool {
    /// Run with command-line `args` (program name first); returns the exit
    /// status.
    fn run(&self, args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32;
}

/// The built-in tool: measures what `add` would write using the parallel
/// size pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveSizeTool;

impl ArchiveSizeTool {
    fn add(&self, args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
        let mut args = args.iter().skip(1);
        if args.next().map(String::as_str) != Some("add") {
            return Err(Error::State(USAGE));
        }
        let _archive = args.next().ok_or(Error::State(USAGE))?;

        let mut files = Vec::new();
        let mut method = "1";
        let mut threads = 1_usize;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-method" => {
                    method = args.next().map(String::as_str).ok_or(Error::State(USAGE))?
                }
                "-threads" => {
                    let n: i64 = args
                        .next()
                        .and_then(|n| n.parse().ok())
                        .ok_or(Error::State(USAGE))?;
                    threads = n.max(1) as usize;
                }
                file => files.push(file),
            }
        }

        let params = CompressParams::new(method);
        let (mut total_in, mut total_out) = (0_u64, 0_u64);
        for file in &files {
            let input = File::open(file)?;
            let len = input.metadata()?.len();
            let size = compress_size_parallel(
                BufReader::new(input),
                &params.filename(file.as_bytes()),
                threads,
            )?;
            writeln!(stdout, "+ {} {} -> {}", file, len, size)?;
            total_in += len;
            total_out += size;
        }
        writeln!(
            stderr,
            "{} file(s), {} -> {} = {:.6} MB",
            files.len(),
            ByteSize(total_in).to_string_as(true),
            ByteSize(total_out).to_string_as(true),
            total_out as f64 / 1e6
        )?;
        Ok(())
    }
}

impl SummaryTool for ArchiveSizeTool {
    fn run(&self, args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
        match self.add(args, stdout, stderr) {
            Ok(()) => 0,
            Err(e) => {
                let _ = writeln!(stderr, "error: {}", e);
                1
            }
        }
    }
}

/// Size in bytes of an archive holding only `path`, as reported by
/// [`ArchiveSizeTool`].
pub fn archive_size_file(path: &str, method: &str, threads: i32) -> Result<u64> {
    archive_size_file_with(&ArchiveSizeTool, path, method, threads)
}

pub fn archive_size_file_with<T: SummaryTool + ?Sized>(
    tool: &T,
    path: &str,
    method: &str,
    threads: i32,
) -> Result<u64> {
    if path.is_empty() || method.is_empty() {
        return Err(Error::State("path and method must not be empty"));
    }
    let args: Vec<String> = ["zpaq", "add", "", path, "-method", method, "-threads"]
        .iter()
        .map(|s| s.to_string())
        .chain([threads.to_string()])
        .collect();

    let mut captured = Vec::new();
    let status = {
        let _guard = PROBE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        tool.run(&args, &mut io::sink(), &mut captured)
    };
    let captured = String::from_utf8_lossy(&captured);
    debug!("summary tool exited with {}: {:?}", status, captured);

    let mb = parse_last_archive_mb(&captured).ok_or(Error::Summary)?;
    if status != 0 {
        return Err(Error::Tool(status));
    }
    Ok(mb_to_bytes(mb))
}

static SUMMARY: OnceLock<Option<Regex>> = OnceLock::new();

fn summary_pattern() -> Option<&'static Regex> {
    SUMMARY
        .get_or_init(|| Regex::new(r"=[ \t]*([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)[ \t]*MB").ok())
        .as_ref()
}

/// The number in the last `= <number> MB` of `text`.
pub fn parse_last_archive_mb(text: &str) -> Option<f64> {
    let last = summary_pattern()?.captures_iter(text).last()?;
    last.get(1)?.as_str().parse().ok()
}

fn mb_to_bytes(mb: f64) -> u64 {
    let bytes = mb * 1e6;
    if bytes <= 0.0 {
        0
    } else {
        (bytes + 0.5) as u64
    }
}
