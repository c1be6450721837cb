use std::fs;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use zpack::probe::{archive_size_file, archive_size_file_with, SummaryTool};
use zpack::{compress_size_parallel, CompressParams, Error};

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str, data: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("zpack-{}-{}", std::process::id(), name));
        fs::write(&path, data).unwrap();
        Self(path)
    }

    fn path(&self) -> &str {
        self.0.to_str().unwrap()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn probe_matches_the_size_pipeline() {
    let data: Vec<u8> = (0..3_000_000_u32).map(|i| (i % 97) as u8 ^ (i >> 13) as u8).collect();
    let file = TempFile::new("probe", &data);
    for (method, threads) in [("1", 1), ("00", 4), ("x2.9", 0)] {
        let expected = compress_size_parallel(
            BufReader::new(fs::File::open(file.path()).unwrap()),
            &CompressParams::new(method).filename(file.path().as_bytes()),
            1,
        )
        .unwrap();
        assert_eq!(archive_size_file(file.path(), method, threads).unwrap(), expected, "{}", method);
    }
}

#[test]
fn missing_file_is_a_summary_error() {
    let e = archive_size_file("/nonexistent/zpack/input", "1", 1).unwrap_err();
    assert!(matches!(e, Error::Summary), "{}", e);
}

#[test]
fn empty_arguments_are_rejected() {
    assert!(matches!(archive_size_file("", "1", 1), Err(Error::State(_))));
    assert!(matches!(archive_size_file("x", "", 1), Err(Error::State(_))));
}

/// Prints a fixed text to stderr and exits with a fixed status.
struct Canned(&'static str, i32);

impl SummaryTool for Canned {
    fn run(&self, args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
        assert_eq!(args[1..4], ["add", "", "in.bin"]);
        assert_eq!(args[4..], ["-method", "5", "-threads", "3"]);
        writeln!(stdout, "this is discarded = 99 MB").unwrap();
        stderr.write_all(self.0.as_bytes()).unwrap();
        self.1
    }
}

#[test]
fn last_summary_line_wins() {
    let tool = Canned("1 file(s) = 9.000000 MB\nall: 2 -> 3 = 0.001234 MB\n", 0);
    assert_eq!(archive_size_file_with(&tool, "in.bin", "5", 3).unwrap(), 1234);

    let tool = Canned("shrunk to = 0 MB", 0);
    assert_eq!(archive_size_file_with(&tool, "in.bin", "5", 3).unwrap(), 0);
}

#[test]
fn tool_failures() {
    let tool = Canned("no summary here", 0);
    assert!(matches!(archive_size_file_with(&tool, "in.bin", "5", 3), Err(Error::Summary)));

    let tool = Canned("partial = 1.5 MB", 2);
    assert!(matches!(archive_size_file_with(&tool, "in.bin", "5", 3), Err(Error::Tool(2))));
}
