//! File/stdin driver (spec.md §1's other external collaborator, alongside
//! the parser). A `Coordinator` is a fresh instance per input file, matching
//! `original_source/main.py`'s per-test-case reset.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use acdb_core::Coordinator;

use crate::format::print_all;
use crate::parser::{is_ignorable, parse_line};

/// Runs every line of `text` through a fresh [`Coordinator`], printing the
/// trace as it goes. Parse/apply errors are reported to stderr and do not
/// stop the run (spec.md §7: invalid-command errors "surface to the driver
/// and abort the instruction", not the whole run).
pub fn run_text(text: &str) {
    let mut coordinator = Coordinator::new();
    for line in text.lines() {
        if is_ignorable(line) {
            continue;
        }
        run_line(&mut coordinator, line);
    }
}

fn run_line(coordinator: &mut Coordinator, line: &str) {
    match parse_line(line) {
        Ok(instr) => {
            if let Err(e) = coordinator.process(instr) {
                eprintln!("error: {e}");
            }
            print_all(&coordinator.drain_events());
        }
        Err(e) => eprintln!("error: {e}"),
    }
}

/// Runs a single file path as one test case.
pub fn run_file(path: &Path) -> io::Result<()> {
    let text = fs::read_to_string(path)?;
    println!("running {}", path.display());
    run_text(&text);
    Ok(())
}

/// Expands a directory into its `test*`-prefixed entries and runs each
/// independently (spec.md §6's `[SUPPLEMENT]`: `original_source/main.py`'s
/// directory-of-test-cases convention).
pub fn run_directory(dir: &Path) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("test")))
        .collect();
    entries.sort();
    for entry in entries {
        run_file(&entry)?;
    }
    Ok(())
}

/// Runs a path that may be a file or a directory of test cases.
pub fn run_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        run_directory(path)
    } else {
        run_file(path)
    }
}

/// Interactive stdin loop. A literal `exit` line ends the loop, matching
/// `original_source/main.py`'s stdin branch exactly.
pub fn run_stdin() {
    let stdin = io::stdin();
    let mut coordinator = Coordinator::new();
    println!("reading from stdin, enter \"exit\" to quit");
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                if line.trim() == "exit" {
                    break;
                }
                if !is_ignorable(&line) {
                    run_line(&mut coordinator, &line);
                }
            }
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn run_text_processes_a_full_scenario() {
        run_text("begin(T1)\nW(T1,x1,101)\nend(T1)\nbegin(T2)\nR(T2,x1)\nend(T2)\n");
    }

    #[test]
    fn run_file_reads_and_executes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "begin(T1)\nW(T1,x2,5)\nend(T1)").unwrap();
        run_file(f.path()).unwrap();
    }

    #[test]
    fn run_directory_runs_only_test_prefixed_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test1"), "begin(T1)\nend(T1)\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "begin(T2)\nend(T2)\n").unwrap();
        run_directory(dir.path()).unwrap();
    }
}
