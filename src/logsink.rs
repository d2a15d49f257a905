//! Per-job textual output streams.
//!
//! Worker tasks carry a job key and write through here instead of
//! redirecting stdout; each key appends to its own `logs/<key>.log`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use anyhow::{anyhow, Context, Result};

pub struct LogSink {
	dir: PathBuf,
	files: Mutex<HashMap<String, File>>,
}

impl LogSink {
	pub fn new(dir: PathBuf) -> LogSink {
		LogSink {
			dir,
			files: Mutex::new(HashMap::new()),
		}
	}

	/// Appends one line to the stream of `key`. Keys may contain `/`, which
	/// nests the log files like the jars they describe.
	pub fn line(&self, key: &str, message: &str) -> Result<()> {
		let mut files = self.files.lock()
			.map_err(|_| anyhow!("log sink poisoned"))?;

		if !files.contains_key(key) {
			let path = self.dir.join(format!("{key}.log"));
			if let Some(parent) = path.parent() {
				std::fs::create_dir_all(parent)?;
			}
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&path)
				.with_context(|| anyhow!("failed to open log file {path:?}"))?;
			files.insert(key.to_owned(), file);
		}

		let file = files.get_mut(key)
			.with_context(|| anyhow!("log file for {key:?} vanished"))?;
		writeln!(file, "{message}")?;
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	#[test]
	fn appends_lines_per_key() {
		let dir = tempfile::tempdir().unwrap();
		let sink = LogSink::new(dir.path().to_path_buf());

		sink.line("mojang/1.0", "first").unwrap();
		sink.line("mojang/1.0", "second").unwrap();
		sink.line("other", "elsewhere").unwrap();

		let log = std::fs::read_to_string(dir.path().join("mojang/1.0.log")).unwrap();
		assert_eq!(log, "first\nsecond\n");
	}
}
