//! In-memory fakes for the runner and fetcher (testing only)
//!
//! `FakeRunner` records every command and materializes the files the real
//! tools would produce, so the pipeline's existence checks behave as they
//! do against real tools. `FakeFetcher` serves canned responses.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use buildtools_core::{fsutil, BuildError, Fetcher, Result};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::runner::{ToolCommand, ToolRun, ToolRunner};

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

/// Records commands and fakes their outputs.
///
/// - a command with `-o <path>` writes a jar holding `jar_entries` there;
/// - a fernflower command writes `decompiled` sources into its output dir;
/// - a command run in a directory registered with `with_build_output`
///   whose arguments include `install` creates the registered file.
#[derive(Debug)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    jar_entries: Vec<(String, Vec<u8>)>,
    decompiled: Vec<(String, String)>,
    build_outputs: Vec<(PathBuf, PathBuf)>,
    fail_on: Option<String>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            jar_entries: vec![
                ("net/minecraft/server/Foo.class".to_string(), b"\xca\xfe\xba\xbe".to_vec()),
                ("org/bukkit/Other.class".to_string(), b"\xca\xfe\xba\xbe".to_vec()),
            ],
            decompiled: Vec::new(),
            build_outputs: Vec::new(),
            fail_on: None,
        }
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source written under the decompiler's output directory.
    pub fn with_decompiled(mut self, relative: &str, content: &str) -> Self {
        self.decompiled.push((relative.to_string(), content.to_string()));
        self
    }

    /// File created when an `install` runs in `cwd`.
    pub fn with_build_output(mut self, cwd: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        self.build_outputs.push((cwd.into(), relative.into()));
        self
    }

    /// Exit with status 1 for any command whose command line contains
    /// `pattern`, producing nothing.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands whose command line contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.display().contains(pattern))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn materialize(&self, command: &ToolCommand) -> Result<()> {
        let resolve = |p: &str| command.cwd.join(p);

        if let Some(pos) = command.args.iter().position(|a| a == "-o") {
            if let Some(out) = command.args.get(pos + 1) {
                write_jar(&resolve(out), &self.jar_entries)?;
            }
        }

        if command.args.iter().any(|a| a.ends_with("fernflower.jar")) {
            if let Some(out) = command.args.last() {
                let out = resolve(out);
                for (relative, content) in &self.decompiled {
                    let path = out.join(relative);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, content)?;
                }
            }
        }

        if command.args.iter().any(|a| a == "install") {
            for (cwd, relative) in &self.build_outputs {
                if *cwd == command.cwd {
                    let path = cwd.join(relative);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, b"jar")?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolRun> {
        self.calls.lock().unwrap().push(command.clone());
        let display = command.display();

        let failed = self
            .fail_on
            .as_deref()
            .is_some_and(|pattern| display.contains(pattern));
        if !failed {
            self.materialize(command)?;
        }

        Ok(ToolRun {
            command: display,
            exit_code: if failed { 1 } else { 0 },
            duration_ms: 0,
        })
    }
}

/// Write a jar (zip) with the given entries.
pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(fs::File::create(path)?);
    for (name, data) in entries {
        zip.start_file(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Fetcher serving canned bodies by URL. Unknown URLs fail as a network
/// error would.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn body(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BuildError::Network(format!("404 Not Found: {url}")))
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let body = self.body(url)?;
        String::from_utf8(body).map_err(|e| BuildError::Network(e.to_string()))
    }

    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        let body = self.body(url)?;
        fsutil::write_atomic(target, &body)
    }
}
