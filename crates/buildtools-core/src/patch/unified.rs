//! Tolerant unified-diff parsing.
//!
//! Everything up to and including the first `+++` line is prelude and
//! ignored. Patches whose header was stripped get a placeholder `+++` line
//! via [`ensure_header`]; the target file then comes from the patch's own
//! name rather than the header. Hunk bodies are consumed by the counts in
//! their `@@` header, so hunks may carry any amount of context.

use std::sync::OnceLock;

use regex::Regex;

use super::error::PatchError;

/// How many leading lines are searched for a `+++` header.
pub const HEADER_SCAN_LINES: usize = 3;

const HEADER_PLACEHOLDER: &str = "+++";

fn hunk_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@").expect("valid hunk regex")
    })
}

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Removed(String),
    Added(String),
}

/// A single `@@` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects in the original file.
    pub fn pre_image(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Removed(text) => Some(text.as_str()),
            HunkLine::Added(_) => None,
        })
    }

    /// Lines the hunk produces.
    pub fn post_image(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Added(text) => Some(text.as_str()),
            HunkLine::Removed(_) => None,
        })
    }
}

/// Parsed single-file unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDiff {
    pub hunks: Vec<Hunk>,
}

/// Prepend a placeholder `+++` line unless one appears within the first
/// [`HEADER_SCAN_LINES`] lines. Returns `true` when a line was added.
pub fn ensure_header(lines: &mut Vec<String>) -> bool {
    let found = lines
        .iter()
        .take(HEADER_SCAN_LINES)
        .any(|line| line.starts_with("+++"));
    if !found {
        lines.insert(0, HEADER_PLACEHOLDER.to_string());
    }
    !found
}

impl UnifiedDiff {
    /// Parse the text of a patch file (header handling included).
    pub fn parse_str(text: &str) -> Result<Self, PatchError> {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        ensure_header(&mut lines);
        Self::parse(&lines)
    }

    /// Parse patch lines. Lines before the first `+++` are skipped.
    pub fn parse(lines: &[String]) -> Result<Self, PatchError> {
        let body_start = match lines.iter().position(|l| l.starts_with("+++")) {
            Some(idx) => idx + 1,
            None => return Ok(UnifiedDiff::default()),
        };

        let mut hunks = Vec::new();
        let mut idx = body_start;
        while idx < lines.len() {
            let line = &lines[idx];
            if line.starts_with("@@") {
                let (hunk, next) = parse_hunk(lines, idx, hunks.len() + 1)?;
                hunks.push(hunk);
                idx = next;
                continue;
            }
            if !is_between_hunks_noise(line) {
                return Err(PatchError::UnexpectedLine {
                    line: idx + 1,
                    text: line.clone(),
                });
            }
            idx += 1;
        }

        Ok(UnifiedDiff { hunks })
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Lines tolerated between hunks: blanks, file headers, git metadata and
/// "no newline" markers.
fn is_between_hunks_noise(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with("---")
        || line.starts_with("+++")
        || line.starts_with('\\')
        || line.starts_with("diff ")
        || line.starts_with("index ")
}

fn parse_count(text: Option<regex::Match<'_>>) -> usize {
    text.and_then(|m| m.as_str().parse().ok()).unwrap_or(1)
}

fn parse_hunk(lines: &[String], header_idx: usize, number: usize) -> Result<(Hunk, usize), PatchError> {
    let header = &lines[header_idx];
    let caps = hunk_header()
        .captures(header)
        .ok_or_else(|| PatchError::MalformedHunkHeader {
            line: header_idx + 1,
            text: header.clone(),
        })?;

    let start = |i: usize| -> Result<usize, PatchError> {
        caps[i].parse().map_err(|_| PatchError::MalformedHunkHeader {
            line: header_idx + 1,
            text: header.clone(),
        })
    };
    let old_start = start(1)?;
    let new_start = start(3)?;
    let old_len = parse_count(caps.get(2));
    let new_len = parse_count(caps.get(4));

    let mut old_left = old_len;
    let mut new_left = new_len;
    let mut body = Vec::with_capacity(old_len.max(new_len));
    let mut idx = header_idx + 1;

    while old_left > 0 || new_left > 0 {
        let Some(line) = lines.get(idx) else {
            return Err(PatchError::TruncatedHunk { hunk: number });
        };
        let overflow = PatchError::HunkOverflow {
            hunk: number,
            line: idx + 1,
        };

        if line.starts_with('\\') {
            idx += 1;
            continue;
        }

        // Editors often strip the single space of an empty context line.
        let (marker, text) = match line.chars().next() {
            Some(c) => (c, &line[c.len_utf8()..]),
            None => (' ', ""),
        };
        match marker {
            ' ' => {
                if old_left == 0 || new_left == 0 {
                    return Err(overflow);
                }
                old_left -= 1;
                new_left -= 1;
                body.push(HunkLine::Context(text.to_string()));
            }
            '-' => {
                if old_left == 0 {
                    return Err(overflow);
                }
                old_left -= 1;
                body.push(HunkLine::Removed(text.to_string()));
            }
            '+' => {
                if new_left == 0 {
                    return Err(overflow);
                }
                new_left -= 1;
                body.push(HunkLine::Added(text.to_string()));
            }
            _ => {
                return Err(PatchError::UnexpectedLine {
                    line: idx + 1,
                    text: line.clone(),
                })
            }
        }
        idx += 1;
    }

    let hunk = Hunk {
        old_start,
        old_len,
        new_start,
        new_len,
        lines: body,
    };
    Ok((hunk, idx))
}
