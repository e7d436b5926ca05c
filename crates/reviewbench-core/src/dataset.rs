//! Test-case providers.
//!
//! The on-disk layout is one directory per case:
//!
//! ```text
//! <root>/<case>/file.ts          source file (file.js, file.jsx, file.ts, file.tsx, or file.*)
//! <root>/<case>/diff.txt         diff with absolute line numbers
//! <root>/<case>/suggestions.json ground truth review
//! ```

use crate::errors::{EvalError, EvalResult};
use crate::model::{GroundTruth, TestCase};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub const DIFF_FILE: &str = "diff.txt";
pub const GROUND_TRUTH_FILE: &str = "suggestions.json";
const PREFERRED_SOURCE_FILES: [&str; 4] = ["file.js", "file.jsx", "file.ts", "file.tsx"];

pub trait TestCaseSource: Send + Sync {
    /// Case names in a stable order.
    fn list_names(&self) -> EvalResult<Vec<String>>;

    /// Load one case completely, or fail without producing a partial case.
    fn load(&self, name: &str) -> EvalResult<TestCase>;
}

/// Parse and validate a ground-truth payload.
pub fn parse_ground_truth(name: &str, text: &str) -> EvalResult<GroundTruth> {
    let gt: GroundTruth =
        serde_json::from_str(text).map_err(|e| EvalError::MalformedGroundTruth {
            name: name.to_string(),
            message: e.to_string(),
        })?;
    gt.validate()
        .map_err(|message| EvalError::MalformedGroundTruth {
            name: name.to_string(),
            message,
        })?;
    Ok(gt)
}

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn case_dir(&self, name: &str) -> EvalResult<PathBuf> {
        let rel = Path::new(name);
        let safe = !name.trim().is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(EvalError::not_found(
                format!("test case '{name}'"),
                self.root.join(name),
            ));
        }
        let dir = self.root.join(rel);
        if !dir.is_dir() {
            return Err(EvalError::not_found(format!("test case '{name}'"), dir));
        }
        Ok(dir)
    }

    fn source_file(dir: &Path, name: &str) -> EvalResult<PathBuf> {
        for candidate in PREFERRED_SOURCE_FILES {
            let path = dir.join(candidate);
            if path.is_file() {
                return Ok(path);
            }
        }

        let read = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
        let mut others: Vec<PathBuf> = read
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_stem().and_then(|s| s.to_str()) == Some("file") && p.extension().is_some()
            })
            .collect();
        others.sort();
        others.into_iter().next().ok_or_else(|| {
            EvalError::not_found(format!("source file for test case '{name}'"), dir.join("file.*"))
        })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> EvalError {
    EvalError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_part(path: &Path, what: String) -> EvalResult<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => EvalError::not_found(what, path),
        _ => io_error(path, e),
    })
}

impl TestCaseSource for DirectorySource {
    fn list_names(&self) -> EvalResult<Vec<String>> {
        if !self.root.is_dir() {
            return Err(EvalError::not_found("test case corpus", &self.root));
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> EvalResult<TestCase> {
        let dir = self.case_dir(name)?;

        let file_path = Self::source_file(&dir, name)?;
        let file_content = read_part(&file_path, format!("source file for test case '{name}'"))?;
        let diff_text = read_part(&dir.join(DIFF_FILE), format!("diff for test case '{name}'"))?;
        let gt_text = read_part(
            &dir.join(GROUND_TRUTH_FILE),
            format!("ground truth for test case '{name}'"),
        )?;
        let ground_truth = parse_ground_truth(name, &gt_text)?;

        tracing::debug!(
            test_case = name,
            file = %file_path.display(),
            suggestions = ground_truth.code_suggestions.len(),
            "test case loaded"
        );
        Ok(TestCase {
            name: name.to_string(),
            file_content,
            diff_text,
            ground_truth,
        })
    }
}

/// Cases held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    cases: Vec<TestCase>,
}

impl MemorySource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

impl TestCaseSource for MemorySource {
    fn list_names(&self) -> EvalResult<Vec<String>> {
        Ok(self.cases.iter().map(|c| c.name.clone()).collect())
    }

    fn load(&self, name: &str) -> EvalResult<TestCase> {
        self.cases
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| EvalError::not_found(format!("test case '{name}'"), name))
    }
}
