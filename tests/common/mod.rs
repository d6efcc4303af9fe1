//! Loader for the `.match` case files under `tests/cases`.
//!
//! Each non-blank line that does not start with `#` has the form
//! `<expression> => <outcome>`, where the outcome is `ok`, `ok: <canonical>`
//! or the exact diagnostic the expression must produce.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Valid,
    /// Valid, and `Display` of the parsed expression must match.
    Canonical(String),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Case {
    pub file: PathBuf,
    pub line: usize,
    pub input: String,
    pub outcome: Outcome,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

/// Discovers every case in every `.match` file under `dir`, in path order.
pub fn load_cases(dir: &Path) -> Result<Vec<Case>, String> {
    let mut cases = Vec::new();
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map_or(false, |ext| ext == "match"))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    for file in files {
        let text = std::fs::read_to_string(&file).map_err(|e| format!("failed to read {}: {e}", file.display()))?;
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (input, expected) = line
                .split_once(" => ")
                .ok_or_else(|| format!("{}:{}: missing ` => '", file.display(), index + 1))?;
            let outcome = match expected.trim() {
                "ok" => Outcome::Valid,
                other => match other.strip_prefix("ok:") {
                    Some(canonical) => Outcome::Canonical(canonical.trim().to_string()),
                    None => Outcome::Invalid(other.to_string()),
                },
            };
            cases.push(Case {
                file: file.clone(),
                line: index + 1,
                input: input.trim().to_string(),
                outcome,
            });
        }
    }
    Ok(cases)
}
