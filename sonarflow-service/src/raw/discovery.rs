// Raw File Discovery
// Finds raw files for a dataset, classifies them and assigns transects

use crate::config::{Dataset, ParseError, ParseErrorKind};
use crate::error::{PipelineError, PipelineResult};
use crate::raw::chunk::{chunk_weekly, WeeklyBatch};
use crate::raw::classify::FilePattern;
use crate::raw::record::{file_name_of, RawFileRecord};
use crate::storage::FileSystem;

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static regex"))
}

fn transect_number_regex() -> &'static Regex {
    static TRANSECT: OnceLock<Regex> = OnceLock::new();
    TRANSECT.get_or_init(|| Regex::new(r"x(\d+)").expect("static regex"))
}

/// Render `{{ name }}` placeholders in a url path from dataset parameters
pub fn render_urlpath(
    urlpath: &str,
    parameters: &BTreeMap<String, serde_yaml::Value>,
) -> PipelineResult<String> {
    let mut missing = Vec::new();
    let rendered = placeholder_regex().replace_all(urlpath, |caps: &regex::Captures| {
        let name = &caps[1];
        match parameters.get(name) {
            Some(value) => yaml_scalar_to_string(value),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ParseError::new(
            format!(
                "parameters {} found in `urlpath` but not defined in `parameters`",
                missing.join(", ")
            ),
            ParseErrorKind::MissingParameter,
        )
        .into());
    }
    Ok(rendered.into_owned())
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Translate a glob (`*`, `**`, `?`) into an anchored regex
fn glob_to_regex(glob: &str) -> PipelineResult<Regex> {
    let mut pattern = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    pattern.push_str("(?:.*/)?");
                } else {
                    pattern.push_str(".*");
                }
            }
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| PipelineError::InvalidPattern {
        pattern: glob.to_string(),
        message: e.to_string(),
    })
}

/// List local files matching the dataset's rendered url path
pub fn glob_all_files(dataset: &Dataset) -> PipelineResult<Vec<String>> {
    let rendered = render_urlpath(&dataset.args.urlpath, &dataset.args.parameters)?;
    let rendered = rendered
        .strip_prefix("file://")
        .unwrap_or(&rendered)
        .to_string();

    let wildcard_at = rendered.find(|c: char| c == '*' || c == '?');
    let Some(wildcard_at) = wildcard_at else {
        let path = Path::new(&rendered);
        if path.is_dir() {
            return Ok(walk_files(path, None));
        }
        return if path.exists() {
            Ok(vec![rendered])
        } else {
            Ok(Vec::new())
        };
    };

    // Walk from the deepest directory that precedes the first wildcard
    let root_end = rendered[..wildcard_at].rfind('/').map(|i| i + 1).unwrap_or(0);
    let root = if root_end == 0 {
        PathBuf::from(".")
    } else {
        PathBuf::from(&rendered[..root_end])
    };
    let matcher = glob_to_regex(&rendered[root_end..])?;
    Ok(walk_files(&root, Some(&matcher)))
}

fn walk_files(root: &Path, matcher: Option<&Regex>) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| match matcher {
            Some(matcher) => entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| matcher.is_match(&rel.to_string_lossy().replace('\\', "/")))
                .unwrap_or(false),
            None => true,
        })
        .map(|entry| entry.path().to_string_lossy().to_string())
        .collect();
    files.sort();
    files
}

/// Classify raw file paths into records
pub fn parse_raw_paths(all_raw_files: &[String], dataset: &Dataset) -> PipelineResult<Vec<RawFileRecord>> {
    let pattern = FilePattern::new(&dataset.raw_regex)?;
    all_raw_files
        .iter()
        .map(|path| pattern.record(path, &dataset.sonar_model))
        .collect()
}

/// Parse a transect listing: the transect number from the listing's own file
/// name plus the set of raw file names it contains
pub fn parse_transect_listing(listing_path: &str, content: &str) -> PipelineResult<(u32, HashSet<String>)> {
    let listing_name = file_name_of(listing_path);
    let number = transect_number_regex()
        .captures(listing_name)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .ok_or_else(|| {
            ParseError::invalid_value(format!(
                "transect file '{}' must carry its number as 'x<digits>' in its name",
                listing_name
            ))
        })?;

    let names = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| file_name_of(line).to_string())
        .collect();

    Ok((number, names))
}

/// Keep only files listed in the transect file and tag them with its number
pub fn assign_transect(
    records: Vec<RawFileRecord>,
    transect_num: u32,
    listed: &HashSet<String>,
) -> Vec<RawFileRecord> {
    records
        .into_iter()
        .filter(|record| listed.contains(record.file_name()))
        .map(|record| record.with_transect(transect_num))
        .collect()
}

/// Load a JSON manifest of raw file records
pub async fn read_raw_manifest(fs: &dyn FileSystem, manifest_path: &str) -> PipelineResult<Vec<RawFileRecord>> {
    let bytes = fs.read(manifest_path).await?;
    let content = String::from_utf8_lossy(&bytes);
    serde_json::from_str(&content).map_err(|e| ParseError::from_json_error(&e, &content).into())
}

/// Gather every raw file of a dataset and split them into weekly batches.
///
/// A manifest (`raw_json_path`) replaces discovery; otherwise files are listed
/// from `urlpath` and classified with `raw_regex`. A transect listing, when
/// configured, filters and numbers the files before chunking.
pub async fn club_raw_files(dataset: &Dataset, fs: &dyn FileSystem) -> PipelineResult<Vec<WeeklyBatch>> {
    let mut records = match &dataset.args.raw_json_path {
        Some(manifest) => {
            tracing::info!(manifest = %manifest, "reading raw file manifest");
            read_raw_manifest(fs, manifest).await?
        }
        None => {
            let files = glob_all_files(dataset)?;
            tracing::info!(count = files.len(), urlpath = %dataset.args.urlpath, "discovered raw files");
            parse_raw_paths(&files, dataset)?
        }
    };

    if let Some(transect) = &dataset.args.transect {
        let content = fs.read(&transect.file).await?;
        let (number, listed) =
            parse_transect_listing(&transect.file, &String::from_utf8_lossy(&content))?;
        let before = records.len();
        records = assign_transect(records, number, &listed);
        tracing::info!(
            transect = number,
            kept = records.len(),
            dropped = before - records.len(),
            "applied transect listing"
        );
    }

    Ok(chunk_weekly(records))
}
