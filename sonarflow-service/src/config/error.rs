// Configuration error types with helpful error messages
// Provides line/column info, source excerpts and suggestions for common mistakes

use std::fmt;

/// Detailed configuration error with location and context
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Surrounding context (a few lines around the error)
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    /// The kind of error
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// YAML syntax or schema error
    YamlSyntax,
    /// JSON manifest error
    JsonSyntax,
    /// Invalid option value
    InvalidValue,
    /// `{{ name }}` placeholder without a matching parameter
    MissingParameter,
    /// IO error (file not found, etc.)
    IoError,
}

impl ParseError {
    pub fn new(message: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
            context: String::new(),
            suggestion: None,
            kind,
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(message, ParseErrorKind::InvalidValue)
    }

    pub fn io(path: &str, err: &std::io::Error) -> Self {
        Self::new(format!("cannot read '{}': {}", path, err), ParseErrorKind::IoError)
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }
        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column + 7) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let mut parsed = ParseError::new(format_yaml_error_message(err), ParseErrorKind::YamlSyntax)
            .at(line, column)
            .with_source_context(source, 2);
        parsed.suggestion = suggest_yaml_fix(err, source, line);
        parsed
    }

    /// Create from serde_json error (raw file manifests)
    pub fn from_json_error(err: &serde_json::Error, source: &str) -> Self {
        ParseError::new(err.to_string(), ParseErrorKind::JsonSyntax)
            .at(err.line(), err.column())
            .with_source_context(source, 1)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Format serde_yaml error message into something more readable
fn format_yaml_error_message(err: &serde_yaml::Error) -> String {
    let msg = err.to_string();

    if msg.contains("missing field") {
        if let Some(field) = extract_field_name(&msg, "missing field `", "`") {
            return format!("missing required field '{}'", field);
        }
    }

    if msg.contains("unknown variant") {
        if let Some(variant) = extract_field_name(&msg, "unknown variant `", "`") {
            return format!("unknown value '{}'", variant);
        }
    }

    if msg.contains("invalid type") {
        if let (Some(expected), Some(found)) = (
            extract_field_name(&msg, "expected ", " at"),
            extract_field_name(&msg, "invalid type: ", ","),
        ) {
            return format!("expected {}, but found {}", expected, found);
        }
    }

    msg
}

fn extract_field_name(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

/// Suggest fixes for common recipe and dataset mistakes
fn suggest_yaml_fix(err: &serde_yaml::Error, source: &str, line: usize) -> Option<String> {
    let msg = err.to_string();
    let lines: Vec<&str> = source.lines().collect();
    let error_line = lines.get(line.saturating_sub(1)).unwrap_or(&"");

    if msg.contains("missing field `pipeline`") {
        return Some("a recipe lists its processes under 'pipeline:'".to_string());
    }

    if msg.contains("missing field `raw_regex`") {
        return Some(
            "datasets need a 'raw_regex' with named 'date' and 'time' groups to derive julian days"
                .to_string(),
        );
    }

    if msg.contains("missing field `module`") {
        return Some("each stage needs 'name:' and 'module:' to be resolved".to_string());
    }

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let typo_suggestions = [
        ("use_local_cluster", "use_local_dask"),
        ("scheduler:", "scheduler_address"),
        ("offline:", "use_offline"),
        ("output_path", "out_path"),
    ];

    let lower_line = error_line.to_lowercase();
    for (typo, correct) in typo_suggestions {
        if lower_line.contains(typo) {
            return Some(format!("did you mean '{}'?", correct));
        }
    }

    None
}

/// Result type for configuration loading
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::invalid_value("unknown task runner 'dask'")
            .at(4, 7)
            .with_suggestion("use 'sequential' or 'distributed'");

        let output = format!("{}", err);
        assert!(output.contains("unknown task runner"));
        assert!(output.contains("line 4:7"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn test_display_without_location() {
        let err = ParseError::new("parameter 'year' is not defined", ParseErrorKind::MissingParameter);
        let output = format!("{}", err);
        assert!(!output.contains("-->"));
    }

    #[test]
    fn test_parse_error_with_source_context() {
        let source = "name: weekly\npipeline:\n  - name: convert\n    stages:\n      - name: open_raw";

        let err = ParseError::invalid_value("missing module").at(5, 9).with_source_context(source, 1);

        assert!(err.context.contains(">    5 |"));
        assert!(err.context.contains("name: open_raw"));
    }

    #[test]
    fn test_extract_field_name() {
        let msg = "missing field `module` at line 10";
        assert_eq!(
            extract_field_name(msg, "missing field `", "`"),
            Some("module".to_string())
        );
    }
}
