use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One instrument file and everything stages have learned about it.
///
/// Records are values: a stage that downloads or converts a file returns a new
/// record built with the `with_*` methods instead of editing the one it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFileRecord {
    #[serde(rename = "file_path", alias = "path")]
    pub path: String,
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub datetime: Option<NaiveDateTime>,
    /// 1-based day of year
    #[serde(default)]
    pub jday: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub transect_num: Option<u32>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub out_path: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Remaining captured pattern groups and manifest keys
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl RawFileRecord {
    pub fn new(path: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            instrument: instrument.into(),
            datetime: None,
            jday: None,
            month: None,
            year: None,
            transect_num: None,
            local_path: None,
            out_path: None,
            error: false,
            error_message: None,
            fields: BTreeMap::new(),
        }
    }

    /// Last path segment of the file location
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }

    /// File name without its extension
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    pub fn with_jday(mut self, jday: u32) -> Self {
        self.jday = Some(jday);
        self
    }

    pub fn with_transect(&self, transect_num: u32) -> Self {
        let mut next = self.clone();
        next.transect_num = Some(transect_num);
        next
    }

    pub fn with_local_path(&self, local_path: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.local_path = Some(local_path.into());
        next
    }

    pub fn with_out_path(&self, out_path: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.out_path = Some(out_path.into());
        next
    }

    /// New version of this record flagged as failed
    pub fn failed(&self, message: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.error = true;
        next.error_message = Some(message.into());
        next
    }

    /// Record describing a product derived from this file (e.g. a combined transect)
    pub fn derived(&self, path: impl Into<String>) -> Self {
        let path = path.into();
        let mut next = self.clone();
        next.out_path = Some(path.clone());
        next.path = path;
        next.local_path = None;
        next.error = false;
        next.error_message = None;
        next
    }
}

/// Last segment of a `/`-separated path or URL
pub fn file_name_of(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_and_stem() {
        let record = RawFileRecord::new("s3://bucket/ooi/EK60_2017-01-15T03:00:00.raw", "EK60");
        assert_eq!(record.file_name(), "EK60_2017-01-15T03:00:00.raw");
        assert_eq!(record.file_stem(), "EK60_2017-01-15T03:00:00");
    }

    #[test]
    fn test_builders_leave_original_untouched() {
        let original = RawFileRecord::new("/raw/a.raw", "EK60");
        let downloaded = original.with_local_path("/work/a.raw");
        let failed = downloaded.failed("bad header");

        assert!(original.local_path.is_none());
        assert_eq!(downloaded.local_path.as_deref(), Some("/work/a.raw"));
        assert!(!downloaded.error);
        assert!(failed.error);
        assert_eq!(failed.error_message.as_deref(), Some("bad header"));
    }

    #[test]
    fn test_deserialize_manifest_entry() {
        let json = r#"{
            "instrument": "EK60",
            "file_path": "https://example.com/some-file.raw",
            "month": 1,
            "year": 2017,
            "jday": 1,
            "datetime": "2017-01-01T00:00:00",
            "deployment": "CE04OSPS"
        }"#;
        let record: RawFileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.path, "https://example.com/some-file.raw");
        assert_eq!(record.jday, Some(1));
        assert!(record.datetime.is_some());
        assert_eq!(
            record.fields.get("deployment"),
            Some(&serde_json::Value::String("CE04OSPS".to_string()))
        );
    }
}
