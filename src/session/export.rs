//! CSV export of a processed session
//!
//! The result table is always exactly one row: the uploaded file name and
//! the joined extracted text. Serialization matches the common spreadsheet
//! dialect: comma separated, `\n` line endings, header row, no index
//! column, fields quoted only when they need it.

/// File name offered for the downloadable artifact.
pub const EXPORT_FILE_NAME: &str = "extracted_text.csv";

/// MIME type recorded on the artifact.
pub const EXPORT_MIME_TYPE: &str = "text/csv";

/// The single-row result table derived from a processed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    /// Original uploaded file name.
    pub image_name: String,
    /// Recognized fragments joined with single spaces.
    pub extracted_text: String,
}

impl ResultRow {
    pub fn new(image_name: impl Into<String>, extracted_text: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            extracted_text: extracted_text.into(),
        }
    }

    /// Render the table as CSV text: header plus the one data row.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Image,Extracted Text\n");
        out.push_str(&quote_field(&self.image_name));
        out.push(',');
        out.push_str(&quote_field(&self.extracted_text));
        out.push('\n');
        out
    }

    /// Package the CSV bytes as a downloadable artifact.
    pub fn to_csv_artifact(&self) -> CsvArtifact {
        CsvArtifact {
            file_name: EXPORT_FILE_NAME.to_string(),
            mime_type: EXPORT_MIME_TYPE,
            data: self.to_csv().into_bytes(),
        }
    }
}

/// A serialized export ready to hand to the download affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

/// Minimal CSV quoting: a field is wrapped in double quotes only when it
/// contains a separator, a quote, or a line break; embedded quotes are
/// doubled.
fn quote_field(field: &str) -> String {
    let needs_quotes = field.contains([',', '"', '\n', '\r']);
    if !needs_quotes {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for c in field.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_row_round_trips_verbatim() {
        let row = ResultRow::new("rx1.png", "Take 2 tablets");
        assert_eq!(row.to_csv(), "Image,Extracted Text\nrx1.png,Take 2 tablets\n");
    }

    #[test]
    fn test_empty_text_still_produces_a_data_row() {
        let row = ResultRow::new("blank.png", "");
        assert_eq!(row.to_csv(), "Image,Extracted Text\nblank.png,\n");
    }

    #[test]
    fn test_comma_in_text_is_quoted() {
        let row = ResultRow::new("rx.png", "Take 2, then rest");
        assert_eq!(
            row.to_csv(),
            "Image,Extracted Text\nrx.png,\"Take 2, then rest\"\n"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let row = ResultRow::new("rx.png", "marked \"urgent\"");
        assert_eq!(
            row.to_csv(),
            "Image,Extracted Text\nrx.png,\"marked \"\"urgent\"\"\"\n"
        );
    }

    #[test]
    fn test_newline_in_text_is_quoted() {
        let row = ResultRow::new("rx.png", "line one\nline two");
        assert_eq!(
            row.to_csv(),
            "Image,Extracted Text\nrx.png,\"line one\nline two\"\n"
        );
    }

    #[test]
    fn test_file_name_with_comma_is_quoted() {
        let row = ResultRow::new("scan, page 1.png", "text");
        assert_eq!(
            row.to_csv(),
            "Image,Extracted Text\n\"scan, page 1.png\",text\n"
        );
    }

    #[test]
    fn test_artifact_metadata() {
        let artifact = ResultRow::new("rx1.png", "Take 2 tablets").to_csv_artifact();
        assert_eq!(artifact.file_name, "extracted_text.csv");
        assert_eq!(artifact.mime_type, "text/csv");
        assert!(!artifact.data.is_empty());
    }
}
