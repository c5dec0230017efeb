use std::io::Read;

use crate::error::{AppError, ErrorMessage};

/// A parsed spreadsheet: one header row followed by data rows
///
/// Rows may be shorter than the header; missing cells read as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn from_csv<R: Read>(reader: R) -> Result<Sheet, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::malformed_input(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::malformed_input(ErrorMessage::EmptySheet.to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| AppError::malformed_input(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Sheet { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the header named exactly `name`
    pub fn column(&self, name: &str) -> Result<usize, AppError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                AppError::malformed_input(ErrorMessage::UnknownColumn(name.to_string()).to_string())
            })
    }

    /// Non-empty cell at (`row`, `column`)
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(column)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ROSTER: &str = "Full Name,Student No,Email\n\
        Ana Cruz,202210001,ana.cruz@cvsu.edu.ph\n\
        Ben Reyes,202210002\n";

    #[test]
    fn reads_headers_and_ragged_rows() {
        let sheet = Sheet::from_csv(ROSTER.as_bytes()).unwrap();
        assert_eq!(sheet.headers(), &["Full Name", "Student No", "Email"]);
        assert_eq!(sheet.len(), 2);

        let email = sheet.column("Email").unwrap();
        assert_eq!(sheet.cell(0, email), Some("ana.cruz@cvsu.edu.ph"));
        assert_eq!(sheet.cell(1, email), None);
    }

    #[test]
    fn unknown_column_is_malformed_input() {
        let sheet = Sheet::from_csv(ROSTER.as_bytes()).unwrap();
        let err = sheet.column("Program").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert_eq!(err.message, "Column not found in file: Program");
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = Sheet::from_csv("".as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
    }
}
