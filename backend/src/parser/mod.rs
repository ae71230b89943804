//! CSV parser with encoding and delimiter auto-detection.
//!
//! Decodes raw bytes (UTF-8, ISO-8859-1, Windows-1252), guesses the
//! delimiter from the header line and deserializes rows into typed records.
//! No trade-specific logic here.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, Table};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult<T> {
    /// Parsed records
    pub records: Vec<T>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Header row of `content`, trimmed and unquoted.
pub fn read_headers(content: &str, delimiter: char) -> CsvResult<Vec<String>> {
    let header_line = content
        .lines()
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or(CsvError::EmptyFile)?;

    Ok(header_line
        .split(delimiter)
        .map(|s| s.trim().trim_start_matches('\u{feff}').trim_matches('"').to_string())
        .collect())
}

/// Deserialize every row of `content` into `T`.
///
/// # Example
/// ```ignore
/// #[derive(serde::Deserialize)]
/// struct Row { year: u16, cpi: f64 }
///
/// let rows: Vec<Row> = parse_records("year,cpi\n2023,304.7", ',').unwrap();
/// assert_eq!(rows[0].year, 2023);
/// ```
pub fn parse_records<T: DeserializeOwned>(content: &str, delimiter: char) -> CsvResult<Vec<T>> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<T>() {
        records.push(row?);
    }
    Ok(records)
}

/// Read `content` into an untyped [`Table`].
///
/// Cells holding an integer become [`Cell::Int`], other numbers
/// [`Cell::Float`], blanks [`Cell::Empty`], everything else text.
pub fn parse_table(content: &str, delimiter: char) -> CsvResult<Table> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut table = Table::new(reader.headers()?.iter());
    for record in reader.records() {
        table.push(record?.iter().map(infer_cell).collect());
    }
    Ok(table)
}

fn infer_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        Cell::Empty
    } else if let Ok(v) = raw.parse::<i64>() {
        Cell::Int(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        Cell::Float(v)
    } else {
        Cell::Text(raw.to_string())
    }
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto<T: DeserializeOwned>(bytes: &[u8]) -> CsvResult<ParseResult<T>> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let headers = read_headers(&content, delimiter)?;
    let records = parse_records(&content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result: ParseResult<CpiPoint> = parse_csv_file_auto("data/cpi.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// ```
pub fn parse_csv_file_auto<T: DeserializeOwned, P: AsRef<Path>>(
    path: P,
) -> CsvResult<ParseResult<T>> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        year: u16,
        cpi: f64,
    }

    #[derive(Debug, Deserialize)]
    struct Country {
        country_code: u32,
        country_name: String,
    }

    #[test]
    fn test_simple_csv() {
        let rows: Vec<Row> = parse_records("year,cpi\n2022,292.6\n2023,304.7", ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Row { year: 2023, cpi: 304.7 });
    }

    #[test]
    fn test_padded_values_trimmed() {
        let rows: Vec<Row> = parse_records("year , cpi\n 2023 ,   304.7", ',').unwrap();
        assert_eq!(rows[0].cpi, 304.7);
    }

    #[test]
    fn test_quoted_values() {
        let csv = "country_code,country_name\n156,\"China, People's Rep.\"";
        let rows: Vec<Country> = parse_records(csv, ',').unwrap();
        assert_eq!(rows[0].country_code, 156);
        assert_eq!(rows[0].country_name, "China, People's Rep.");
    }

    #[test]
    fn test_bad_value_reports_line() {
        let err = parse_records::<Row>("year,cpi\n2023,abc", ',').unwrap_err();
        assert!(matches!(err, CsvError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_empty_csv_error() {
        let err = read_headers("", ',').unwrap_err();
        assert!(matches!(err, CsvError::EmptyFile));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse_semicolon() {
        let result: ParseResult<Row> = parse_bytes_auto(b"year;cpi\n2023;304.7").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.headers, vec!["year", "cpi"]);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_parse_table_infers_cells() {
        let table = parse_table("year,exporter,value,label\n2023,682,1.5,Other\n2022,804,,\n", ',').unwrap();
        assert_eq!(table.columns(), &["year", "exporter", "value", "label"]);
        assert_eq!(table.get(0, "exporter"), Some(&Cell::Int(682)));
        assert_eq!(table.get(0, "value"), Some(&Cell::Float(1.5)));
        assert_eq!(table.get(0, "label"), Some(&Cell::Text("Other".into())));
        assert_eq!(table.get(1, "value"), Some(&Cell::Empty));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Côte" in ISO-8859-1
        let bytes: &[u8] = &[0x43, 0xF4, 0x74, 0x65];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Côte");
    }
}
