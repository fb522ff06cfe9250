//! Access-log loading: delimited text in, header-addressable table out.

pub mod clean;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use thiserror::Error;
use tracing::{debug, info};

/// Event timestamp column.
pub const COL_TIMESTAMP: &str = "Data e Hora";
/// Event type column (entry, exit, alarm...).
pub const COL_EVENT_TYPE: &str = "Tipo de Evento";
/// Access decision column ("Permitido", "Negado").
pub const COL_STATUS: &str = "Status";
/// User or vehicle identifier column.
pub const COL_SUBJECT: &str = "Usuário/Veículo";
/// Free-text notes column.
pub const COL_OBSERVATIONS: &str = "Observações";
/// Gate response time column, in seconds.
pub const COL_RESPONSE_TIME: &str = "Tempo de Resposta (segundos)";

/// Columns every access log must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_TIMESTAMP,
    COL_EVENT_TYPE,
    COL_STATUS,
    COL_SUBJECT,
    COL_OBSERVATIONS,
    COL_RESPONSE_TIME,
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("delimiter {0:?} is not a single-byte ASCII character")]
    InvalidDelimiter(char),
}

/// Raw tabular contents of an access log. Header names are whitespace-trimmed,
/// cell values are kept verbatim.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column called `name`, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like [`column_index`](Self::column_index) but a missing column is an error.
    pub fn require(&self, name: &str) -> Result<usize, IngestError> {
        self.column_index(name)
            .ok_or_else(|| IngestError::MissingColumn {
                column: name.to_string(),
            })
    }
}

/// Load the access log at `path`.
///
/// A missing file is reported as [`IngestError::NotFound`], distinct from
/// every other read or parse failure.
pub fn load_table(path: &Path, delimiter: char) -> Result<RawTable, IngestError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => IngestError::NotFound {
            path: path.to_path_buf(),
        },
        _ => IngestError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let table = read_table(BufReader::new(file), delimiter, path)?;
    info!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "loaded access log"
    );
    Ok(table)
}

/// Parse delimited text from any reader. `origin` is only used in error messages.
pub fn read_table<R: Read>(reader: R, delimiter: char, origin: &Path) -> Result<RawTable, IngestError> {
    if !delimiter.is_ascii() {
        return Err(IngestError::InvalidDelimiter(delimiter));
    }

    let csv_err = |source: csv::Error| IngestError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!(?headers, "parsed header row");

    let rows = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    let table = RawTable { headers, rows };
    for column in REQUIRED_COLUMNS {
        table.require(column)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = " Data e Hora , Tipo de Evento,Status ,Usuário/Veículo,Observações,  Tempo de Resposta (segundos)";

    fn parse(text: &str) -> Result<RawTable, IngestError> {
        read_table(text.as_bytes(), ',', Path::new("inline.csv"))
    }

    #[test]
    fn test_headers_are_trimmed() {
        let text = format!("{HEADER}\n2024-01-01 08:00:00,Entrada,Permitido,ABC-1234,Morador bloco A,3\n");
        let table = parse(&text).unwrap();

        assert_eq!(table.headers()[0], "Data e Hora");
        assert_eq!(table.headers()[5], "Tempo de Resposta (segundos)");
        assert_eq!(table.column_index(COL_STATUS), Some(2));
        assert_eq!(table.len(), 1);
        assert_eq!(&table.rows()[0][3], "ABC-1234");
    }

    #[test]
    fn test_missing_column_is_reported() {
        let text = "Data e Hora,Tipo de Evento,Status\n2024-01-01 08:00:00,Entrada,Permitido\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { ref column } if column == COL_SUBJECT));
    }

    #[test]
    fn test_ragged_row_is_parse_error() {
        let text = format!("{HEADER}\n2024-01-01 08:00:00,Entrada\n");
        assert!(matches!(parse(&text), Err(IngestError::Csv { .. })));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let table = parse(HEADER).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_semicolon_delimiter() {
        let text = "Data e Hora;Tipo de Evento;Status;Usuário/Veículo;Observações;Tempo de Resposta (segundos)\n\
                    2024-01-01 08:00:00;Entrada;Permitido;ABC-1234;;3\n";
        let table = read_table(text.as_bytes(), ';', Path::new("inline.csv")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(&table.rows()[0][4], "");
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let err = read_table(HEADER.as_bytes(), '§', Path::new("inline.csv")).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDelimiter('§')));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_table(Path::new("/nonexistent/portaria_log.csv"), ',').unwrap_err();
        assert!(matches!(err, IngestError::NotFound { .. }));
        assert!(err.to_string().contains("/nonexistent/portaria_log.csv"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, format!("{HEADER}\n2024-01-01 08:00:00,Entrada,Permitido,X,Y,1\n")).unwrap();

        let table = load_table(&path, ',').unwrap();
        assert_eq!(table.len(), 1);
    }
}
