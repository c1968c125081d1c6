// 📊 Workbook I/O
// Read: xlsx/xls/ods through calamine, or a UTF-8 CSV as a one-sheet workbook.
// Write: every input sheet as it came in, plus the result sheet, via rust_xlsxwriter.

use crate::error::{InputError, ProcessError};
use crate::orchestrator::ResultRow;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use std::io::Cursor;

pub const CSV_SHEET_NAME: &str = "Sheet1";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

// ============================================================================
// IN-MEMORY MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Text as a user would read it. Whole numbers drop the ".0" so a CNPJ typed
    /// into a numeric cell keeps its digits.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(text) => Cell::Text(text.clone()),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Float(n) => Cell::Number(*n),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Cells are stored at their absolute position: `rows[0]` is spreadsheet row 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Sheet {
            name: name.into(),
            rows,
        }
    }

    /// Values below the header row in the column named `header`.
    /// The first row is the header row.
    pub fn column_values(&self, header: &str) -> Result<Vec<String>, InputError> {
        let header_row = self
            .rows
            .first()
            .ok_or_else(|| InputError::MissingColumn(header.to_string()))?;

        let index = header_row
            .iter()
            .position(|cell| cell.as_text().trim() == header)
            .ok_or_else(|| InputError::MissingColumn(header.to_string()))?;

        Ok(self.rows[1..]
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|cell| !cell.is_empty())
            .map(Cell::as_text)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn first_sheet(&self) -> Result<&Sheet, InputError> {
        self.sheets.first().ok_or(InputError::NoSheets)
    }

    /// `base`, or `base_2`, `base_3`... whichever no sheet uses yet.
    pub fn unused_sheet_name(&self, base: &str) -> String {
        let taken = |name: &str| self.sheets.iter().any(|s| s.name.eq_ignore_ascii_case(name));
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

// ============================================================================
// READING
// ============================================================================

pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, InputError> {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        read_spreadsheet(bytes)
    } else {
        read_csv(bytes)
    }
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Workbook, InputError> {
    let mut source = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| InputError::Unreadable(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in source.sheet_names() {
        let range = source
            .worksheet_range(&name)
            .map_err(|e| InputError::Unreadable(format!("sheet '{}': {}", name, e)))?;

        // calamine trims leading empty rows/columns; put them back
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![Cell::Empty; col_offset];
            row.extend(data_row.iter().map(Cell::from));
            rows.push(row);
        }

        sheets.push(Sheet::new(name, rows));
    }

    if sheets.is_empty() {
        return Err(InputError::NoSheets);
    }
    Ok(Workbook { sheets })
}

fn read_csv(bytes: &[u8]) -> Result<Workbook, InputError> {
    std::str::from_utf8(bytes)
        .map_err(|_| InputError::Unreadable("not a spreadsheet or UTF-8 CSV".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| InputError::Unreadable(format!("CSV line {}: {}", line + 1, e)))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Workbook {
        sheets: vec![Sheet::new(CSV_SHEET_NAME, rows)],
    })
}

// ============================================================================
// WRITING
// ============================================================================

/// Copy every input sheet, then append the results under `result_sheet`
/// (suffixed if an input sheet already has that name).
pub fn write_with_results(
    input: &Workbook,
    result_sheet: &str,
    rows: &[ResultRow],
) -> Result<Vec<u8>, ProcessError> {
    let mut output = XlsxWorkbook::new();

    for sheet in &input.sheets {
        let worksheet = output.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = cell_position(r, c)?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(text) => {
                        worksheet.write_string(r, c, text.as_str())?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(r, c, *b)?;
                    }
                }
            }
        }
    }

    let worksheet = output.add_worksheet();
    worksheet.set_name(input.unused_sheet_name(result_sheet))?;

    for (c, header) in ResultRow::HEADERS.iter().enumerate() {
        worksheet.write_string(0, c as u16, *header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.cells().iter().enumerate() {
            let (r, c) = cell_position(r + 1, c)?;
            worksheet.write_string(r, c, *value)?;
        }
    }

    Ok(output.save_to_buffer()?)
}

fn cell_position(row: usize, col: usize) -> Result<(u32, u16), ProcessError> {
    let r = u32::try_from(row).map_err(|_| ProcessError::Output(format!("row {} out of range", row)))?;
    let c = u16::try_from(col).map_err(|_| ProcessError::Output(format!("column {} out of range", col)))?;
    Ok((r, c))
}

/// Plain CSV of the result rows, same headers as the sheet.
pub fn results_to_csv(rows: &[ResultRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(writer.into_inner()?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sample_row() -> ResultRow {
        ResultRow {
            cnpj: "12345678000195".to_string(),
            month: "01/01/2020".to_string(),
            regime: "Outro Regime".to_string(),
            reason: "Não optante/Nunca esteve no Simples Nacional neste mês.".to_string(),
            periods: String::new(),
            current_status: String::new(),
        }
    }

    #[test]
    fn test_numeric_cnpj_cell_keeps_digits() {
        assert_eq!(Cell::Number(12345678000195.0).as_text(), "12345678000195");
        assert_eq!(Cell::Number(1.5).as_text(), "1.5");
    }

    #[test]
    fn test_column_values_skip_blanks() {
        let sheet = Sheet::new(
            "Plan1",
            vec![
                vec![text("razao"), text("cnpj_part")],
                vec![text("ACME"), Cell::Number(191.0)],
                vec![text("Vazia"), Cell::Empty],
                vec![text("Curta")],
                vec![text("Outra"), text("33.000.167/0001-01")],
            ],
        );

        assert_eq!(
            sheet.column_values("cnpj_part").unwrap(),
            vec!["191", "33.000.167/0001-01"]
        );
    }

    #[test]
    fn test_missing_column_is_input_error() {
        let sheet = Sheet::new("Plan1", vec![vec![text("cnpj")]]);
        let err = sheet.column_values("cnpj_part").unwrap_err();
        assert!(matches!(err, InputError::MissingColumn(ref c) if c == "cnpj_part"));

        let empty = Sheet::new("Plan1", vec![]);
        assert!(empty.column_values("cnpj_part").is_err());
    }

    #[test]
    fn test_csv_input_is_single_sheet() {
        let workbook = read_workbook("cnpj_part,nome\n191,Banco\n,Sem\n".as_bytes()).unwrap();
        assert_eq!(workbook.sheets.len(), 1);
        assert_eq!(workbook.sheets[0].name, CSV_SHEET_NAME);
        assert_eq!(workbook.first_sheet().unwrap().column_values("cnpj_part").unwrap(), vec!["191"]);
    }

    #[test]
    fn test_binary_garbage_is_unreadable() {
        let err = read_workbook(&[0xff, 0xfe, 0x00, 0x81]).unwrap_err();
        assert!(matches!(err, InputError::Unreadable(_)));

        let err = read_workbook(b"PK\x03\x04 definitely not a zip").unwrap_err();
        assert!(matches!(err, InputError::Unreadable(_)));
    }

    #[test]
    fn test_unused_sheet_name() {
        let workbook = Workbook {
            sheets: vec![Sheet::new("CONSULTA", vec![]), Sheet::new("consulta_2", vec![])],
        };
        assert_eq!(workbook.unused_sheet_name("CONSULTA"), "CONSULTA_3");
        assert_eq!(Workbook::default().unused_sheet_name("CONSULTA"), "CONSULTA");
    }

    #[test]
    fn test_written_workbook_preserves_input_and_appends_results() {
        let input = Workbook {
            sheets: vec![
                Sheet::new(
                    "Empresas",
                    vec![
                        vec![text("cnpj_part"), text("ativo")],
                        vec![Cell::Number(191.0), Cell::Bool(true)],
                    ],
                ),
                Sheet::new("Notas", vec![vec![], vec![Cell::Empty, text("b2")]]),
            ],
        };

        let bytes = write_with_results(&input, "CONSULTA", &[sample_row()]).unwrap();
        let reread = read_workbook(&bytes).unwrap();

        let names: Vec<&str> = reread.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Empresas", "Notas", "CONSULTA"]);

        assert_eq!(reread.sheets[0], input.sheets[0]);
        assert_eq!(reread.sheets[1].rows[1][1], text("b2"));

        let results = &reread.sheets[2];
        assert_eq!(results.rows[0].len(), 6);
        assert_eq!(results.rows[0][1], text("MÊS"));
        assert_eq!(results.rows[1][0], text("12345678000195"));
        assert_eq!(results.rows[1][2], text("Outro Regime"));
    }

    #[test]
    fn test_results_csv_headers() {
        let csv = String::from_utf8(results_to_csv(&[sample_row()]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("CNPJ,MÊS,REGIME,MOTIVO,Períodos_detectados,Situacao_Atual")
        );
        assert!(lines.next().unwrap().starts_with("12345678000195,01/01/2020,Outro Regime,"));
    }
}
