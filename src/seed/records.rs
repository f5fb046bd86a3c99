//! Row access for the seed CSV files. Every failure names the file, the 1-based data row and the
//! field.
use std::io::Read;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::OutbreakError;
use crate::population::{parse_flag, AttributeValue, Attributes};
use crate::HashMap;

pub(crate) struct SeedTable {
    file: &'static str,
    headers: Vec<String>,
    columns: HashMap<String, usize>,
    records: Vec<StringRecord>,
}

impl SeedTable {
    /// Reads a whole table and checks that every `required` column is present.
    pub(crate) fn read<R: Read>(
        file: &'static str,
        reader: R,
        required: &[&str],
    ) -> Result<Self, OutbreakError> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|header| header.to_string())
            .collect();
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(position, header)| (header.clone(), position))
            .collect();
        for column in required {
            if !columns.contains_key(*column) {
                return Err(OutbreakError::data_integrity(
                    file,
                    None,
                    column,
                    "is a required column but is missing",
                ));
            }
        }

        let mut records = Vec::new();
        for (position, record) in reader.records().enumerate() {
            match record {
                Ok(record) => records.push(record),
                Err(error) => {
                    return Err(OutbreakError::data_integrity(
                        file,
                        Some(position + 1),
                        "*",
                        format!("could not be read: {error}"),
                    ))
                }
            }
        }

        Ok(SeedTable {
            file,
            headers,
            columns,
            records,
        })
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = SeedRow<'_>> {
        self.records
            .iter()
            .enumerate()
            .map(move |(position, record)| SeedRow {
                table: self,
                record,
                row: position + 1,
            })
    }
}

pub(crate) struct SeedRow<'a> {
    table: &'a SeedTable,
    record: &'a StringRecord,
    row: usize,
}

impl<'a> SeedRow<'a> {
    pub(crate) fn error(&self, field: &str, reason: impl Into<String>) -> OutbreakError {
        OutbreakError::data_integrity(self.table.file, Some(self.row), field, reason)
    }

    /// The trimmed cell, `None` when the column is absent or the cell is empty.
    pub(crate) fn optional(&self, field: &str) -> Option<&'a str> {
        self.table
            .columns
            .get(field)
            .and_then(|&position| self.record.get(position))
            .filter(|cell| !cell.is_empty())
    }

    pub(crate) fn required(&self, field: &str) -> Result<&'a str, OutbreakError> {
        self.optional(field)
            .ok_or_else(|| self.error(field, "is required but empty"))
    }

    pub(crate) fn parse_required<T: FromStr>(&self, field: &str) -> Result<T, OutbreakError> {
        let raw = self.required(field)?;
        raw.parse()
            .map_err(|_| self.error(field, format!("has unparseable value `{raw}`")))
    }

    pub(crate) fn parse_optional<T: FromStr>(
        &self,
        field: &str,
    ) -> Result<Option<T>, OutbreakError> {
        match self.optional(field) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| self.error(field, format!("has unparseable value `{raw}`"))),
        }
    }

    pub(crate) fn flag(&self, field: &str) -> Result<Option<bool>, OutbreakError> {
        match self.optional(field) {
            None => Ok(None),
            Some(raw) => parse_flag(raw)
                .map(Some)
                .ok_or_else(|| self.error(field, format!("is not a yes/no value: `{raw}`"))),
        }
    }

    /// Every non-empty cell whose column satisfies `keep`, as attributes.
    pub(crate) fn attributes_where(&self, keep: impl Fn(&str) -> bool) -> Attributes {
        let mut attributes = Attributes::new();
        for (position, header) in self.table.headers.iter().enumerate() {
            if !keep(header) {
                continue;
            }
            if let Some(value) = self.record.get(position).and_then(AttributeValue::parse_cell) {
                attributes.insert(header.clone(), value);
            }
        }
        attributes
    }

    /// Non-empty cells whose column satisfies `select`.
    pub(crate) fn cells_matching(
        &self,
        select: impl Fn(&str) -> bool,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        let table: &'a SeedTable = self.table;
        let record: &'a StringRecord = self.record;
        table
            .headers
            .iter()
            .enumerate()
            .filter(move |(_, header)| select(header.as_str()))
            .filter_map(move |(position, header)| {
                record
                    .get(position)
                    .filter(|cell| !cell.is_empty())
                    .map(|cell| (header.as_str(), cell))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
id,count,flag,note
a, 3 ,yes,
b,x,maybe,hello
";

    #[test]
    fn missing_required_column_names_the_field() {
        let error = SeedTable::read("t.csv", TABLE.as_bytes(), &["id", "size"])
            .err()
            .unwrap();
        assert!(matches!(
            error,
            OutbreakError::DataIntegrity { ref field, row: None, .. } if field == "size"
        ));
    }

    #[test]
    fn cells_are_trimmed_and_parsed() {
        let table = SeedTable::read("t.csv", TABLE.as_bytes(), &["id"]).unwrap();
        let rows: Vec<SeedRow> = table.rows().collect();
        assert_eq!(rows[0].parse_required::<u32>("count").unwrap(), 3);
        assert_eq!(rows[0].flag("flag").unwrap(), Some(true));
        assert_eq!(rows[0].optional("note"), None);
        assert_eq!(rows[0].optional("absent"), None);
    }

    #[test]
    fn malformed_cells_name_row_and_field() {
        let table = SeedTable::read("t.csv", TABLE.as_bytes(), &["id"]).unwrap();
        let rows: Vec<SeedRow> = table.rows().collect();
        let error = rows[1].parse_required::<u32>("count").unwrap_err();
        assert!(matches!(
            error,
            OutbreakError::DataIntegrity { row: Some(2), ref field, .. } if field == "count"
        ));
        assert!(rows[1].flag("flag").is_err());
    }

    #[test]
    fn unknown_columns_become_attributes() {
        let table = SeedTable::read("t.csv", TABLE.as_bytes(), &["id"]).unwrap();
        let rows: Vec<SeedRow> = table.rows().collect();
        let known = ["id", "count", "flag"];
        let attributes = rows[1].attributes_where(|column| !known.contains(&column));
        assert_eq!(attributes.text("note"), Some("hello"));
        assert!(!attributes.contains("count"));
    }
}
