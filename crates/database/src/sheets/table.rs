//! Row/column bookkeeping for worksheets laid out as a header row followed by records.

use services::subscription::ports::SubscriptionError;

pub const CLIENT_HEADERS: [&str; 12] = [
    "id",
    "token",
    "name",
    "email",
    "profile",
    "start_date",
    "end_date",
    "status",
    "payment_amount",
    "is_burned",
    "burn_reason",
    "burn_date",
];

pub const BURNED_HEADERS: [&str; 5] = ["id", "token", "burn_reason", "burn_date", "client_id"];

pub const OPERATION_HEADERS: [&str; 7] = [
    "id",
    "timestamp",
    "operation_type",
    "token",
    "details",
    "amount",
    "client_id",
];

/// Spreadsheet column letter for a zero-based index (`0` → `A`, `26` → `AA`)
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A1 reference to one cell; the sheet name is always quoted
pub fn cell_range(sheet: &str, column: usize, row_number: usize) -> String {
    format!(
        "'{}'!{}{}",
        sheet.replace('\'', "''"),
        column_letter(column),
        row_number
    )
}

pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A data row together with its 1-based sheet row number
pub struct RowRef<'a> {
    pub number: usize,
    pub cells: &'a [String],
}

impl Table {
    pub fn from_values(name: &str, mut values: Vec<Vec<String>>) -> Self {
        let headers = if values.is_empty() {
            Vec::new()
        } else {
            values
                .remove(0)
                .into_iter()
                .map(|h| h.trim().to_string())
                .collect()
        };
        Self {
            name: name.to_string(),
            headers,
            rows: values,
        }
    }

    pub fn column(&self, header: &str) -> Result<usize, SubscriptionError> {
        self.headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| {
                SubscriptionError::store(format!(
                    "worksheet '{}' has no '{}' column",
                    self.name, header
                ))
            })
    }

    /// Non-blank data rows; the header is row 1
    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(i, cells)| RowRef {
                number: i + 2,
                cells,
            })
    }

    /// First row whose cell matches `value`, compared the way `RowRef::cell` reads it
    pub fn find(&self, header: &str, value: &str) -> Result<Option<RowRef<'_>>, SubscriptionError> {
        let column = self.column(header)?;
        let value = value.trim();
        Ok(self.rows().find(|row| row.cell(column) == value))
    }

    /// Largest numeric id plus one; ids never repeat even after manual row deletion
    /// in the middle of the sheet
    pub fn next_id(&self) -> Result<i64, SubscriptionError> {
        let column = self.column("id")?;
        let max = self
            .rows()
            .filter_map(|row| row.cells.get(column)?.trim().parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }
}

impl RowRef<'_> {
    /// Cell text, or empty for cells the API trimmed off the row end
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(|c| c.trim()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(7), "H");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_cell_range_quotes_sheet() {
        assert_eq!(cell_range("clients", 7, 3), "'clients'!H3");
        assert_eq!(cell_range("Bob's", 0, 1), "'Bob''s'!A1");
    }

    #[test]
    fn test_rows_skip_blanks_and_keep_numbers() {
        let table = Table::from_values(
            "clients",
            vec![
                row(&["id", "token"]),
                row(&["1", "NFX-AAAA-1111-Kids"]),
                row(&["", ""]),
                row(&["7", "NFX-BBBB-2222-Kids"]),
            ],
        );

        let numbers: Vec<_> = table.rows().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 4]);
        assert_eq!(table.next_id().unwrap(), 8);

        let found = table.find("token", "NFX-BBBB-2222-Kids").unwrap().unwrap();
        assert_eq!(found.number, 4);
        assert_eq!(found.cell(0), "7");
        assert_eq!(found.cell(5), "");
    }

    #[test]
    fn test_find_matches_padded_cells() {
        let table = Table::from_values(
            "clients",
            vec![
                row(&["id", "token"]),
                row(&["1", "NFX-AAAA-1111-Kids "]),
                row(&["2", "  NFX-CCCC-3333-Solo"]),
            ],
        );

        let listed: Vec<String> = table.rows().map(|r| r.cell(1).to_string()).collect();
        for token in &listed {
            let found = table.find("token", token).unwrap();
            assert!(found.is_some(), "{token} listed but not found");
        }
        assert_eq!(
            table.find("token", "NFX-AAAA-1111-Kids").unwrap().map(|r| r.number),
            Some(2)
        );
        assert!(table.find("token", "NFX-AAAA-1111").unwrap().is_none());
    }

    #[test]
    fn test_missing_column_is_reported() {
        let table = Table::from_values("clients", vec![row(&["id"])]);
        assert!(matches!(
            table.column("token"),
            Err(SubscriptionError::StoreUnavailable(_))
        ));
        assert_eq!(table.next_id().unwrap(), 1);
    }
}
