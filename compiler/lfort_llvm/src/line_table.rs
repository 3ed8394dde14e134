//! Return-address to source-line lookup for stack traces.

/// One row of the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineEntry {
    pub address: u64,
    pub line: i64,
    pub file: String,
}

/// Address-ordered line table of one executable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineTable {
    entries: Vec<LineEntry>,
}

/// Distance from a return address back to its call instruction.
const CALL_RETURN_OFFSET: u64 = 16;

impl LineTable {
    /// Build from `(address, line, file)` rows in any order.
    pub fn from_triples(rows: &[(u64, i64, &str)]) -> Self {
        let mut entries: Vec<LineEntry> = rows
            .iter()
            .map(|(address, line, file)| LineEntry {
                address: *address,
                line: *line,
                file: (*file).to_string(),
            })
            .collect();
        entries.sort_by_key(|e| e.address);
        LineTable { entries }
    }

    pub fn entries(&self) -> &[LineEntry] {
        &self.entries
    }

    /// File and line for the return address `address`, or `("", -1)` past
    /// the end of the table.
    pub fn lookup(&self, address: u64) -> (&str, i64) {
        let (Some(first), Some(last)) = (self.entries.first(), self.entries.last()) else {
            return ("", -1);
        };
        let actual = address.saturating_sub(CALL_RETURN_OFFSET);
        if first.address > actual {
            return (&first.file, first.line);
        }
        if last.address < actual {
            return ("", -1);
        }
        if last.address == actual {
            return (&last.file, last.line);
        }
        // First entry strictly above `actual`; one exists since `last` is.
        let index = self.entries.partition_point(|e| e.address <= actual);
        let entry = &self.entries[index.min(self.entries.len() - 1)];
        (&entry.file, entry.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LineTable {
        LineTable::from_triples(&[
            (123, 45, "foo"),
            (456, 50, "foo1"),
            (1200, 20, "foo1"),
            (1000, 15, "foo2"),
            (789, 1, "foo3"),
        ])
    }

    #[test]
    fn known_queries() {
        let t = table();
        assert_eq!(t.lookup(100), ("foo", 45));
        assert_eq!(t.lookup(1016), ("foo1", 20));
        assert_eq!(t.lookup(1300), ("", -1));
    }

    #[test]
    fn boundaries() {
        let t = table();
        assert_eq!(t.lookup(1216), ("foo1", 20));
        assert_eq!(t.lookup(1217), ("", -1));
        assert_eq!(t.lookup(0), ("foo", 45));
        assert_eq!(t.lookup(500), ("foo3", 1));
        assert_eq!(LineTable::default().lookup(10), ("", -1));
    }
}
