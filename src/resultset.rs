//! Result-set protocol: a forward-only cursor tier and a buffered tier.

use std::rc::Rc;

use serde::Serialize;

use crate::cursor::{RowIter, RowSource, SharedCursor};
use crate::error::{Error, Result};
use crate::row::{ColumnMetadata, OwnedRow, Row};
use crate::value::ValueKind;

/// Outcome of a statement that produced no row data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsResult {
    pub affected_rows: u64,
    pub last_generated_id: u64,
}

impl StatsResult {
    pub fn new(affected_rows: u64, last_generated_id: u64) -> Self {
        Self {
            affected_rows,
            last_generated_id,
        }
    }

    /// Fold the stats of a later statement into this one: affected rows are
    /// summed and the last non-zero generated id wins.
    pub fn merge(&mut self, next: StatsResult) {
        self.affected_rows += next.affected_rows;
        if next.last_generated_id != 0 {
            self.last_generated_id = next.last_generated_id;
        }
    }
}

/// Forward-only result set. One pass is possible; advancing is destructive.
pub trait CursorResultSet {
    fn columns(&self) -> &[ColumnMetadata];

    /// Whether the current cursor position denotes a row.
    fn has_row(&self) -> bool;

    /// A live iterator over the shared cursor position.
    fn begin(&self) -> RowIter<'_>;

    /// Affected rows and generated id, for statements without result columns.
    fn stats(&self) -> StatsResult {
        StatsResult::default()
    }

    fn end(&self) -> RowIter<'_> {
        RowIter::end()
    }

    fn column_count(&self) -> usize {
        self.columns().len()
    }

    fn column(&self, index: usize) -> Result<&ColumnMetadata> {
        let columns = self.columns();
        columns.get(index).ok_or(Error::Index {
            index,
            len: columns.len(),
        })
    }

    fn column_name(&self, index: usize) -> Result<&str> {
        Ok(&self.column(index)?.name)
    }

    fn column_origin_name(&self, index: usize) -> Result<&str> {
        Ok(&self.column(index)?.origin_name)
    }

    fn table_origin_name(&self, index: usize) -> Result<&str> {
        Ok(&self.column(index)?.origin_table_name)
    }

    fn column_kind(&self, index: usize) -> Result<ValueKind> {
        Ok(self.column(index)?.declared_kind)
    }

    /// Index of the first column called `name`.
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Drive the remaining rows through `f`. Stops at the first error.
    fn for_each_row(&self, f: &mut dyn FnMut(&dyn Row) -> Result<()>) -> Result<()> {
        let mut it = self.begin();
        let end = self.end();
        while it != end {
            {
                let row = it.get()?;
                f(&*row)?;
            }
            it.advance()?;
        }
        Ok(())
    }
}

/// Fully materialized result set with random access.
pub trait BufferedResultSet: CursorResultSet {
    fn row_count(&self) -> usize;

    fn get_row(&self, index: usize) -> Result<&OwnedRow>;
}

/// Live cursor produced by `Statement::execute`.
///
/// Rows are ephemeral: each one is valid only until the next advance. The
/// cursor borrows its statement, so it cannot outlive it or the connection.
pub struct Cursor<'a> {
    columns: Vec<ColumnMetadata>,
    state: Option<Rc<SharedCursor<'a>>>,
    stats: StatsResult,
}

impl<'a> Cursor<'a> {
    /// Open a cursor over `source`, positioned on its first row.
    pub fn open(columns: Vec<ColumnMetadata>, source: Box<dyn RowSource + 'a>) -> Result<Self> {
        Ok(Self {
            columns,
            state: Some(SharedCursor::open(source)?),
            stats: StatsResult::default(),
        })
    }

    /// Fill in columns declared as [`ValueKind::None`] from the first row's
    /// values. Null cells leave the column unknown.
    pub fn infer_missing_kinds(mut self) -> Self {
        if let Some(state) = &self.state {
            let first = RowIter::over(state);
            if let Ok(row) = first.get() {
                for column in self
                    .columns
                    .iter_mut()
                    .filter(|c| c.declared_kind == ValueKind::None)
                {
                    match row.get_value(column.ordinal) {
                        Ok(value) if !value.is_null() => column.declared_kind = value.kind(),
                        _ => {}
                    }
                }
            }
        }
        self
    }

    /// A row-less result for statements without result columns.
    pub fn empty(stats: StatsResult) -> Self {
        Self {
            columns: Vec::new(),
            state: None,
            stats,
        }
    }
}

impl CursorResultSet for Cursor<'_> {
    fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    fn has_row(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.has_row())
    }

    fn begin(&self) -> RowIter<'_> {
        match &self.state {
            Some(state) => RowIter::over(state),
            None => RowIter::end(),
        }
    }

    fn stats(&self) -> StatsResult {
        self.stats
    }
}

/// Buffered result: every row copied into owned storage at execution time.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BufferedTable {
    columns: Vec<ColumnMetadata>,
    rows: Vec<OwnedRow>,
    stats: StatsResult,
}

impl BufferedTable {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<OwnedRow>) -> Self {
        Self {
            columns,
            rows,
            stats: StatsResult::default(),
        }
    }

    /// Drain a cursor into durable storage, keeping its column metadata.
    pub fn from_cursor(cursor: &dyn CursorResultSet) -> Result<Self> {
        let mut rows = Vec::new();
        cursor.for_each_row(&mut |row: &dyn Row| {
            rows.push(OwnedRow::from_row(row)?);
            Ok(())
        })?;
        Ok(Self {
            columns: cursor.columns().to_vec(),
            rows,
            stats: cursor.stats(),
        })
    }

    pub fn rows(&self) -> std::slice::Iter<'_, OwnedRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<OwnedRow> {
        self.rows
    }
}

impl CursorResultSet for BufferedTable {
    fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    fn has_row(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Each call starts a fresh pass over the stored rows.
    fn begin(&self) -> RowIter<'_> {
        let source = TableSource {
            rows: &self.rows,
            pos: None,
        };
        match SharedCursor::open(Box::new(source)) {
            Ok(state) => RowIter::over(&state),
            Err(_) => RowIter::end(),
        }
    }

    fn stats(&self) -> StatsResult {
        self.stats
    }
}

impl BufferedResultSet for BufferedTable {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn get_row(&self, index: usize) -> Result<&OwnedRow> {
        self.rows.get(index).ok_or(Error::Index {
            index,
            len: self.rows.len(),
        })
    }
}

/// Replays stored rows through the iterator bridge.
struct TableSource<'t> {
    rows: &'t [OwnedRow],
    pos: Option<usize>,
}

impl RowSource for TableSource<'_> {
    fn fetch(&mut self) -> Result<bool> {
        let next = self.pos.map_or(0, |p| p + 1);
        self.pos = Some(next);
        Ok(next < self.rows.len())
    }

    fn current(&self) -> Option<&(dyn Row + 'static)> {
        self.pos
            .and_then(|p| self.rows.get(p))
            .map(|r| r as &(dyn Row + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::tests::VecSource;
    use crate::value::Value;
    use rstest::rstest;
    use std::cell::Cell;

    fn columns() -> Vec<ColumnMetadata> {
        vec![ColumnMetadata::new("id", ValueKind::Int64, 0)]
    }

    fn cursor(values: &[i64]) -> Cursor<'static> {
        let source = VecSource::new(values, Rc::new(Cell::new(0)));
        Cursor::open(columns(), Box::new(source)).unwrap()
    }

    fn collect(rs: &dyn CursorResultSet) -> Vec<i64> {
        let mut seen = Vec::new();
        rs.for_each_row(&mut |row: &dyn Row| {
            seen.push(row.get_value(0)?.to_int64()?);
            Ok(())
        })
        .unwrap();
        seen
    }

    #[rstest]
    fn test_stats_merge_sums_and_keeps_last_nonzero_id() {
        let mut stats = StatsResult::new(1, 10);
        stats.merge(StatsResult::new(2, 11));
        stats.merge(StatsResult::new(3, 0));
        assert_eq!(stats, StatsResult::new(6, 11));
    }

    #[rstest]
    fn test_cursor_metadata_accessors() {
        let rs = cursor(&[1]);
        assert_eq!(rs.column_count(), 1);
        assert_eq!(rs.column_name(0).unwrap(), "id");
        assert_eq!(rs.column_origin_name(0).unwrap(), "id");
        assert_eq!(rs.table_origin_name(0).unwrap(), "");
        assert_eq!(rs.column_kind(0).unwrap(), ValueKind::Int64);
        assert_eq!(rs.column_index("id"), Some(0));
        assert_eq!(rs.column_index("missing"), None);
        assert!(matches!(rs.column(3), Err(Error::Index { index: 3, len: 1 })));
    }

    #[rstest]
    fn test_cursor_is_single_pass() {
        let rs = cursor(&[1, 2, 3]);
        assert!(rs.has_row());
        assert_eq!(collect(&rs), vec![1, 2, 3]);
        assert!(!rs.has_row());
        assert_eq!(collect(&rs), Vec::<i64>::new());
    }

    #[rstest]
    fn test_infer_missing_kinds_from_first_row() {
        let source = VecSource::new(&[3], Rc::new(Cell::new(0)));
        let columns = vec![ColumnMetadata::new("expr", ValueKind::None, 0)];
        let rs = Cursor::open(columns, Box::new(source))
            .unwrap()
            .infer_missing_kinds();
        assert_eq!(rs.column_kind(0).unwrap(), ValueKind::Int64);
        // inference does not consume the row
        assert_eq!(collect(&rs), vec![3]);
    }

    #[rstest]
    fn test_empty_cursor_reports_stats() {
        let rs = Cursor::empty(StatsResult::new(4, 9));
        assert!(!rs.has_row());
        assert_eq!(rs.begin(), rs.end());
        assert_eq!(rs.stats(), StatsResult::new(4, 9));
    }

    #[rstest]
    fn test_buffered_matches_cursor_order() {
        let table = BufferedTable::from_cursor(&cursor(&[5, 6, 7])).unwrap();
        assert_eq!(table.row_count(), 3);
        let via_cursor = collect(&table);
        for (i, expected) in via_cursor.iter().enumerate() {
            assert_eq!(table.get_row(i).unwrap().get_value_int64(0), *expected);
        }
        assert_eq!(via_cursor, vec![5, 6, 7]);
    }

    #[rstest]
    fn test_buffered_begin_restarts() {
        let table = BufferedTable::from_cursor(&cursor(&[1, 2])).unwrap();
        assert_eq!(collect(&table), vec![1, 2]);
        assert_eq!(collect(&table), vec![1, 2]);
        assert!(table.has_row());
    }

    #[rstest]
    fn test_buffered_get_row_out_of_range() {
        let table = BufferedTable::new(columns(), vec![]);
        assert!(!table.has_row());
        assert_eq!(table.begin(), table.end());
        assert!(matches!(table.get_row(0), Err(Error::Index { index: 0, len: 0 })));
    }

    #[rstest]
    fn test_buffered_rows_and_into_rows() {
        let table = BufferedTable::new(
            columns(),
            vec![OwnedRow::new(vec![Value::Int64(1)]), OwnedRow::new(vec![Value::Null])],
        );
        assert_eq!(table.rows().count(), 2);
        let rows = table.into_rows();
        assert!(rows[1].get_value(0).unwrap().is_null());
    }

    #[rstest]
    fn test_for_each_row_stops_on_callback_error() {
        let rs = cursor(&[1, 2, 3]);
        let mut calls = 0;
        let result = rs.for_each_row(&mut |_: &dyn Row| {
            calls += 1;
            Err(Error::InvalidIterator)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[rstest]
    fn test_buffered_table_serializes() {
        let table = BufferedTable::new(columns(), vec![OwnedRow::new(vec![Value::Int64(1)])]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rows"][0][0], 1);
        assert_eq!(json["columns"][0]["name"], "id");
    }
}
