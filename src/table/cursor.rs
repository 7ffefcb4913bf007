//! Sequential cursor over a table store
//!
//! A cursor is in one of three states: not started, active on a row, or
//! exhausted. A materialized cursor records every row it visits into a
//! replay buffer; after `rewind` it replays the buffer from position 0
//! and only falls back to scanning the store for rows not yet buffered.

use thiserror::Error;

use crate::value::CellValue;

use super::store::TableStore;

/// Cursor position state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    NotStarted,
    /// Positioned on the given row index
    Active(usize),
    Exhausted,
}

/// Invalid use of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CursorStateError {
    #[error("cursor has not been advanced to a row")]
    NotStarted,
    #[error("cursor is exhausted")]
    Exhausted,
    #[error("cursor is single-pass and cannot be rewound")]
    NotReplayable,
}

#[derive(Debug, Default)]
struct ReplayBuffer {
    rows: Vec<usize>,
    complete: bool,
}

/// Cursor that owns the table it iterates
#[derive(Debug)]
pub struct TableCursor {
    table: TableStore,
    state: CursorState,
    /// Logical position in the visit sequence, -1 before the first row
    step: isize,
    /// Next source row not yet visited
    scanned: usize,
    replay: Option<ReplayBuffer>,
}

impl TableCursor {
    /// Creates a single-pass cursor
    pub fn new(table: TableStore) -> Self {
        Self {
            table,
            state: CursorState::NotStarted,
            step: -1,
            scanned: 0,
            replay: None,
        }
    }

    /// Creates a cursor that buffers its scan for replay
    pub fn materialized(table: TableStore) -> Self {
        Self {
            replay: Some(ReplayBuffer::default()),
            ..Self::new(table)
        }
    }

    /// Returns the underlying table
    pub fn table(&self) -> &TableStore {
        &self.table
    }

    /// Returns the current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Returns true once a materialized cursor has buffered the whole table
    pub fn is_fully_buffered(&self) -> bool {
        self.replay.as_ref().map_or(false, |r| r.complete)
    }

    /// Moves to the next row. Returns false once exhausted.
    pub fn advance(&mut self) -> bool {
        if self.state == CursorState::Exhausted {
            return false;
        }
        let next_step = (self.step + 1) as usize;

        let next_row = match self.replay.as_mut() {
            Some(replay) if next_step < replay.rows.len() => Some(replay.rows[next_step]),
            Some(replay) if replay.complete => None,
            Some(replay) => {
                let row = Self::scan(&self.table, &mut self.scanned);
                match row {
                    Some(r) => replay.rows.push(r),
                    None => replay.complete = true,
                }
                row
            }
            None => Self::scan(&self.table, &mut self.scanned),
        };

        match next_row {
            Some(row) => {
                self.step = next_step as isize;
                self.state = CursorState::Active(row);
                true
            }
            None => {
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    fn scan(table: &TableStore, scanned: &mut usize) -> Option<usize> {
        if *scanned < table.len() {
            let row = *scanned;
            *scanned += 1;
            Some(row)
        } else {
            None
        }
    }

    /// Returns the current row index
    pub fn position(&self) -> Result<usize, CursorStateError> {
        match self.state {
            CursorState::Active(row) => Ok(row),
            CursorState::NotStarted => Err(CursorStateError::NotStarted),
            CursorState::Exhausted => Err(CursorStateError::Exhausted),
        }
    }

    /// Returns the cells of the current row
    pub fn current_row(&self) -> Result<&[CellValue], CursorStateError> {
        let row = self.position()?;
        self.table.row(row).ok_or(CursorStateError::Exhausted)
    }

    /// Restarts a materialized cursor from position 0
    pub fn rewind(&mut self) -> Result<(), CursorStateError> {
        if self.replay.is_none() {
            return Err(CursorStateError::NotReplayable);
        }
        self.step = -1;
        self.state = CursorState::NotStarted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(n: usize) -> TableStore {
        TableStore::new(
            "1",
            "t",
            vec!["v".into()],
            (0..n).map(|i| vec![CellValue::from(i as i64)]).collect(),
        )
    }

    fn drain(cursor: &mut TableCursor) -> Vec<usize> {
        let mut seen = Vec::new();
        while cursor.advance() {
            seen.push(cursor.position().unwrap());
        }
        seen
    }

    #[test]
    fn test_state_machine() {
        let mut cursor = TableCursor::new(make_table(1));
        assert_eq!(cursor.state(), CursorState::NotStarted);
        assert_eq!(cursor.position(), Err(CursorStateError::NotStarted));

        assert!(cursor.advance());
        assert_eq!(cursor.state(), CursorState::Active(0));
        assert_eq!(cursor.current_row().unwrap(), &[CellValue::Number(0.0)]);

        assert!(!cursor.advance());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert_eq!(cursor.current_row(), Err(CursorStateError::Exhausted));
        assert!(!cursor.advance());
    }

    #[test]
    fn test_single_pass_cannot_rewind() {
        let mut cursor = TableCursor::new(make_table(2));
        drain(&mut cursor);
        assert_eq!(cursor.rewind(), Err(CursorStateError::NotReplayable));
    }

    #[test]
    fn test_materialized_replays() {
        let mut cursor = TableCursor::materialized(make_table(3));
        assert_eq!(drain(&mut cursor), vec![0, 1, 2]);
        assert!(cursor.is_fully_buffered());

        cursor.rewind().unwrap();
        assert_eq!(drain(&mut cursor), vec![0, 1, 2]);
    }

    #[test]
    fn test_rewind_mid_scan_continues_buffering() {
        let mut cursor = TableCursor::materialized(make_table(3));
        assert!(cursor.advance());
        assert!(!cursor.is_fully_buffered());

        cursor.rewind().unwrap();
        assert_eq!(drain(&mut cursor), vec![0, 1, 2]);
        assert!(cursor.is_fully_buffered());
    }

    #[test]
    fn test_empty_table() {
        let mut cursor = TableCursor::materialized(make_table(0));
        assert!(!cursor.advance());
        cursor.rewind().unwrap();
        assert!(!cursor.advance());
    }
}
