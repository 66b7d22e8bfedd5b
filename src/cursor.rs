//! Iterator bridge between native fetch loops and the result-set protocol.
//!
//! Each backend implements [`RowSource`] once. The source is wrapped in a
//! [`SharedCursor`], reference counted, and handed to every [`RowIter`]
//! created by `begin()`. All of those iterators observe the same native
//! position: advancing one advances the others. Starting a second
//! iteration before the first is exhausted interleaves consumption of the
//! cursor, and that is left to the caller to avoid.
//!
//! Interleaving is not guarded against, but it never panics: advancing any
//! iterator while a row borrowed from the same cursor is still alive fails
//! with [`Error::CursorBusy`].
//!
//! Iterators compare by difference only. Two iterators differ when they
//! point at different cursors, or at the same cursor at a different step or
//! validity. The sentinel returned by [`RowIter::end`] carries no cursor and
//! equals any exhausted iterator, so the only supported loop is
//! "advance until equal to end".

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::row::Row;

/// One backend's native fetch loop.
///
/// Native state is released by the source's `Drop`, which runs exactly
/// once, when the last holder of the cursor goes away (or when opening the
/// cursor fails).
pub trait RowSource {
    /// Move the native cursor to the next row.
    ///
    /// Returns `Ok(false)` once the native driver reports no more data.
    fn fetch(&mut self) -> Result<bool>;

    /// The row the native cursor currently points at. Only valid until the
    /// next `fetch`.
    fn current(&self) -> Option<&(dyn Row + 'static)>;
}

struct CursorState<'a> {
    source: Box<dyn RowSource + 'a>,
    steps: u64,
    valid: bool,
}

impl Drop for CursorState<'_> {
    fn drop(&mut self) {
        tracing::trace!(steps = self.steps, "releasing native cursor");
    }
}

/// Cursor state shared between a result set and its iterators.
pub struct SharedCursor<'a> {
    state: RefCell<CursorState<'a>>,
}

impl<'a> SharedCursor<'a> {
    /// Wrap a source and position it on its first row.
    pub fn open(mut source: Box<dyn RowSource + 'a>) -> Result<Rc<Self>> {
        let valid = source.fetch()?;
        Ok(Rc::new(Self {
            state: RefCell::new(CursorState {
                source,
                steps: 0,
                valid,
            }),
        }))
    }

    /// Whether the current position denotes a row.
    pub fn has_row(&self) -> bool {
        self.state.borrow().valid
    }
}

/// Object-safe view of a [`SharedCursor`] so iterators can borrow it for a
/// shorter lifetime than the cursor's own.
trait CursorHandle {
    fn position(&self) -> (u64, bool);
    fn advance(&self) -> Result<()>;
    fn current(&self) -> Result<Ref<'_, dyn Row + 'static>>;
}

impl CursorHandle for SharedCursor<'_> {
    fn position(&self) -> (u64, bool) {
        let state = self.state.borrow();
        (state.steps, state.valid)
    }

    fn advance(&self) -> Result<()> {
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| Error::CursorBusy)?;
        if !state.valid {
            return Ok(());
        }
        state.steps += 1;
        match state.source.fetch() {
            Ok(more) => {
                state.valid = more;
                Ok(())
            }
            Err(e) => {
                state.valid = false;
                Err(e)
            }
        }
    }

    fn current(&self) -> Result<Ref<'_, dyn Row + 'static>> {
        let state = self.state.try_borrow().map_err(|_| Error::CursorBusy)?;
        if !state.valid {
            return Err(Error::InvalidIterator);
        }
        Ref::filter_map(state, |s| s.source.current()).map_err(|_| Error::InvalidIterator)
    }
}

/// Forward-only, single-pass iterator over the rows of a result set.
///
/// Not `Clone`: the position it refers to is shared, not copied.
pub struct RowIter<'c> {
    cursor: Option<Rc<dyn CursorHandle + 'c>>,
}

impl<'c> RowIter<'c> {
    /// A live iterator bound to `cursor`.
    pub fn over<'a: 'c>(cursor: &Rc<SharedCursor<'a>>) -> Self {
        let handle: Rc<dyn CursorHandle + 'c> = cursor.clone();
        Self {
            cursor: Some(handle),
        }
    }

    /// The sentinel. Carries no cursor state.
    pub fn end() -> Self {
        Self { cursor: None }
    }

    /// Whether this iterator currently points at a row.
    pub fn is_valid(&self) -> bool {
        self.cursor.as_ref().is_some_and(|c| c.position().1)
    }

    /// The current row. Fails with [`Error::InvalidIterator`] on the
    /// sentinel or an exhausted cursor.
    ///
    /// While the returned guard is alive, advancing any iterator over the
    /// same cursor fails with [`Error::CursorBusy`].
    pub fn get(&self) -> Result<Ref<'_, dyn Row + 'static>> {
        match &self.cursor {
            Some(cursor) => cursor.current(),
            None => Err(Error::InvalidIterator),
        }
    }

    /// Step to the next row. A no-op on the sentinel and on an exhausted
    /// cursor. A fetch error exhausts the cursor and is returned.
    /// Fails with [`Error::CursorBusy`] while a row of this cursor is
    /// borrowed.
    pub fn advance(&mut self) -> Result<()> {
        match &self.cursor {
            Some(cursor) => cursor.advance(),
            None => Ok(()),
        }
    }
}

impl PartialEq for RowIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.cursor, &other.cursor) {
            (None, None) => true,
            (Some(c), None) | (None, Some(c)) => !c.position().1,
            (Some(a), Some(b)) => {
                let same_state = std::ptr::eq(
                    Rc::as_ptr(a) as *const (),
                    Rc::as_ptr(b) as *const (),
                );
                same_state && a.position() == b.position()
            }
        }
    }
}

impl fmt::Debug for RowIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cursor {
            None => f.write_str("RowIter(end)"),
            Some(c) => {
                let (steps, valid) = c.position();
                f.debug_struct("RowIter")
                    .field("steps", &steps)
                    .field("valid", &valid)
                    .finish()
            }
        }
    }
}
