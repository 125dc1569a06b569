//! Ordered cursor over the records of a database.

use crate::btree::{self, LeafNode};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::pager::Pager;
use crate::types::PageNo;

/// How [`Cursor::seek`] treats a key that is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Only the key itself.
    Exact,
    /// The largest stored key not above the target.
    LessOrEqual,
    /// The smallest stored key not below the target.
    GreaterOrEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Uninitialized,
    At {
        leaf: PageNo,
        slot: usize,
        key: Vec<u8>,
    },
    Invalid,
}

/// A leaf and a slot inside it.
type Hit = Option<(LeafNode, usize)>;

/// A stateful iterator over records in key order.
///
/// A cursor starts uninitialized; [`first`](Cursor::first),
/// [`last`](Cursor::last) or [`seek`](Cursor::seek) position it, and
/// [`advance`](Cursor::advance)/[`previous`](Cursor::previous) move it one
/// record at a time. Moving past either end leaves the cursor invalid, which
/// is not an error.
///
/// The cursor remembers the key it stands on. When the store changes under
/// it, the next move re-seeks relative to that key, and reading a record that
/// has since been deleted invalidates the cursor.
///
/// [`iter`](Cursor::iter) borrows the cursor as an [`Iterator`] of
/// `(key, value)` pairs from its current position (or from the first record
/// when uninitialized); `into_iter` does the same for an owned cursor.
///
/// ```rust
/// use quarry_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// db.store(b"nombre", b"Juan").unwrap();
/// db.store(b"edad", b"30").unwrap();
///
/// let keys: Vec<Vec<u8>> = db
///     .cursor()
///     .unwrap()
///     .into_iter()
///     .map(|record| record.unwrap().0)
///     .collect();
/// assert_eq!(keys, vec![b"edad".to_vec(), b"nombre".to_vec()]);
/// ```
pub struct Cursor<'db> {
    db: &'db Database,
    position: Position,
    generation: u64,
    yielded: bool,
}

impl<'db> Cursor<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        db.cursor_opened();
        Self {
            db,
            position: Position::Uninitialized,
            generation: 0,
            yielded: false,
        }
    }

    /// Moves to the smallest key. Returns `false` on an empty store.
    ///
    /// # Errors
    ///
    /// A storage error; the position is unchanged.
    pub fn first(&mut self) -> CoreResult<bool> {
        self.db.stats_handle().record_cursor_seek();
        let found = self.db.read_at(|pager, generation| {
            let hit = match btree::first_leaf(pager)? {
                Some(leaf) => settle_forward(pager, leaf, 0)?,
                None => None,
            };
            Ok((hit, generation))
        })?;
        Ok(self.land(found))
    }

    /// Moves to the largest key. Returns `false` on an empty store.
    ///
    /// # Errors
    ///
    /// A storage error; the position is unchanged.
    pub fn last(&mut self) -> CoreResult<bool> {
        self.db.stats_handle().record_cursor_seek();
        let found = self.db.read_at(|pager, generation| {
            let hit = match btree::last_leaf(pager)? {
                Some(leaf) => {
                    let slot = leaf.cells.len().checked_sub(1);
                    settle_backward(pager, leaf, slot)?
                }
                None => None,
            };
            Ok((hit, generation))
        })?;
        Ok(self.land(found))
    }

    /// Positions the cursor on `key` or its nearest neighbour.
    ///
    /// Returns `false`, leaving the cursor invalid, if no stored key
    /// satisfies `mode`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key, or a storage error.
    pub fn seek(&mut self, key: &[u8], mode: SeekMode) -> CoreResult<bool> {
        if key.is_empty() {
            return Err(CoreError::invalid_argument("seek key must not be empty"));
        }
        self.db.stats_handle().record_cursor_seek();
        let found = self.db.read_at(|pager, generation| {
            let Some(leaf) = btree::find_leaf(pager, key)? else {
                return Ok((None, generation));
            };
            let hit = match (leaf.search(key), mode) {
                (Ok(slot), _) => Some((leaf, slot)),
                (Err(_), SeekMode::Exact) => None,
                (Err(slot), SeekMode::GreaterOrEqual) => settle_forward(pager, leaf, slot)?,
                (Err(slot), SeekMode::LessOrEqual) => {
                    settle_backward(pager, leaf, slot.checked_sub(1))?
                }
            };
            Ok((hit, generation))
        })?;
        Ok(self.land(found))
    }

    /// Moves to the next key. From an uninitialized cursor this is
    /// [`first`](Cursor::first).
    ///
    /// Returns `false` past the last record; the cursor is then invalid.
    ///
    /// # Errors
    ///
    /// A storage error.
    pub fn advance(&mut self) -> CoreResult<bool> {
        let (leaf_no, slot, key) = match &self.position {
            Position::Uninitialized => return self.first(),
            Position::Invalid => return Ok(false),
            Position::At { leaf, slot, key } => (*leaf, *slot, key.clone()),
        };
        let seen = self.generation;
        let found = self.db.read_at(|pager, generation| {
            let hit = if generation == seen {
                let leaf = btree::load_leaf(pager, leaf_no)?;
                settle_forward(pager, leaf, slot + 1)?
            } else {
                after(pager, &key)?
            };
            Ok((hit, generation))
        })?;
        Ok(self.land(found))
    }

    /// Moves to the previous key. From an uninitialized cursor this is
    /// [`last`](Cursor::last).
    ///
    /// Returns `false` before the first record; the cursor is then invalid.
    ///
    /// # Errors
    ///
    /// A storage error.
    pub fn previous(&mut self) -> CoreResult<bool> {
        let (leaf_no, slot, key) = match &self.position {
            Position::Uninitialized => return self.last(),
            Position::Invalid => return Ok(false),
            Position::At { leaf, slot, key } => (*leaf, *slot, key.clone()),
        };
        let seen = self.generation;
        let found = self.db.read_at(|pager, generation| {
            let hit = if generation == seen {
                let leaf = btree::load_leaf(pager, leaf_no)?;
                settle_backward(pager, leaf, slot.checked_sub(1))?
            } else {
                match btree::find_leaf(pager, &key)? {
                    Some(leaf) => {
                        let below = match leaf.search(&key) {
                            Ok(slot) | Err(slot) => slot.checked_sub(1),
                        };
                        settle_backward(pager, leaf, below)?
                    }
                    None => None,
                }
            };
            Ok((hit, generation))
        })?;
        Ok(self.land(found))
    }

    /// Key of the current record.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the cursor is not on a record, including when its
    /// record was deleted since it was positioned.
    pub fn key(&mut self) -> CoreResult<Vec<u8>> {
        self.record().map(|(key, _)| key)
    }

    /// Value of the current record.
    ///
    /// # Errors
    ///
    /// As for [`Cursor::key`].
    pub fn value(&mut self) -> CoreResult<Vec<u8>> {
        self.record().map(|(_, value)| value)
    }

    /// Key and value of the current record.
    ///
    /// # Errors
    ///
    /// As for [`Cursor::key`].
    pub fn record(&mut self) -> CoreResult<(Vec<u8>, Vec<u8>)> {
        let (leaf_no, slot, key) = match &self.position {
            Position::At { leaf, slot, key } => (*leaf, *slot, key.clone()),
            _ => return Err(CoreError::invalid_state("cursor is not positioned on a record")),
        };
        let seen = self.generation;
        let (record, hit) = self.db.read_at(|pager, generation| {
            let leaf = if generation == seen {
                Some(btree::load_leaf(pager, leaf_no)?)
            } else {
                btree::find_leaf(pager, &key)?
            };
            let current = leaf.and_then(|leaf| {
                let slot = if generation == seen { Ok(slot) } else { leaf.search(&key) };
                match slot {
                    Ok(slot) if leaf.cells.get(slot).is_some_and(|c| c.key == key) => {
                        Some((leaf, slot))
                    }
                    _ => None,
                }
            });
            match current {
                Some((leaf, slot)) => {
                    let value = btree::read_value(pager, &leaf.cells[slot].value)?;
                    Ok((Some((key.clone(), value)), (Some((leaf, slot)), generation)))
                }
                None => Ok((None, (None, generation))),
            }
        })?;
        self.land(hit);
        record.ok_or_else(|| CoreError::invalid_state("the cursor's record was deleted"))
    }

    /// Deletes the current record and moves to the next one.
    ///
    /// Returns `false` if no record follows; the cursor is then invalid.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the cursor is not on a record, or the error from
    /// the delete.
    pub fn delete_current(&mut self) -> CoreResult<bool> {
        let key = match &self.position {
            Position::At { key, .. } => key.clone(),
            _ => return Err(CoreError::invalid_state("cursor is not positioned on a record")),
        };
        self.db.delete(&key)?;
        let found = self
            .db
            .read_at(|pager, generation| Ok((after(pager, &key)?, generation)))?;
        Ok(self.land(found))
    }

    /// Returns the cursor to its uninitialized state.
    pub fn reset(&mut self) {
        self.position = Position::Uninitialized;
        self.yielded = false;
    }

    /// Returns `true` while the cursor stands on a record.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    fn land(&mut self, (hit, generation): (Hit, u64)) -> bool {
        self.generation = generation;
        self.yielded = false;
        match hit {
            Some((leaf, slot)) => {
                self.position = Position::At {
                    leaf: leaf.no,
                    slot,
                    key: leaf.cells[slot].key.clone(),
                };
                true
            }
            None => {
                self.position = Position::Invalid;
                false
            }
        }
    }
}

/// The first record strictly after `key`.
fn after(pager: &mut Pager, key: &[u8]) -> CoreResult<Hit> {
    match btree::find_leaf(pager, key)? {
        Some(leaf) => {
            let slot = match leaf.search(key) {
                Ok(slot) => slot + 1,
                Err(slot) => slot,
            };
            settle_forward(pager, leaf, slot)
        }
        None => Ok(None),
    }
}

/// Walks right until `slot` names a record.
fn settle_forward(pager: &mut Pager, mut leaf: LeafNode, mut slot: usize) -> CoreResult<Hit> {
    for _ in 0..=pager.page_count() {
        if slot < leaf.cells.len() {
            return Ok(Some((leaf, slot)));
        }
        if leaf.next.is_none() {
            return Ok(None);
        }
        leaf = btree::load_leaf(pager, leaf.next)?;
        slot = 0;
    }
    Err(CoreError::corrupt("leaf chain loops"))
}

/// Walks left until `slot` names a record; `None` means before this leaf.
fn settle_backward(
    pager: &mut Pager,
    mut leaf: LeafNode,
    mut slot: Option<usize>,
) -> CoreResult<Hit> {
    for _ in 0..=pager.page_count() {
        if let Some(s) = slot {
            if s < leaf.cells.len() {
                return Ok(Some((leaf, s)));
            }
        }
        if leaf.prev.is_none() {
            return Ok(None);
        }
        leaf = btree::load_leaf(pager, leaf.prev)?;
        slot = leaf.cells.len().checked_sub(1);
    }
    Err(CoreError::corrupt("leaf chain loops"))
}

impl<'db> Cursor<'db> {
    /// Iterates `(key, value)` pairs from the current position.
    pub fn iter(&mut self) -> Records<'_, 'db> {
        Records { cursor: self }
    }

    fn next_record(&mut self) -> Option<CoreResult<(Vec<u8>, Vec<u8>)>> {
        let moved = match (&self.position, self.yielded) {
            (Position::Uninitialized, _) => self.first(),
            (Position::At { .. }, false) => Ok(true),
            (Position::At { .. }, true) => self.advance(),
            (Position::Invalid, _) => return None,
        };
        match moved {
            Ok(true) => {
                let record = self.record();
                self.yielded = true;
                Some(record)
            }
            Ok(false) => None,
            Err(err) => {
                self.position = Position::Invalid;
                Some(Err(err))
            }
        }
    }
}

/// Borrowing iterator returned by [`Cursor::iter`].
pub struct Records<'c, 'db> {
    cursor: &'c mut Cursor<'db>,
}

impl Iterator for Records<'_, '_> {
    type Item = CoreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_record()
    }
}

/// Owning iterator over the records of a cursor.
pub struct IntoRecords<'db> {
    cursor: Cursor<'db>,
}

impl Iterator for IntoRecords<'_> {
    type Item = CoreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_record()
    }
}

impl<'db> IntoIterator for Cursor<'db> {
    type Item = CoreResult<(Vec<u8>, Vec<u8>)>;
    type IntoIter = IntoRecords<'db>;

    fn into_iter(self) -> Self::IntoIter {
        IntoRecords { cursor: self }
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        self.db.cursor_closed();
    }
}
