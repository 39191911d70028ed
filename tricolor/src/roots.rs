/// The root table: cells pinned by references from outside the heap.
///
/// The first `len` entries are live roots, each with a count of at least
/// one. Entries past `len` hold spare cells, which are exchanged with the
/// cons table whenever a cell is rooted or unrooted.
use crate::cell::CellId;
use crate::error::HeapError;
use crate::store::CellStore;

#[derive(Copy, Clone, Debug)]
struct RootEntry {
    cell: CellId,
    count: usize,
}

pub struct RootTable {
    entries: Vec<RootEntry>,
    len: usize,
}

impl RootTable {
    pub fn new() -> RootTable {
        RootTable {
            entries: Vec::new(),
            len: 0,
        }
    }

    /// Number of live roots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.entries.len()
    }

    pub fn cell(&self, index: usize) -> CellId {
        self.entries[index].cell
    }

    pub fn count(&self, index: usize) -> usize {
        self.entries[index].count
    }

    /// Live root cells, in table order
    pub fn live(&self) -> impl Iterator<Item = CellId> + '_ {
        self.entries[..self.len].iter().map(|entry| entry.cell)
    }

    /// Extend the table with a page of spare entries
    pub fn grow(&mut self, store: &mut CellStore, roots_per_page: usize) -> Result<(), HeapError> {
        blockalloc::grow_array(&mut self.entries, roots_per_page)?;
        let ids = store.new_page(roots_per_page, self.entries.len())?;
        self.entries
            .extend(ids.into_iter().map(|cell| RootEntry { cell, count: 0 }));
        Ok(())
    }

    /// Drop spare entries past `capacity`, undoing a growth step
    pub fn truncate(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.len);
        self.entries.truncate(capacity);
    }

    pub fn increment(&mut self, index: usize) -> usize {
        debug_assert!(index < self.len);
        self.entries[index].count += 1;
        self.entries[index].count
    }

    pub fn decrement(&mut self, index: usize) -> usize {
        debug_assert!(index < self.len && self.entries[index].count > 0);
        self.entries[index].count -= 1;
        self.entries[index].count
    }

    /// Add `cell` as a new root with a count of one, returning the spare
    /// cell it displaced. The table must not be full.
    pub fn install(&mut self, store: &mut CellStore, cell: CellId) -> CellId {
        debug_assert!(!self.is_full());

        let index = self.len;
        let spare = self.entries[index].cell;

        self.entries[index] = RootEntry { cell, count: 1 };
        store[cell].set_slot(index, true);
        self.len += 1;

        spare
    }

    /// Retire the root at `index`: the last live entry takes its place and
    /// the retired cell is parked in the first spare entry, whose index is
    /// returned.
    pub fn retire(&mut self, store: &mut CellStore, index: usize) -> usize {
        debug_assert!(index < self.len && self.entries[index].count == 0);

        let last = self.len - 1;
        if index != last {
            self.entries.swap(index, last);
            store[self.entries[index].cell].set_slot_index(index);
            store[self.entries[last].cell].set_slot_index(last);
        }

        self.len = last;
        last
    }

    /// Put the spare `incoming` at non-live entry `index`, returning the cell
    /// that was there
    pub fn replace_spare(&mut self, store: &mut CellStore, index: usize, incoming: CellId) -> CellId {
        debug_assert!(index >= self.len);

        let outgoing = self.entries[index].cell;
        self.entries[index] = RootEntry {
            cell: incoming,
            count: 0,
        };
        store[incoming].set_slot(index, false);
        outgoing
    }
}
