/// The cons table: every non-rooted cell handle in the heap, partitioned by
/// position into color zones.
///
/// ```text
///  0         black_top     grey_begin      grey_top        white_top       capacity
///  | black    |    gap      |    grey       |    white      |    free        |
/// ```
///
/// A cell's color is the zone its slot falls in. Moving a cell between zones
/// swaps two slots and fixes up both cells' `slot_index`; cell contents are
/// never copied. Gap and free slots hold spare cells so that every slot
/// always names a cell.
use log::trace;

use crate::cell::CellId;
use crate::error::HeapError;
use crate::store::CellStore;

/// The zone a cons table slot belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Zone {
    Black,
    Gap,
    Grey,
    White,
    Free,
}

/// Snapshot of the zone boundaries
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Boundaries {
    pub black_top: usize,
    pub grey_begin: usize,
    pub grey_top: usize,
    pub white_top: usize,
    pub capacity: usize,
}

pub struct ConsTable {
    slots: Vec<CellId>,
    black_top: usize,
    grey_begin: usize,
    grey_top: usize,
    white_top: usize,
}

impl ConsTable {
    pub fn new() -> ConsTable {
        ConsTable {
            slots: Vec::new(),
            black_top: 0,
            grey_begin: 0,
            grey_top: 0,
            white_top: 0,
        }
    }

    pub fn boundaries(&self) -> Boundaries {
        Boundaries {
            black_top: self.black_top,
            grey_begin: self.grey_begin,
            grey_top: self.grey_top,
            white_top: self.white_top,
            capacity: self.slots.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> CellId {
        self.slots[index]
    }

    pub fn slots(&self) -> &[CellId] {
        &self.slots
    }

    pub fn zone_of(&self, index: usize) -> Zone {
        if index < self.black_top {
            Zone::Black
        } else if index < self.grey_begin {
            Zone::Gap
        } else if index < self.grey_top {
            Zone::Grey
        } else if index < self.white_top {
            Zone::White
        } else {
            Zone::Free
        }
    }

    pub fn is_full(&self) -> bool {
        self.white_top == self.slots.len()
    }

    pub fn has_grey(&self) -> bool {
        self.grey_begin < self.grey_top
    }

    /// True when a black cell can be inserted without growing the table
    pub fn has_black_room(&self) -> bool {
        self.black_top < self.grey_begin || !self.is_full()
    }

    /// Extend the table with a page of spare cells
    pub fn grow(&mut self, store: &mut CellStore, cells_per_page: usize) -> Result<(), HeapError> {
        blockalloc::grow_array(&mut self.slots, cells_per_page)?;
        let ids = store.new_page(cells_per_page, self.slots.len())?;
        self.slots.extend(ids);
        Ok(())
    }

    /// Drop free slots past `capacity`, undoing a growth step
    pub fn truncate(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.white_top);
        self.slots.truncate(capacity);
    }

    /// Swap two slots and record the new positions in both cells
    fn swap(&mut self, store: &mut CellStore, a: usize, b: usize) {
        if a == b {
            return;
        }

        self.slots.swap(a, b);
        store[self.slots[a]].set_slot_index(a);
        store[self.slots[b]].set_slot_index(b);
    }

    /// Put `incoming` at slot `index`, returning the cell that was there
    pub fn replace(&mut self, store: &mut CellStore, index: usize, incoming: CellId) -> CellId {
        let outgoing = self.slots[index];
        self.slots[index] = incoming;
        store[incoming].set_slot(index, false);
        outgoing
    }

    /// Claim the first free slot as a new white cell. The table must not be
    /// full.
    pub fn claim_white(&mut self) -> usize {
        debug_assert!(!self.is_full());
        let index = self.white_top;
        self.white_top += 1;
        index
    }

    /// Take the cell at `index` out of its zone. The last cell of the same
    /// zone fills the vacated slot and the zone shrinks by one; the slot the
    /// cell ends up in (now outside every live zone) is returned.
    pub fn remove(&mut self, store: &mut CellStore, index: usize) -> usize {
        let hole = match self.zone_of(index) {
            Zone::Black => {
                self.swap(store, index, self.black_top - 1);
                self.black_top -= 1;
                self.black_top
            }
            Zone::Grey => {
                self.swap(store, index, self.grey_top - 1);
                self.swap(store, self.grey_top - 1, self.white_top - 1);
                self.grey_top -= 1;
                self.white_top -= 1;
                self.white_top
            }
            Zone::White => {
                self.swap(store, index, self.white_top - 1);
                self.white_top -= 1;
                self.white_top
            }
            // callers reach here only through a resolved live handle, and
            // live cells never sit in the gap or the free tail
            Zone::Gap | Zone::Free => unreachable!("slot {} does not hold a live cell", index),
        };

        trace!("removed slot {} from table, parked at {}", index, hole);
        hole
    }

    /// Move the white cell at `index` to the end of the grey zone
    pub fn shade(&mut self, store: &mut CellStore, index: usize) {
        debug_assert!(self.zone_of(index) == Zone::White);
        self.swap(store, index, self.grey_top);
        self.grey_top += 1;
        trace!("shaded slot {} grey at {}", index, self.grey_top - 1);
    }

    /// Make room for one more black cell, returning the slot reserved for
    /// it. The slot still holds a spare cell for the caller to exchange.
    /// Requires `has_black_room()`.
    pub fn open_black(&mut self, store: &mut CellStore) -> usize {
        if self.black_top < self.grey_begin {
            let index = self.black_top;
            self.black_top += 1;
            return index;
        }

        debug_assert!(!self.is_full());

        // rotate the first white and first grey one place up so the spare
        // at white_top lands on the black/grey boundary. The oldest grey
        // cell becomes the newest, so scan order within the grey zone is not
        // preserved across this step; reachability is unaffected.
        self.swap(store, self.grey_top, self.white_top);
        self.swap(store, self.grey_begin, self.grey_top);

        let index = self.grey_begin;
        self.black_top += 1;
        self.grey_begin += 1;
        self.grey_top += 1;
        self.white_top += 1;
        index
    }

    /// Promote the oldest grey cell to black, returning it
    pub fn blacken_next(&mut self, store: &mut CellStore) -> Option<CellId> {
        if !self.has_grey() {
            return None;
        }

        if self.black_top < self.grey_begin {
            self.swap(store, self.black_top, self.grey_begin);
        }

        let id = self.slots[self.black_top];
        self.black_top += 1;
        self.grey_begin += 1;
        Some(id)
    }

    /// Return the white zone to the free tail. Returns the number of cells
    /// reclaimed.
    pub fn reclaim_white(&mut self) -> usize {
        let reclaimed = self.white_top - self.grey_top;
        self.white_top = self.grey_top;
        reclaimed
    }

    /// Start a new cycle: every black cell becomes white, the gap joins the
    /// free tail. Grey and white must be empty.
    pub fn flip(&mut self) {
        debug_assert!(!self.has_grey() && self.grey_top == self.white_top);

        self.white_top = self.black_top;
        self.black_top = 0;
        self.grey_begin = 0;
        self.grey_top = 0;
    }
}
