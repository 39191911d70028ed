/// Cons cell storage and the index-stable handles that name it.
use std::fmt;
use std::mem::replace;

use crate::types::Tag;
use crate::value::Value;

/// Where a cell's storage lives: which page, and which slot in it. A cell
/// keeps its `CellId` for the life of the heap no matter how often it is
/// relocated between zones or tables, and across every reuse of its storage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellId {
    page: u32,
    offset: u32,
}

impl CellId {
    pub(crate) fn new(page: usize, offset: usize) -> CellId {
        CellId {
            page: page as u32,
            offset: offset as u32,
        }
    }

    pub(crate) fn page(&self) -> usize {
        self.page as usize
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.offset)
    }
}

/// Opaque handle to one cons cell as issued by one heap. Besides the storage
/// location it records the issuing heap and the generation of the storage at
/// allocation time, so a handle outliving its cell, or presented to another
/// heap, is recognized rather than resolving to whatever occupies the slot now.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConsId {
    heap: u32,
    cell: CellId,
    generation: u32,
}

impl ConsId {
    pub(crate) fn new(heap: u32, cell: CellId, generation: u32) -> ConsId {
        ConsId {
            heap,
            cell,
            generation,
        }
    }

    pub(crate) fn heap(&self) -> u32 {
        self.heap
    }

    pub(crate) fn cell(&self) -> CellId {
        self.cell
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ConsId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}@{}", self.heap, self.cell, self.generation)
    }
}

const ROOT_BIT: u32 = 1 << 31;
const SLOT_MASK: u32 = !ROOT_BIT;

/// Largest slot index a cell can record
pub const MAX_SLOT_INDEX: usize = SLOT_MASK as usize;

/// A pair of values plus the bookkeeping word that locates the cell in the
/// table currently owning it.
pub struct ConsCell {
    car: Value,
    cdr: Value,
    tag: Tag,
    // bumped every time the storage is reused for a new pair
    generation: u32,
    // root flag in the top bit, table position in the rest
    packed: u32,
}

impl ConsCell {
    /// An unused cell sitting at `slot` in the cons table's free tail
    pub(crate) fn spare(slot: usize) -> ConsCell {
        ConsCell {
            car: Value::nil(),
            cdr: Value::nil(),
            tag: Tag::CONS,
            generation: 0,
            packed: slot as u32 & SLOT_MASK,
        }
    }

    pub fn car(&self) -> &Value {
        &self.car
    }

    pub fn cdr(&self) -> &Value {
        &self.cdr
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_root(&self) -> bool {
        self.packed & ROOT_BIT != 0
    }

    pub fn slot_index(&self) -> usize {
        (self.packed & SLOT_MASK) as usize
    }

    pub(crate) fn set_slot(&mut self, slot: usize, is_root: bool) {
        debug_assert!(slot <= MAX_SLOT_INDEX);
        let root_bit = if is_root { ROOT_BIT } else { 0 };
        self.packed = (slot as u32 & SLOT_MASK) | root_bit;
    }

    pub(crate) fn set_slot_index(&mut self, slot: usize) {
        let is_root = self.is_root();
        self.set_slot(slot, is_root);
    }

    /// Reuse this cell's storage for a new pair. Whatever the previous
    /// occupant held is released here, and handles to it stop resolving.
    pub(crate) fn reset(&mut self, tag: Tag, car: Value, cdr: Value) {
        self.tag = tag;
        self.generation = self.generation.wrapping_add(1);
        drop(replace(&mut self.car, car));
        drop(replace(&mut self.cdr, cdr));
    }

    pub(crate) fn replace_car(&mut self, car: Value) -> Value {
        replace(&mut self.car, car)
    }

    pub(crate) fn replace_cdr(&mut self, cdr: Value) -> Value {
        replace(&mut self.cdr, cdr)
    }
}
