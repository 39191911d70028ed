/// The heap: cons storage, the tri-color cons table, the root table and the
/// object type table, owned together by a single mutator.
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::cell::{CellId, ConsId};
use crate::config::HeapConfig;
use crate::error::{err_type, HeapError};
use crate::object::{Closure, ObjectBody, ObjectRef};
use crate::roots::RootTable;
use crate::store::CellStore;
use crate::table::{Boundaries, ConsTable, Zone};
use crate::types::{Tag, TypeTable};
use crate::value::Value;

/// The collector's view of a cons cell
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Black,
    Grey,
    White,
    Root,
}

/// Occupancy of each zone and table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZoneStats {
    pub black: usize,
    pub gap: usize,
    pub grey: usize,
    pub white: usize,
    pub free: usize,
    pub capacity: usize,
    pub roots: usize,
    pub root_capacity: usize,
    pub pages: usize,
}

/// Table and page sizes before a multi-step growth, for rolling it back
#[derive(Copy, Clone)]
struct GrowthMark {
    pages: usize,
    table: usize,
    roots: usize,
}

/// Source of the identity stamped into every handle a heap issues
static NEXT_HEAP_ID: AtomicU32 = AtomicU32::new(1);

pub struct Heap {
    id: u32,
    config: HeapConfig,
    pub(crate) store: CellStore,
    pub(crate) table: ConsTable,
    pub(crate) roots: RootTable,
    types: TypeTable,
}

impl Heap {
    /// A heap with default sizing. Nothing is allocated until the first
    /// cons is made.
    pub fn new() -> Heap {
        Heap::with_config(HeapConfig::default())
    }

    pub fn with_config(config: HeapConfig) -> Heap {
        let id = NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed);
        debug!("new heap {}: {:?}", id, config);

        Heap {
            id,
            store: CellStore::new(config.page_limit),
            table: ConsTable::new(),
            roots: RootTable::new(),
            types: TypeTable::new(),
            config,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    // Reference-counted objects

    /// Create a counted object of a registered object type
    pub fn alloc_object(&self, tag: Tag, body: ObjectBody) -> Result<ObjectRef, HeapError> {
        let tag = tag.expect_object()?;
        let info = self
            .types
            .lookup(tag)
            .ok_or_else(|| err_type("a registered object tag", tag))?;

        Ok(ObjectRef::new(tag, body, info.destructor))
    }

    pub fn alloc_text(&self, text: &str) -> ObjectRef {
        ObjectRef::new(
            Tag::TEXT,
            ObjectBody::Text(String::from(text)),
            self.types.destructor(Tag::TEXT),
        )
    }

    pub fn alloc_symbol(&self, name: &str) -> ObjectRef {
        ObjectRef::new(
            Tag::SYMBOL,
            ObjectBody::Symbol(String::from(name)),
            self.types.destructor(Tag::SYMBOL),
        )
    }

    pub fn alloc_closure(&self, closure: Closure) -> ObjectRef {
        ObjectRef::new(
            Tag::CLOSURE,
            ObjectBody::Closure(closure),
            self.types.destructor(Tag::CLOSURE),
        )
    }

    // Cons construction

    /// A new white cons with nil children
    pub fn make_cons(&mut self, tag: Tag) -> Result<Value, HeapError> {
        self.make_cons_with(tag, &Value::nil(), &Value::nil())
    }

    /// A new white cons holding copies of `car` and `cdr`
    pub fn make_cons_with(&mut self, tag: Tag, car: &Value, cdr: &Value) -> Result<Value, HeapError> {
        let tag = tag.expect_cons()?;
        self.check_child(car)?;
        self.check_child(cdr)?;

        // dropped, and so released, if the table can't grow
        let car = car.clone();
        let cdr = cdr.clone();

        self.reserve_cons_slot()?;
        let id = self.install(tag, car, cdr);

        Ok(Value::cons(tag, self.handle(id)))
    }

    /// A new cons, already rooted with a count of one
    pub fn make_root_cons(&mut self, tag: Tag) -> Result<Value, HeapError> {
        self.make_root_cons_with(tag, &Value::nil(), &Value::nil())
    }

    /// A new rooted cons holding copies of `car` and `cdr`. Cons children are
    /// shaded grey. On failure neither table changes and no child count is
    /// retained.
    pub fn make_root_cons_with(
        &mut self,
        tag: Tag,
        car: &Value,
        cdr: &Value,
    ) -> Result<Value, HeapError> {
        let tag = tag.expect_cons()?;
        self.check_child(car)?;
        self.check_child(cdr)?;

        let car = car.clone();
        let cdr = cdr.clone();

        let mark = self.growth_mark();
        let reserved = self
            .reserve_cons_slot()
            .and_then(|_| self.reserve_root_slot());

        if let Err(e) = reserved {
            self.rollback_growth(mark);
            return Err(e);
        }

        let id = self.install(tag, car, cdr);
        self.pin(id);

        Ok(Value::cons(tag, self.handle(id)))
    }

    /// Build a proper list of fresh white cells from `items`
    pub fn list(&mut self, items: &[Value]) -> Result<Value, HeapError> {
        let mut tail = Value::nil();

        for item in items.iter().rev() {
            tail = self.make_cons_with(Tag::CONS, item, &tail)?;
        }

        Ok(tail)
    }

    // Rooting protocol

    /// Pin a cons against collection. A cons that is already rooted has its
    /// root count incremented; otherwise it leaves the cons table for the
    /// root table with a count of one.
    pub fn root(&mut self, value: &Value) -> Result<(), HeapError> {
        let id = self.live_cons(value)?;

        if self.store[id].is_root() {
            let index = self.store[id].slot_index();
            let count = self.roots.increment(index);
            debug!("root {} count now {}", id, count);
            return Ok(());
        }

        self.reserve_root_slot()?;
        self.pin(id);
        Ok(())
    }

    /// Release one root reference. When the count reaches zero the cell
    /// returns to the cons table as black.
    pub fn unroot(&mut self, value: &Value) -> Result<(), HeapError> {
        let id = self.live_cons(value)?;

        if !self.store[id].is_root() {
            return Err(HeapError::NotRooted);
        }

        let index = self.store[id].slot_index();
        if self.roots.count(index) > 1 {
            let count = self.roots.decrement(index);
            debug!("root {} count now {}", id, count);
            return Ok(());
        }

        if !self.table.has_black_room() {
            self.table.grow(&mut self.store, self.config.cells_per_page)?;
        }

        self.roots.decrement(index);
        let parked = self.roots.retire(&mut self.store, index);
        let slot = self.table.open_black(&mut self.store);
        let spare = self.table.replace(&mut self.store, slot, id);
        self.roots.replace_spare(&mut self.store, parked, spare);

        debug!("unrooted {} into black slot {}", id, slot);

        self.shade_children(id);
        Ok(())
    }

    /// The root count of a rooted cons; zero for anything else
    pub fn root_ref_count(&self, value: &Value) -> usize {
        match self.live_cons(value) {
            Ok(id) if self.store[id].is_root() => self.roots.count(self.store[id].slot_index()),
            _ => 0,
        }
    }

    // Access

    pub fn car(&self, value: &Value) -> Result<Value, HeapError> {
        let id = self.live_cons(value)?;
        Ok(self.store[id].car().clone())
    }

    pub fn cdr(&self, value: &Value) -> Result<Value, HeapError> {
        let id = self.live_cons(value)?;
        Ok(self.store[id].cdr().clone())
    }

    /// The position of a cons in whichever table currently holds it
    pub fn slot_index(&self, value: &Value) -> Result<usize, HeapError> {
        let id = self.live_cons(value)?;
        Ok(self.store[id].slot_index())
    }

    pub fn color(&self, value: &Value) -> Result<Color, HeapError> {
        let id = self.live_cons(value)?;
        self.color_of(id).ok_or(HeapError::ForeignCons)
    }

    pub fn boundaries(&self) -> Boundaries {
        self.table.boundaries()
    }

    pub fn stats(&self) -> ZoneStats {
        let b = self.table.boundaries();

        ZoneStats {
            black: b.black_top,
            gap: b.grey_begin - b.black_top,
            grey: b.grey_top - b.grey_begin,
            white: b.white_top - b.grey_top,
            free: b.capacity - b.white_top,
            capacity: b.capacity,
            roots: self.roots.len(),
            root_capacity: self.roots.capacity(),
            pages: self.store.page_count(),
        }
    }

    // Internals

    /// The color of whatever cell currently occupies `id`'s storage, or
    /// `None` for spare cells
    pub(crate) fn color_of(&self, id: CellId) -> Option<Color> {
        let cell = self.store.get(id)?;

        if cell.is_root() {
            return Some(Color::Root);
        }

        let slot = cell.slot_index();
        if slot >= self.table.capacity() || self.table.slot(slot) != id {
            return None;
        }

        match self.table.zone_of(slot) {
            Zone::Black => Some(Color::Black),
            Zone::Grey => Some(Color::Grey),
            Zone::White => Some(Color::White),
            Zone::Gap | Zone::Free => None,
        }
    }

    /// Resolve a value to a live cell of this heap
    pub(crate) fn live_cons(&self, value: &Value) -> Result<CellId, HeapError> {
        let handle = value
            .as_cons()
            .ok_or_else(|| err_type("a cons", value.tag()))?;

        self.resolve(handle).ok_or(HeapError::ForeignCons)
    }

    /// The storage a handle names, provided the handle was issued by this
    /// heap and the cell it was issued for is still live there
    pub(crate) fn resolve(&self, handle: ConsId) -> Option<CellId> {
        if handle.heap() != self.id {
            return None;
        }

        let id = handle.cell();
        if self.store.get(id)?.generation() != handle.generation() {
            return None;
        }

        self.color_of(id).map(|_| id)
    }

    /// A handle to the cell currently occupying `id`
    pub(crate) fn handle(&self, id: CellId) -> ConsId {
        ConsId::new(self.id, id, self.store[id].generation())
    }

    /// Values stored into a cell must not name dead or foreign cells, either
    /// directly or through the objects they hold
    pub(crate) fn check_child(&self, child: &Value) -> Result<(), HeapError> {
        let mut refs = Vec::new();
        child.cons_refs(&mut refs);

        if refs.into_iter().all(|handle| self.resolve(handle).is_some()) {
            Ok(())
        } else {
            Err(HeapError::ForeignCons)
        }
    }

    fn reserve_cons_slot(&mut self) -> Result<(), HeapError> {
        if self.table.is_full() {
            self.table.grow(&mut self.store, self.config.cells_per_page)?;
            debug!("cons table grown to {}", self.table.capacity());
        }
        Ok(())
    }

    fn reserve_root_slot(&mut self) -> Result<(), HeapError> {
        if self.roots.is_full() {
            self.roots.grow(&mut self.store, self.config.roots_per_page)?;
            debug!("root table grown to {}", self.roots.capacity());
        }
        Ok(())
    }

    fn growth_mark(&self) -> GrowthMark {
        GrowthMark {
            pages: self.store.page_count(),
            table: self.table.capacity(),
            roots: self.roots.capacity(),
        }
    }

    fn rollback_growth(&mut self, mark: GrowthMark) {
        self.table.truncate(mark.table);
        self.roots.truncate(mark.roots);

        while self.store.page_count() > mark.pages {
            self.store.pop_page();
        }
    }

    /// Claim the next free slot for a new white cell. A slot must have been
    /// reserved.
    fn install(&mut self, tag: Tag, car: Value, cdr: Value) -> CellId {
        let index = self.table.claim_white();
        let id = self.table.slot(index);

        self.store[id].reset(tag, car, cdr);
        self.store[id].set_slot(index, false);

        id
    }

    /// Move a live, unrooted cell into the root table. A root slot must have
    /// been reserved.
    fn pin(&mut self, id: CellId) {
        let slot = self.store[id].slot_index();
        let hole = self.table.remove(&mut self.store, slot);
        let spare = self.roots.install(&mut self.store, id);
        self.table.replace(&mut self.store, hole, spare);

        debug!("rooted {} at root slot {}", id, self.store[id].slot_index());

        self.shade_children(id);
    }
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}
