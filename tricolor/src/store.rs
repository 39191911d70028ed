/// The page registry backing every cons cell in a heap. Both the cons table
/// and the root table draw their pages from here, and pages are only freed
/// when the store is dropped.
use std::ops::{Index, IndexMut};

use blockalloc::{Page, PageBudget};
use log::debug;

use crate::cell::{ConsCell, CellId, MAX_SLOT_INDEX};
use crate::error::HeapError;

pub struct CellStore {
    pages: Vec<Page<ConsCell>>,
    budget: PageBudget,
    cells: usize,
}

impl CellStore {
    pub fn new(page_limit: Option<usize>) -> CellStore {
        let budget = match page_limit {
            Some(limit) => PageBudget::with_limit(limit),
            None => PageBudget::unlimited(),
        };

        CellStore {
            pages: Vec::new(),
            budget,
            cells: 0,
        }
    }

    /// Allocate a page of `len` spare cells whose slot indices start at
    /// `first_slot`, returning the handles of the new cells in order.
    pub fn new_page(&mut self, len: usize, first_slot: usize) -> Result<Vec<CellId>, HeapError> {
        let last_slot = first_slot
            .checked_add(len)
            .ok_or(HeapError::BadAllocationRequest)?;
        if last_slot > MAX_SLOT_INDEX {
            return Err(HeapError::BadAllocationRequest);
        }

        let mut ids = Vec::new();
        blockalloc::grow_array(&mut ids, len)?;
        blockalloc::grow_array(&mut self.pages, 1)?;

        let page = Page::new(len, &self.budget, |offset| ConsCell::spare(first_slot + offset))?;

        let page_index = self.pages.len();
        self.pages.push(page);
        self.cells += len;

        ids.extend((0..len).map(|offset| CellId::new(page_index, offset)));

        debug!(
            "page {} registered: {} cells at slots {}..{}",
            page_index, len, first_slot, last_slot
        );

        Ok(ids)
    }

    /// Release the most recent page. Only for undoing a growth step whose
    /// cells were never handed out.
    pub fn pop_page(&mut self) {
        if let Some(page) = self.pages.pop() {
            self.cells -= page.len();
            self.budget.refund();
            debug!("page {} released on rollback", self.pages.len());
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total cells across all pages
    pub fn cell_count(&self) -> usize {
        self.cells
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: CellId) -> Option<&ConsCell> {
        self.pages.get(id.page())?.get(id.offset())
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut ConsCell> {
        self.pages.get_mut(id.page())?.get_mut(id.offset())
    }
}

impl Index<CellId> for CellStore {
    type Output = ConsCell;

    fn index(&self, id: CellId) -> &ConsCell {
        match self.get(id) {
            Some(cell) => cell,
            None => panic!("cons handle {} is not in this store", id),
        }
    }
}

impl IndexMut<CellId> for CellStore {
    fn index_mut(&mut self, id: CellId) -> &mut ConsCell {
        match self.get_mut(id) {
            Some(cell) => cell,
            None => panic!("cons handle {} is not in this store", id),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pages_number_their_cells() {
        let mut store = CellStore::new(None);

        let first = store.new_page(4, 0).unwrap();
        let second = store.new_page(4, 4).unwrap();

        assert!(store.page_count() == 2);
        assert!(store.cell_count() == 8);
        assert!(store[second[2]].slot_index() == 6);
        assert!(first[0] != second[0]);
    }

    #[test]
    fn limit_and_rollback() {
        let mut store = CellStore::new(Some(1));

        let ids = store.new_page(2, 0).unwrap();
        assert!(store.new_page(2, 2) == Err(HeapError::OutOfMemory));

        store.pop_page();
        assert!(!store.contains(ids[0]));
        assert!(store.cell_count() == 0);
        assert!(store.new_page(2, 0).is_ok());
    }
}
