/// Consistency checks over the whole heap, for tests and diagnostics
use std::collections::HashSet;

use crate::error::{err_corrupt, HeapError};
use crate::heap::{Color, Heap};

impl Heap {
    /// Walk both tables and confirm that:
    ///  * the zone boundaries are ordered
    ///  * every cell records its actual slot and root status
    ///  * every cell appears in exactly one slot across both tables
    ///  * every live root has a count of at least one
    ///  * no root or black cell refers to a white or dead cell, directly or
    ///    through an object
    pub fn check_invariants(&self) -> Result<(), HeapError> {
        let b = self.table.boundaries();

        if !(b.black_top <= b.grey_begin
            && b.grey_begin <= b.grey_top
            && b.grey_top <= b.white_top
            && b.white_top <= b.capacity)
        {
            return Err(err_corrupt(format!("zone boundaries out of order: {:?}", b)));
        }

        let mut seen = HashSet::new();

        for (index, id) in self.table.slots().iter().enumerate() {
            let cell = &self.store[*id];

            if cell.slot_index() != index || cell.is_root() {
                return Err(err_corrupt(format!(
                    "cons slot {} holds {} recording slot {} (root: {})",
                    index,
                    id,
                    cell.slot_index(),
                    cell.is_root()
                )));
            }
            if !seen.insert(*id) {
                return Err(err_corrupt(format!("{} appears in two slots", id)));
            }
        }

        for index in 0..self.roots.capacity() {
            let id = self.roots.cell(index);
            let cell = &self.store[id];
            let live = index < self.roots.len();

            if cell.slot_index() != index || cell.is_root() != live {
                return Err(err_corrupt(format!(
                    "root slot {} holds {} recording slot {} (root: {})",
                    index,
                    id,
                    cell.slot_index(),
                    cell.is_root()
                )));
            }
            if live && self.roots.count(index) == 0 {
                return Err(err_corrupt(format!("root {} has a zero count", id)));
            }
            if !seen.insert(id) {
                return Err(err_corrupt(format!("{} appears in two slots", id)));
            }
        }

        if seen.len() != self.store.cell_count() {
            return Err(err_corrupt(format!(
                "{} cells stored but {} reachable from the tables",
                self.store.cell_count(),
                seen.len()
            )));
        }

        let sources = self
            .table
            .slots()
            .iter()
            .take(b.black_top)
            .copied()
            .chain(self.roots.live());

        for parent in sources {
            let cell = &self.store[parent];
            let mut refs = Vec::new();
            cell.car().cons_refs(&mut refs);
            cell.cdr().cons_refs(&mut refs);

            for handle in refs {
                match self.resolve(handle) {
                    None => {
                        return Err(err_corrupt(format!(
                            "{} refers to dead cell {}",
                            parent, handle
                        )))
                    }
                    Some(child) if self.color_of(child) == Some(Color::White) => {
                        return Err(err_corrupt(format!(
                            "{} refers to white cell {}",
                            parent, child
                        )))
                    }
                    Some(_) => (),
                }
            }
        }

        Ok(())
    }
}
