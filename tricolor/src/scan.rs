/// Incremental scanning and sweeping over the cons table.
///
/// A cycle starts with the children of every root shaded grey. `scan`
/// blackens grey cells a few at a time, shading their white children; once
/// the grey zone is empty every white cell is unreachable and `sweep`
/// returns the white zone to the free tail. Reclaimed cells keep their
/// contents until their slot is reused by an allocation.
use log::debug;

use crate::error::HeapError;
use crate::heap::Heap;

impl Heap {
    /// Blacken up to `budget` grey cells, returning how many were blackened
    pub fn scan(&mut self, budget: usize) -> usize {
        let mut blackened = 0;

        while blackened < budget {
            match self.table.blacken_next(&mut self.store) {
                Some(id) => {
                    self.shade_children(id);
                    blackened += 1;
                }
                None => break,
            }
        }

        blackened
    }

    /// True when no grey cells remain
    pub fn scan_complete(&self) -> bool {
        !self.table.has_grey()
    }

    /// Reclaim every white cell and start the next cycle. Fails if grey
    /// cells remain to be scanned.
    pub fn sweep(&mut self) -> Result<usize, HeapError> {
        if !self.scan_complete() {
            return Err(HeapError::ScanIncomplete);
        }

        let reclaimed = self.table.reclaim_white();
        self.table.flip();
        self.begin_cycle();

        debug!(
            "swept {} cells; next cycle starts with {} white, {} grey",
            reclaimed,
            self.stats().white,
            self.stats().grey
        );

        Ok(reclaimed)
    }

    /// Shade the children of every root. Done automatically by `sweep`.
    pub fn begin_cycle(&mut self) {
        let roots: Vec<_> = self.roots.live().collect();

        for id in roots {
            self.shade_children(id);
        }
    }

    /// Run the current cycle to completion: scan everything, then sweep
    pub fn collect(&mut self) -> Result<usize, HeapError> {
        let scanned = self.scan(usize::MAX);
        debug!("collect: scanned {} cells", scanned);
        self.sweep()
    }
}
