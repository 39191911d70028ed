/// A block allocator for fixed-size pages of memory.
///
/// `Block` is the raw unit: a power-of-two sized block of memory aligned to
/// its size. `Page<T>` carves a `Block` into a fixed number of `T` slots that
/// are initialized up front and dropped in place when the page is dropped.
/// `PageBudget` counts the pages handed out and can refuse further requests
/// once a limit is reached.
///
/// Usage:
/// ```
/// use blockalloc::{Page, PageBudget};
///
/// let budget = PageBudget::unlimited();
/// let page = Page::new(16, &budget, |i| i * 2).unwrap();
/// assert_eq!(page.get(3), Some(&6));
/// ```
///
/// A page is never handed back piecemeal; its slots live exactly as long as
/// the page itself.
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

use log::{debug, warn};

pub type BlockPtr = NonNull<u8>;
pub type BlockSize = usize;

/// Set of possible block allocation failures
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BlockError {
    /// Usually means requested block size, and therefore alignment, wasn't a
    /// power of two, or a page was asked to hold zero slots
    BadRequest,
    /// Insufficient memory, couldn't allocate a block
    OOM,
    /// The page budget has been spent
    LimitReached,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockError::BadRequest => write!(f, "invalid block size requested"),
            BlockError::OOM => write!(f, "out of memory"),
            BlockError::LimitReached => write!(f, "page limit reached"),
        }
    }
}

impl std::error::Error for BlockError {}

/// A block-size-aligned block of memory
pub struct Block {
    ptr: BlockPtr,
    size: BlockSize,
}

impl Block {
    /// Instantiate a new block of the given size. Size must be a power of two.
    pub fn new(size: BlockSize) -> Result<Block, BlockError> {
        if !size.is_power_of_two() {
            return Err(BlockError::BadRequest);
        }

        Ok(Block {
            ptr: internal::alloc_block(size)?,
            size,
        })
    }

    /// Return the size in bytes of the block
    pub fn size(&self) -> BlockSize {
        self.size
    }

    /// Return a bare pointer to the base of the block
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        internal::dealloc_block(self.ptr, self.size);
    }
}

/// Counts pages handed out, optionally refusing requests past a limit.
/// Shared by every table that draws pages from the same heap.
#[derive(Debug)]
pub struct PageBudget {
    used: Cell<usize>,
    limit: Option<usize>,
}

impl PageBudget {
    pub fn unlimited() -> PageBudget {
        PageBudget {
            used: Cell::new(0),
            limit: None,
        }
    }

    pub fn with_limit(limit: usize) -> PageBudget {
        PageBudget {
            used: Cell::new(0),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Pages currently charged against this budget
    pub fn used(&self) -> usize {
        self.used.get()
    }

    fn charge(&self) -> Result<(), BlockError> {
        let used = self.used.get();
        if let Some(limit) = self.limit {
            if used >= limit {
                warn!("page budget exhausted at {} pages", limit);
                return Err(BlockError::LimitReached);
            }
        }
        self.used.set(used + 1);
        Ok(())
    }

    /// Give back the charge for a page that was released before ever being used
    pub fn refund(&self) {
        let used = self.used.get();
        debug_assert!(used > 0, "refund without a matching charge");
        self.used.set(used.saturating_sub(1));
    }
}

/// A fixed number of `T` slots living in a single `Block`.
pub struct Page<T> {
    block: Block,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Page<T> {
    /// Allocate a page of `len` slots, each initialized by `init(slot_number)`.
    /// The budget is charged only if the block allocation succeeds.
    pub fn new<F>(len: usize, budget: &PageBudget, mut init: F) -> Result<Page<T>, BlockError>
    where
        F: FnMut(usize) -> T,
    {
        let size = page_size_for::<T>(len)?;
        budget.charge()?;

        let block = match Block::new(size) {
            Ok(block) => block,
            Err(e) => {
                budget.refund();
                return Err(e);
            }
        };

        let base = block.as_ptr() as *mut T;
        for index in 0..len {
            // The block is at least `len * size_of::<T>()` bytes and aligned
            // to at least `align_of::<T>()`.
            unsafe { ptr::write(base.add(index), init(index)) };
        }

        debug!("allocated page of {} slots ({} bytes)", len, size);

        Ok(Page {
            block,
            len,
            _marker: PhantomData,
        })
    }

    /// Number of slots in this page
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            Some(unsafe { &*self.base().add(index) })
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(unsafe { &mut *self.base().add(index) })
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    fn base(&self) -> *mut T {
        self.block.as_ptr() as *mut T
    }
}

impl<T> Drop for Page<T> {
    fn drop(&mut self) {
        let base = self.base();
        for index in 0..self.len {
            unsafe { ptr::drop_in_place(base.add(index)) };
        }
    }
}

/// Return the power-of-two block size needed to hold `len` values of `T`
fn page_size_for<T>(len: usize) -> Result<BlockSize, BlockError> {
    if len == 0 || size_of::<T>() == 0 {
        return Err(BlockError::BadRequest);
    }

    let bytes = size_of::<T>()
        .checked_mul(len)
        .ok_or(BlockError::BadRequest)?;

    bytes
        .max(align_of::<T>())
        .checked_next_power_of_two()
        .ok_or(BlockError::BadRequest)
}

/// Extend `array` so that `additional` more entries can be pushed without
/// reallocation, reporting failure instead of aborting.
pub fn grow_array<T>(array: &mut Vec<T>, additional: usize) -> Result<(), BlockError> {
    array
        .try_reserve_exact(additional)
        .map_err(|_| BlockError::OOM)
}

mod internal {
    use super::{BlockError, BlockPtr, BlockSize};
    use std::alloc::{alloc, dealloc, Layout};
    use std::ptr::NonNull;

    pub fn alloc_block(size: BlockSize) -> Result<BlockPtr, BlockError> {
        let layout = Layout::from_size_align(size, size).map_err(|_| BlockError::BadRequest)?;

        unsafe {
            let ptr = alloc(layout);
            if ptr.is_null() {
                Err(BlockError::OOM)
            } else {
                Ok(NonNull::new_unchecked(ptr))
            }
        }
    }

    pub fn dealloc_block(ptr: BlockPtr, size: BlockSize) {
        unsafe {
            let layout = Layout::from_size_align_unchecked(size, size);

            dealloc(ptr.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
mod tests {

    use std::rc::Rc;

    use crate::{grow_array, Block, BlockError, BlockSize, Page, PageBudget};

    fn alloc_dealloc(size: BlockSize) -> Result<(), BlockError> {
        let block = Block::new(size)?;

        // the block address bitwise AND the alignment bits (size - 1) should
        // be a mutually exclusive set of bits
        let mask = size - 1;
        assert!((block.ptr.as_ptr() as usize & mask) ^ mask == mask);

        drop(block);
        Ok(())
    }

    #[test]
    fn test_bad_sizealign() {
        assert!(alloc_dealloc(999) == Err(BlockError::BadRequest))
    }

    #[test]
    fn test_zero_size() {
        assert!(alloc_dealloc(0) == Err(BlockError::BadRequest))
    }

    #[test]
    fn test_4k() {
        assert!(alloc_dealloc(4096).is_ok())
    }

    #[test]
    fn test_32k() {
        assert!(alloc_dealloc(32768).is_ok())
    }

    #[test]
    fn test_page_slots() {
        let budget = PageBudget::unlimited();
        let page = Page::new(100, &budget, |i| i as u64 * 3).unwrap();

        assert!(page.len() == 100);
        for (i, slot) in page.iter().enumerate() {
            assert!(*slot == i as u64 * 3);
        }
        assert!(page.get(100).is_none());
        assert!(budget.used() == 1);
    }

    #[test]
    fn test_page_zero_slots() {
        let budget = PageBudget::unlimited();
        let page: Result<Page<u32>, _> = Page::new(0, &budget, |_| 0);

        assert!(page.err() == Some(BlockError::BadRequest));
        assert!(budget.used() == 0);
    }

    #[test]
    fn test_page_budget() {
        let budget = PageBudget::with_limit(2);

        let first = Page::new(4, &budget, |i| i);
        let second = Page::new(4, &budget, |i| i);
        let third = Page::new(4, &budget, |i| i);

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(third.err() == Some(BlockError::LimitReached));

        budget.refund();
        assert!(Page::new(4, &budget, |i| i).is_ok());
    }

    #[test]
    fn test_page_drops_slots() {
        let tracker = Rc::new(());
        let budget = PageBudget::unlimited();

        let page = Page::new(8, &budget, |_| tracker.clone()).unwrap();
        assert!(Rc::strong_count(&tracker) == 9);

        drop(page);
        assert!(Rc::strong_count(&tracker) == 1);
    }

    #[test]
    fn test_grow_array() {
        let mut array: Vec<u32> = Vec::new();
        assert!(grow_array(&mut array, 64).is_ok());
        assert!(array.capacity() >= 64);
    }
}
