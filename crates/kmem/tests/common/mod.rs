//! Shared helpers for allocator integration tests.

use std::alloc::Layout;

use kmem::{PAGE_SIZE, Paddr, Ppn, PpnRange};

/// Carve a page-aligned arena out of the host heap and hand its page
/// range to the allocator under test. Leaked on purpose: the allocator
/// keeps referring to the memory for the whole test process.
pub fn leak_arena(pages: usize) -> PpnRange {
    let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
    // SAFETY: layout has non-zero size
    let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
    assert!(!ptr.is_null());
    let start = Ppn::from_addr_aligned(Paddr::new(ptr as usize));
    PpnRange::from_start_len(start, pages)
}

/// Read one byte from a managed page, for observing stamp patterns.
///
/// # Safety
/// The page must lie inside an arena returned by `leak_arena`.
pub unsafe fn peek(page: Ppn, offset: usize) -> u8 {
    unsafe { *page.start_addr().as_ptr::<u8>().add(offset) }
}
