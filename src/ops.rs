// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Page-Table Operations: map, unmap, attach, detach, lookup, and walk.

use core::ptr::NonNull;

use crate::config::{MPU_REPRESENTABLE_NUM_ORDER, round_down};
use crate::descriptor::PageFlags;
use crate::error::{PgtblError, PgtblResult};
use crate::node::{self, Entry, NodeRef};
use crate::refill::{self, RefillOp};

/// Maps a physical page into `node` at entry index `pos` with `flags`.
///
/// Only legal on a node with `num_order == 3`, the one shape the MPU can
/// represent. The first page mapped into a node
/// fixes `Page_Flags`; subsequent pages must agree or the call fails with
/// [`PgtblError::Consistency`]. If the node is attached (top-level itself,
/// or a child of one) and `flags` includes [`PageFlags::STATIC`], the
/// mapping is eagerly admitted into the MPU Shadow Table.
pub fn page_map(mut node: NodeRef, paddr: u32, pos: usize, flags: PageFlags) -> PgtblResult<()> {
    if node.header().num_order() != MPU_REPRESENTABLE_NUM_ORDER {
        return Err(PgtblError::Shape);
    }
    let size_order = node.header().size_order();
    {
        let entries = node.entries();
        let entry = entries.get(pos).ok_or(PgtblError::Shape)?;
        if entry.is_present() {
            return Err(PgtblError::Occupancy);
        }
    }

    let page_count = node.header().page_count();
    if page_count == 0 {
        node.header().set_page_flags(flags);
    } else if node.header().page_flags() != flags {
        return Err(PgtblError::Consistency);
    }

    node.entries()[pos] = Entry::page(paddr, size_order);
    node::inc_page_count(&mut node);

    let attached = node.header().is_top_level() || node.header().toplevel().is_some();
    if attached && flags.contains(PageFlags::STATIC) {
        if let Err(err) = refill::update(node, RefillOp::Add) {
            node.entries()[pos] = Entry::EMPTY;
            node::dec_page_count(&mut node);
            return Err(err);
        }
    }
    log::trace!("page_map: paddr={paddr:#x} pos={pos} flags={flags:?}");
    Ok(())
}

/// Unmaps the page at entry index `pos` from `node`.
///
/// Always refreshes the MPU Shadow Table when the node is attached, whether
/// or not the mapping was static: the region is recomputed from whatever
/// entries remain present, so a node with other pages still mapped keeps
/// its region (with an updated subregion-disable mask) rather than being
/// evicted outright, and only a now-empty node's region is cleared.
pub fn page_unmap(mut node: NodeRef, pos: usize) -> PgtblResult<()> {
    if node.header().num_order() != MPU_REPRESENTABLE_NUM_ORDER {
        return Err(PgtblError::Shape);
    }
    let entry = *node.entries().get(pos).ok_or(PgtblError::Shape)?;
    if !entry.is_present() || !entry.is_terminal() {
        return Err(PgtblError::Occupancy);
    }

    node.entries()[pos] = Entry::EMPTY;
    node::dec_page_count(&mut node);

    let attached = node.header().is_top_level() || node.header().toplevel().is_some();
    if attached {
        refill::update(node, RefillOp::Add)?;
    }
    log::trace!("page_unmap: pos={pos}");
    Ok(())
}

/// Attaches `child` as a directory entry of `parent` at index `pos`,
/// recording `child`'s back-pointer to `parent`'s owning top-level node.
pub fn pgdir_map(mut parent: NodeRef, pos: usize, mut child: NodeRef) -> PgtblResult<()> {
    {
        let entries = parent.entries();
        let entry = entries.get(pos).ok_or(PgtblError::Shape)?;
        if entry.is_present() {
            return Err(PgtblError::Occupancy);
        }
    }
    if child.header().toplevel().is_some()
        || child.header().is_top_level()
        || child.header().dir_count() != 0
    {
        return Err(PgtblError::Attachment);
    }

    let owning_top = if parent.header().is_top_level() {
        parent.as_ptr()
    } else {
        parent
            .header()
            .toplevel()
            .ok_or(PgtblError::Attachment)?
    };

    parent.entries()[pos] = Entry::directory(child.as_ptr());
    node::inc_dir_count(&mut parent);
    child.header().set_toplevel(Some(owning_top));
    log::debug!("pgdir_map: pos={pos}");
    Ok(())
}

/// Detaches the child directory at entry index `pos` of `parent`.
///
/// Fails with [`PgtblError::Attachment`] only if `child` still owns
/// grandchildren; a childless directory detaches even with pages still
/// mapped into it directly, though callers typically unmap them first.
pub fn pgdir_unmap(mut parent: NodeRef, pos: usize) -> PgtblResult<()> {
    let entry = *parent.entries().get(pos).ok_or(PgtblError::Shape)?;
    if !entry.is_present() || entry.is_terminal() {
        return Err(PgtblError::Occupancy);
    }
    // SAFETY: `entry` was built by `pgdir_map` from a live `NodeRef`.
    let mut child = unsafe { NodeRef::from_header(entry.child()) };
    // Unlike `node::del_check`, detaching never cares whether `child` is
    // attached (it always is, having been reached through a present
    // directory entry) — only whether it still owns grandchildren.
    if child.header().dir_count() != 0 {
        return Err(PgtblError::Attachment);
    }

    parent.entries()[pos] = Entry::EMPTY;
    node::dec_dir_count(&mut parent);
    child.header().set_toplevel(None);
    log::debug!("pgdir_unmap: pos={pos}");
    Ok(())
}

/// Looks up the entry at `pos` without walking further down the tree.
pub fn lookup(mut node: NodeRef, pos: usize) -> PgtblResult<Entry> {
    node.entries()
        .get(pos)
        .copied()
        .filter(|entry| entry.is_present())
        .ok_or(PgtblError::Occupancy)
}

/// Result of walking an address down to its terminal mapping.
#[derive(Clone, Copy)]
pub struct WalkResult {
    /// The node whose entry array holds the terminal mapping.
    pub node: NodeRef,
    /// The terminal entry's index within that node.
    pub pos: usize,
    /// The physical address the terminal entry maps, as stored in the entry
    /// (not recomputed from the node's `Start_Addr`).
    pub paddr: u32,
    /// The permission/attribute flags of the node holding the mapping.
    pub flags: PageFlags,
}

/// Walks `top` down to the terminal entry covering `addr`, following
/// directory entries until a terminal or absent entry is reached.
pub fn walk(top: NodeRef, addr: u32) -> PgtblResult<WalkResult> {
    let mut current = top;
    loop {
        let size_order = current.header().size_order();
        let base = current.header().start();
        let entry_size = 1u32 << size_order;
        let offset = addr.wrapping_sub(base) / entry_size;
        let pos = usize::try_from(offset)
            .ok()
            .filter(|&p| p < current.header().entry_count())
            .ok_or(PgtblError::Shape)?;
        let entry = *current.entries().get(pos).ok_or(PgtblError::Shape)?;
        if !entry.is_present() {
            return Err(PgtblError::Occupancy);
        }
        if entry.is_terminal() {
            return Ok(WalkResult {
                node: current,
                pos,
                paddr: entry.paddr(),
                flags: current.header().page_flags(),
            });
        }
        // SAFETY: a non-terminal, present entry was built by `pgdir_map`
        // from a live `NodeRef`.
        current = unsafe { NodeRef::from_header(entry.child()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{check, init, size_for};
    use crate::config::TOP_LEVEL_FLAG;

    fn make_node(start_addr: u32, size_order: u32, num_order: u32) -> (Vec<u8>, NodeRef) {
        check(start_addr, start_addr & TOP_LEVEL_FLAG != 0, size_order, num_order).unwrap();
        let top_flag = start_addr & TOP_LEVEL_FLAG != 0;
        let len = size_for(num_order, top_flag);
        let mut storage = vec![0u8; len + 16];
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        // SAFETY: `storage` is a fresh, zeroed allocation sized by `size_for`
        // for this `num_order`/top flag.
        let node = unsafe { init(ptr, start_addr, size_order, num_order) };
        (storage, node)
    }

    #[test]
    fn page_map_then_unmap_round_trips() {
        let (_storage, node) = make_node(0x1000 | TOP_LEVEL_FLAG, 12, 3);
        page_map(node, 0x2000, 0, PageFlags::READ).unwrap();
        let entry = lookup(node, 0).unwrap();
        assert!(entry.is_terminal());
        assert_eq!(entry.paddr(), 0x2000);
        page_unmap(node, 0).unwrap();
        assert_eq!(lookup(node, 0).unwrap_err(), PgtblError::Occupancy);
    }

    #[test]
    fn page_map_rejects_inconsistent_flags() {
        let (_storage, node) = make_node(0x1000 | TOP_LEVEL_FLAG, 12, 3);
        page_map(node, 0x2000, 0, PageFlags::READ).unwrap();
        assert_eq!(
            page_map(node, 0x3000, 1, PageFlags::READ | PageFlags::WRITE).unwrap_err(),
            PgtblError::Consistency
        );
    }

    #[test]
    fn page_map_rejects_occupied_slot() {
        let (_storage, node) = make_node(0x1000 | TOP_LEVEL_FLAG, 12, 3);
        page_map(node, 0x2000, 0, PageFlags::READ).unwrap();
        assert_eq!(
            page_map(node, 0x3000, 0, PageFlags::READ).unwrap_err(),
            PgtblError::Occupancy
        );
    }

    #[test]
    fn pgdir_map_links_back_pointer_to_owning_top_level() {
        let (_top_storage, top) = make_node(0 | TOP_LEVEL_FLAG, 15, 3);
        let (_child_storage, mut child) = make_node(0, 12, 3);
        pgdir_map(top, 0, child).unwrap();
        assert_eq!(child.header().toplevel(), Some(top.as_ptr()));
    }

    #[test]
    fn pgdir_unmap_rejects_node_with_attached_children() {
        let (_top_storage, top) = make_node(0 | TOP_LEVEL_FLAG, 15, 3);
        let (_child_storage, grandchild_holder) = make_node(0, 9, 1);
        let (_mid_storage, mid) = make_node(0, 12, 3);
        pgdir_map(top, 0, mid).unwrap();
        pgdir_map(mid, 0, grandchild_holder).unwrap();
        assert_eq!(pgdir_unmap(top, 0).unwrap_err(), PgtblError::Attachment);
    }

    #[test]
    fn pgdir_unmap_succeeds_for_childless_directory_still_attached() {
        let (_top_storage, top) = make_node(0 | TOP_LEVEL_FLAG, 15, 3);
        let (_child_storage, child) = make_node(0, 12, 3);
        pgdir_map(top, 0, child).unwrap();
        // `child` has no grandchildren, so detaching it must succeed even
        // though `del_check` alone would still reject it (it is attached).
        assert_eq!(node::del_check(child).unwrap_err(), PgtblError::Attachment);
        pgdir_unmap(top, 0).unwrap();
        assert!(node::del_check(child).is_ok());
    }

    #[test]
    fn walk_finds_terminal_mapping_through_directory() {
        let (_top_storage, top) = make_node(0 | TOP_LEVEL_FLAG, 15, 3);
        let (_child_storage, child) = make_node(0, 12, 3);
        pgdir_map(top, 0, child).unwrap();
        page_map(child, 0x9000, 2, PageFlags::READ).unwrap();
        let addr = 2 * (1u32 << 12);
        let walked = walk(top, addr).unwrap();
        assert_eq!(walked.paddr, 0x9000);
    }
}
