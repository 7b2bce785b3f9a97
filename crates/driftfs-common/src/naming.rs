//! Object-name helpers
//!
//! A staged object name embeds the inode it belongs to. With a flat layout
//! (`prefix_depth == 0`) names are `_`-separated with the inode as the first
//! field (`"42_7_0"`). With a hierarchical layout (`prefix_depth > 0`) the
//! name is a slash-separated relative path whose leading directory segment
//! is the inode (`"42/7/0"`), and the staging store materializes the
//! intermediate directories on disk.

/// Check whether `name` belongs to `inode` under the given layout.
#[must_use]
pub fn belongs_to_inode(name: &str, inode: u64, prefix_depth: u32) -> bool {
    let sep = if prefix_depth == 0 { '_' } else { '/' };
    match name.split(sep).next() {
        Some(first) => first.parse::<u64>() == Ok(inode),
        None => false,
    }
}

/// Build the object name for one block of one chunk of an inode.
#[must_use]
pub fn make_obj_name(inode: u64, chunk: u64, block: u64, prefix_depth: u32) -> String {
    if prefix_depth == 0 {
        format!("{inode}_{chunk}_{block}")
    } else {
        format!("{inode}/{chunk}/{block}")
    }
}
