//! Reserved names of the on-disk layout.

/// Directory holding the object repository inside a store root.
pub const OBJECT_DIR_NAME: &str = ".hb-object";

/// Directory holding one file per reference inside a store root.
pub const REFS_DIR_NAME: &str = ".hb-refs";

/// Side-car file holding the path→hash cache of a browsed root.
pub const CACHE_FILE_NAME: &str = ".hb-cache";

/// Names never picked up when browsing a tree.
pub const RESERVED_NAMES: &[&str] = &[OBJECT_DIR_NAME, REFS_DIR_NAME, CACHE_FILE_NAME];

/// Returns `true` if `name` is one of the store's control entries.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}
