/// Heap sizing parameters
use std::env;
use std::str::FromStr;

use log::warn;

/// Cons cells allocated per page when the cons table grows
pub const DEFAULT_CELLS_PER_PAGE: usize = 256;

/// Root entries allocated per page when the root table grows
pub const DEFAULT_ROOTS_PER_PAGE: usize = 64;

/// Tuning for a `Heap`. Pages are the only unit of growth, so these sizes
/// decide how often the tables grow and how much an individual growth costs.
///
/// ```
/// use tricolor::HeapConfig;
///
/// let config = HeapConfig {
///     page_limit: Some(4),
///     ..Default::default()
/// };
/// assert_eq!(config.cells_per_page, 256);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HeapConfig {
    /// Slots added to the cons table by one growth step
    pub cells_per_page: usize,

    /// Entries added to the root table by one growth step
    pub roots_per_page: usize,

    /// Upper bound on pages drawn by both tables together. `None` means the
    /// heap grows until the system allocator refuses.
    pub page_limit: Option<usize>,
}

impl Default for HeapConfig {
    fn default() -> HeapConfig {
        HeapConfig {
            cells_per_page: DEFAULT_CELLS_PER_PAGE,
            roots_per_page: DEFAULT_ROOTS_PER_PAGE,
            page_limit: None,
        }
    }
}

impl HeapConfig {
    /// Defaults overridden by `TRICOLOR_CELLS_PER_PAGE`, `TRICOLOR_ROOTS_PER_PAGE`
    /// and `TRICOLOR_PAGE_LIMIT` where those are set. Unparseable or zero
    /// values are ignored with a warning.
    pub fn from_env() -> HeapConfig {
        let mut config = HeapConfig::default();

        if let Some(cells) = read_var("TRICOLOR_CELLS_PER_PAGE") {
            config.cells_per_page = cells;
        }
        if let Some(roots) = read_var("TRICOLOR_ROOTS_PER_PAGE") {
            config.roots_per_page = roots;
        }
        if let Some(limit) = read_var("TRICOLOR_PAGE_LIMIT") {
            config.page_limit = Some(limit);
        }

        config
    }
}

fn read_var<T: FromStr + PartialEq + Default>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            warn!("ignoring {}={:?}: expected a positive integer", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn env_overrides() {
        env::set_var("TRICOLOR_CELLS_PER_PAGE", "32");
        env::set_var("TRICOLOR_ROOTS_PER_PAGE", "zero");
        env::set_var("TRICOLOR_PAGE_LIMIT", "7");

        let config = HeapConfig::from_env();

        env::remove_var("TRICOLOR_CELLS_PER_PAGE");
        env::remove_var("TRICOLOR_ROOTS_PER_PAGE");
        env::remove_var("TRICOLOR_PAGE_LIMIT");

        assert!(config.cells_per_page == 32);
        assert!(config.roots_per_page == DEFAULT_ROOTS_PER_PAGE);
        assert!(config.page_limit == Some(7));
    }
}
