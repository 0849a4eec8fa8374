/// Block window examined by one scraper invocation.
///
/// `from_block` reaches `overlap` blocks behind the last scraped block so late or
/// reorganised blocks are seen again; `to_block` never passes the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl ScanWindow {
    pub fn compute(last_scraped: u64, overlap: u64, range: u64, head: u64) -> Self {
        Self {
            from_block: last_scraped.saturating_sub(overlap),
            to_block: last_scraped.saturating_add(range).min(head),
        }
    }

    /// Block numbers for per-block scans, end exclusive.
    pub fn blocks(&self) -> std::ops::Range<u64> {
        self.from_block..self.to_block
    }

    /// True when the head sits below `from_block`, leaving nothing to query.
    pub fn is_inverted(&self) -> bool {
        self.to_block < self.from_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_capped_by_head() {
        let window = ScanWindow::compute(100, 50, 500, 80);
        assert_eq!(window.from_block, 50);
        assert_eq!(window.to_block, 80);
    }

    #[test]
    fn test_window_capped_by_range() {
        let window = ScanWindow::compute(100, 50, 500, 100_000);
        assert_eq!(window.from_block, 50);
        assert_eq!(window.to_block, 600);
    }

    #[test]
    fn test_overlap_clamps_at_genesis() {
        let window = ScanWindow::compute(10, 50, 500, 100_000);
        assert_eq!(window.from_block, 0);
        assert_eq!(window.to_block, 510);
    }

    #[test]
    fn test_native_blocks_exclude_to_block() {
        let window = ScanWindow::compute(100, 2, 3, 1_000);
        assert_eq!(window.blocks().collect::<Vec<_>>(), vec![98, 99, 100, 101, 102]);
    }

    #[test]
    fn test_inverted_window() {
        assert!(ScanWindow::compute(1_000, 50, 500, 10).is_inverted());
        assert!(!ScanWindow::compute(1_000, 50, 500, 950).is_inverted());
    }
}
