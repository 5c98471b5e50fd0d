//! Progress reporting for file transfers.

/// Progress information for uploads and downloads.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Bytes transferred so far
    pub done: u64,
    /// Total bytes to transfer, when the server announced a length
    pub total: Option<u64>,
    /// Name of the file being transferred
    pub filename: String,
}

impl TransferProgress {
    /// Create a new progress report.
    pub fn new(done: u64, total: Option<u64>, filename: impl Into<String>) -> Self {
        Self {
            done,
            total,
            filename: filename.into(),
        }
    }

    /// Get progress as a percentage (0.0 to 100.0). Unknown totals report 0.
    pub fn percent(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => (self.done as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// Check if transfer is complete.
    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.done >= total)
    }
}

/// Type alias for progress callback function.
///
/// The callback receives progress information and can return `false` to cancel the transfer.
pub type ProgressCallback = Box<dyn FnMut(&TransferProgress) -> bool + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(TransferProgress::new(25, Some(100), "a").percent(), 25.0);
        assert_eq!(TransferProgress::new(25, None, "a").percent(), 0.0);
        assert_eq!(TransferProgress::new(0, Some(0), "a").percent(), 0.0);
    }

    #[test]
    fn test_is_complete() {
        assert!(TransferProgress::new(100, Some(100), "a").is_complete());
        assert!(TransferProgress::new(0, Some(0), "empty").is_complete());
        assert!(!TransferProgress::new(99, Some(100), "a").is_complete());
        assert!(!TransferProgress::new(99, None, "a").is_complete());
    }
}
