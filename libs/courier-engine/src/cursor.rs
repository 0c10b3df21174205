/// Last successfully processed offset of one (topic, partition, group).
///
/// Owned by the partition worker. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumptionCursor {
    last_processed: Option<u64>,
}

impl ConsumptionCursor {
    /// Cursor resuming after `committed`, or at the start when `None`.
    pub fn new(committed: Option<u64>) -> Self {
        Self {
            last_processed: committed,
        }
    }

    pub fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    /// Offset expected to be processed next.
    pub fn next_offset(&self) -> u64 {
        self.last_processed.map_or(0, |o| o + 1)
    }

    /// Record `offset` as processed. Offsets at or below the current
    /// position are ignored.
    pub fn advance(&mut self, offset: u64) -> bool {
        if self.last_processed.is_some_and(|last| offset <= last) {
            return false;
        }
        self.last_processed = Some(offset);
        true
    }
}
