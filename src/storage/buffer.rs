//! In-memory buffer of normalized blocks for one job.

/// Ordered, append-only sequence of normalized blocks.
///
/// Owned by the scheduler while a run is in progress and handed to the sink
/// by value once it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotBuffer {
    job_id: String,
    blocks: Vec<Vec<u8>>,
}

impl SnapshotBuffer {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            blocks: Vec::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Appends one tick's block.
    pub fn push(&mut self, block: Vec<u8>) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Vec<u8>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serializes the buffer into the persisted snapshot format.
    ///
    /// Every block is followed by one extra `\n`. Blocks are already
    /// newline-terminated, so consecutive blocks end up separated by a
    /// blank line.
    pub fn serialize(&self) -> Vec<u8> {
        let total: usize = self.blocks.iter().map(|b| b.len() + 1).sum();
        let mut out = Vec::with_capacity(total);
        for block in &self.blocks {
            out.extend_from_slice(block);
            out.push(b'\n');
        }
        out
    }
}
