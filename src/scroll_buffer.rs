use crate::log_parser::ChatRecord;

/// One visible row of the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferRow {
    /// Blank line used to pre-fill the panel before chat arrives.
    Placeholder,
    Record(ChatRecord),
}

impl BufferRow {
    pub fn record(&self) -> Option<&ChatRecord> {
        match self {
            BufferRow::Placeholder => None,
            BufferRow::Record(record) => Some(record),
        }
    }
}

/// Next buffer state after one tick.
///
/// A tick carrying at least `capacity` records replaces the buffer with the
/// newest `capacity` of them. Otherwise the newest rows of `current` are kept
/// in front of all incoming records so the result holds `capacity` rows
/// whenever `current` did.
pub fn advance(current: &[BufferRow], incoming: &[ChatRecord], capacity: usize) -> Vec<BufferRow> {
    if incoming.len() >= capacity {
        return incoming[incoming.len() - capacity..]
            .iter()
            .cloned()
            .map(BufferRow::Record)
            .collect();
    }

    let carried = capacity - incoming.len();
    let keep_from = current.len().saturating_sub(carried);

    let mut next = Vec::with_capacity(capacity);
    next.extend_from_slice(&current[keep_from..]);
    next.extend(incoming.iter().cloned().map(BufferRow::Record));
    next
}

#[derive(Debug, Clone)]
pub struct ScrollBuffer {
    rows: Vec<BufferRow>,
    capacity: usize,
}

impl ScrollBuffer {
    /// Full of placeholders, so the first frame already has its row budget.
    pub fn seeded(capacity: usize) -> Self {
        Self {
            rows: vec![BufferRow::Placeholder; capacity],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rows(&self) -> &[BufferRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_tick(&mut self, incoming: &[ChatRecord]) {
        if incoming.is_empty() {
            return;
        }
        self.rows = advance(&self.rows, incoming, self.capacity);
    }
}
