//! Operational counters. No message strings are persisted; these are plain
//! monotone counts an operator inspects after the fact, matching the
//! engine's "single enum-valued return codes, no persisted messages" error
//! model.

#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub num_reads: u64,
    pub num_writes: u64,
    pub buffer_hits: u64,
    pub num_idx_reads: u64,
    pub num_idx_writes: u64,
    pub max_error_observed: u32,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn reset(&mut self) {
        *self = Stats::default();
    }

    pub fn record_data_read(&mut self) {
        self.num_reads += 1;
    }

    pub fn record_data_write(&mut self) {
        self.num_writes += 1;
    }

    pub fn record_buffer_hit(&mut self) {
        self.buffer_hits += 1;
    }

    pub fn record_index_read(&mut self) {
        self.num_idx_reads += 1;
    }

    pub fn record_index_write(&mut self) {
        self.num_idx_writes += 1;
    }

    pub fn observe_error(&mut self, predicted: u32, actual: u32) {
        let err = predicted.abs_diff(actual);
        if err > self.max_error_observed {
            self.max_error_observed = err;
        }
    }
}
