use arrayvec::ArrayVec;
use static_assertions::const_assert;

/// Fixed capacity of the median history.
pub const MEDIAN_CAPACITY: usize = 21;

const_assert!(MEDIAN_CAPACITY > 0);
const_assert!(MEDIAN_CAPACITY <= u32::MAX as usize);

/// Circular buffer of the most recent raw samples.
///
/// Once full, each push overwrites the oldest sample. Medians are computed on
/// a scratch copy so the history itself is never reordered.
#[derive(Debug, Clone)]
pub struct RingMedianBuffer {
    samples: [f32; MEDIAN_CAPACITY],
    head: usize,
    len: usize,
}

impl RingMedianBuffer {
    pub fn new() -> Self {
        Self {
            samples: [0.0; MEDIAN_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % MEDIAN_CAPACITY;
        if self.len < MEDIAN_CAPACITY {
            self.len += 1;
        }
    }

    /// True once at least one sample is stored.
    pub fn is_ready(&self) -> bool {
        self.len > 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        MEDIAN_CAPACITY
    }

    pub fn clear(&mut self) {
        self.samples = [0.0; MEDIAN_CAPACITY];
        self.head = 0;
        self.len = 0;
    }

    /// Copy of the newest `count` samples, newest first.
    pub fn snapshot(&self, count: usize) -> ArrayVec<f32, MEDIAN_CAPACITY> {
        let count = count.min(self.len);
        (0..count)
            .map(|i| self.samples[(self.head + MEDIAN_CAPACITY - 1 - i) % MEDIAN_CAPACITY])
            .collect()
    }

    /// Median of the newest `window` samples.
    ///
    /// The window is clamped to `[1, min(capacity, len)]`, so an oversized
    /// request degrades to every stored sample and zero acts as one. Returns
    /// `None` only when the buffer is empty.
    pub fn median(&self, window: u32) -> Option<f32> {
        if !self.is_ready() {
            return None;
        }

        let window = (window as usize).clamp(1, MEDIAN_CAPACITY).min(self.len);
        let mut scratch = self.snapshot(window);
        insertion_sort(&mut scratch);

        let mid = window / 2;
        if window % 2 == 1 {
            Some(scratch[mid])
        } else {
            Some(0.5 * (scratch[mid - 1] + scratch[mid]))
        }
    }
}

impl Default for RingMedianBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// At most MEDIAN_CAPACITY elements, so quadratic is fine.
fn insertion_sort(values: &mut [f32]) {
    for i in 1..values.len() {
        let key = values[i];
        let mut j = i;
        while j > 0 && values[j - 1] > key {
            values[j] = values[j - 1];
            j -= 1;
        }
        values[j] = key;
    }
}
