/// Keeps every `skip_rate`-th frame and drops the rest.
///
/// The counter starts at zero and advances once per frame offered, so with
/// a skip rate of 3 the 3rd, 6th, 9th... frames after the bootstrap frame
/// are processed.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    skip_rate: u64,
    counter: u64,
}

impl FrameSampler {
    /// Also usable outside a `Pipeline`, where no config validation has run,
    /// so a skip rate of 0 is treated as 1.
    pub fn new(skip_rate: u32) -> Self {
        Self {
            skip_rate: u64::from(skip_rate.max(1)),
            counter: 0,
        }
    }

    /// Count one pulled frame and report whether it should be processed.
    pub fn admit(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.skip_rate == 0
    }

    /// Frames offered so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}
