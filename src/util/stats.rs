use std::fmt;

/// Running summary of a sequence of counts.
///
/// `min` and `max` are meaningless while `count` is zero.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl Stats {
    pub fn push(&mut self, value: usize) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value as f64 - self.mean) / (self.count as f64);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: usize::MAX,
            max: 0,
            mean: 0.0,
        }
    }
}

impl Extend<usize> for Stats {
    fn extend<T: IntoIterator<Item = usize>>(&mut self, iter: T) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<usize> for Stats {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut stats = Stats::default();
        stats.extend(iter);
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no samples");
        }
        write!(
            f,
            "{}..={}, mean {:.2} over {} samples",
            self.min, self.max, self.mean, self.count
        )
    }
}
