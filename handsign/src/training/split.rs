//! Seeded stratified train/validation/test split

/// Small deterministic PRNG; identical seeds give identical splits
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `0..n`; `n` must be non-zero
    pub fn next_below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Held-out fractions of each class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitFractions {
    pub test: f64,
    pub val: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self { test: 0.15, val: 0.15 }
    }
}

impl SplitFractions {
    pub fn validate(&self) -> crate::Result<()> {
        let in_range = |f: f64| (0.0..1.0).contains(&f);
        if !in_range(self.test) || !in_range(self.val) || self.test + self.val >= 1.0 {
            return Err(crate::Error::Config(format!(
                "split fractions test={} val={} must be in [0, 1) and sum below 1",
                self.test, self.val
            )));
        }
        Ok(())
    }
}

/// Items partitioned three ways, each tagged with its class index
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit<T> {
    pub train: Vec<(usize, T)>,
    pub val: Vec<(usize, T)>,
    pub test: Vec<(usize, T)>,
}

/// Split `(class, item)` pairs so every class keeps its proportions.
///
/// Held-out counts are rounded per class, then reduced until each class
/// keeps at least one training item.
pub fn stratified_split<T>(items: Vec<(usize, T)>, fractions: SplitFractions, seed: u64) -> DatasetSplit<T> {
    let mut by_class: std::collections::BTreeMap<usize, Vec<T>> = std::collections::BTreeMap::new();
    for (class, item) in items {
        by_class.entry(class).or_default().push(item);
    }

    let mut rng = SplitMix64::new(seed);
    let mut split = DatasetSplit {
        train: Vec::new(),
        val: Vec::new(),
        test: Vec::new(),
    };

    for (class, mut members) in by_class {
        rng.shuffle(&mut members);
        let n = members.len();
        let mut n_test = (n as f64 * fractions.test).round() as usize;
        let mut n_val = (n as f64 * fractions.val).round() as usize;
        while n_test + n_val >= n && n_test + n_val > 0 {
            if n_val >= n_test && n_val > 0 {
                n_val -= 1;
            } else {
                n_test -= 1;
            }
        }

        let mut members = members.into_iter();
        split.test.extend(members.by_ref().take(n_test).map(|m| (class, m)));
        split.val.extend(members.by_ref().take(n_val).map(|m| (class, m)));
        split.train.extend(members.map(|m| (class, m)));
    }
    split
}
