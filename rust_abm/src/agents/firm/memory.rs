use std::collections::VecDeque;

/// Fixed-length window over the most recent observations of a series.
#[derive(Clone, Debug)]
pub struct Trailing {
    window: usize,
    values: VecDeque<f64>,
}

impl Trailing {
    pub fn new(window: usize) -> Self {
        Trailing {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Mean over the recorded observations; zero before the first one.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum() / self.values.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_forgets_oldest_values() {
        let mut memory = Trailing::new(3);
        assert_eq!(memory.mean(), 0.0);
        for v in [1.0, 2.0, 3.0, 10.0] {
            memory.push(v);
        }
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.sum(), 15.0);
        assert_eq!(memory.mean(), 5.0);
    }
}
