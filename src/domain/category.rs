// ============================================================
// Layer 3 — Category
// ============================================================
// Every image belongs to exactly one of three categories.
// ALL fixes the order used whenever every category is visited
// (bottleneck pre-warm, reporting).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Training,
    Testing,
    Validation,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Training, Category::Testing, Category::Validation];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Training   => "training",
            Category::Testing    => "testing",
            Category::Validation => "validation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many samples a batch request asks for.
///
/// The command line uses a signed count where any negative value
/// means "the whole category"; `From<i64>` applies that convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSize {
    /// `n` independent draws with replacement
    Random(usize),
    /// Every image of the category exactly once, in list order
    All,
}

impl From<i64> for SampleSize {
    fn from(n: i64) -> Self {
        if n < 0 {
            SampleSize::All
        } else {
            SampleSize::Random(n as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_count_means_all() {
        assert_eq!(SampleSize::from(-1), SampleSize::All);
        assert_eq!(SampleSize::from(-42), SampleSize::All);
        assert_eq!(SampleSize::from(0), SampleSize::Random(0));
        assert_eq!(SampleSize::from(100), SampleSize::Random(100));
    }

    #[test]
    fn test_category_names() {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["training", "testing", "validation"]);
    }
}
