//! Block- and day-level accuracy summaries.
//!
//! Descriptive only: these numbers feed reports and plots, never the likelihood fit.

use serde::{Deserialize, Serialize};

use crate::aggregate::groups::partition_trials;
use crate::domain::{BlockAccuracy, Trial};
use crate::error::AppError;

/// Trials per block in the training protocol.
pub const DEFAULT_BLOCK_SIZE: usize = 25;

/// Overall accuracy of one `(subject, day)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAccuracy {
    pub subject: u32,
    pub day: u32,
    pub n: usize,
    pub n_correct: usize,
    pub accuracy: f64,
}

/// Split each group into consecutive blocks of `block_size` trials (the last block
/// may be shorter) and report the fraction correct per block.
pub fn block_accuracy(trials: &[Trial], block_size: usize) -> Result<Vec<BlockAccuracy>, AppError> {
    if block_size == 0 {
        return Err(AppError::new(2, "Block size must be > 0."));
    }

    let mut out = Vec::new();
    for (key, members) in partition_trials(trials) {
        for (block, chunk) in members.chunks(block_size).enumerate() {
            let n_correct = chunk.iter().filter(|t| t.is_correct()).count();
            out.push(BlockAccuracy {
                subject: key.subject,
                day: key.day,
                block,
                n: chunk.len(),
                n_correct,
                accuracy: n_correct as f64 / chunk.len() as f64,
            });
        }
    }
    Ok(out)
}

/// Fraction correct per `(subject, day)` group.
pub fn day_accuracy(trials: &[Trial]) -> Vec<DayAccuracy> {
    partition_trials(trials)
        .into_iter()
        .map(|(key, members)| {
            let n_correct = members.iter().filter(|t| t.is_correct()).count();
            DayAccuracy {
                subject: key.subject,
                day: key.day,
                n: members.len(),
                n_correct,
                accuracy: n_correct as f64 / members.len() as f64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, GroupKey};
    use approx::assert_abs_diff_eq;

    fn trials(day: u32, n: u32, correct_every: u32) -> Vec<Trial> {
        (0..n)
            .map(|i| Trial {
                key: GroupKey::new(1, day),
                trial: Some(i),
                category: Category::A,
                x: 0.0,
                y: 0.0,
                response: if i % correct_every == 0 { Category::A } else { Category::B },
            })
            .collect()
    }

    #[test]
    fn blocks_partition_each_day() {
        let mut all = trials(1, 60, 2);
        all.extend(trials(2, 25, 1));
        let blocks = block_accuracy(&all, DEFAULT_BLOCK_SIZE).unwrap();

        let sizes: Vec<(u32, usize, usize)> = blocks.iter().map(|b| (b.day, b.block, b.n)).collect();
        assert_eq!(sizes, vec![(1, 0, 25), (1, 1, 25), (1, 2, 10), (2, 0, 25)]);
        assert_eq!(blocks[0].n_correct, 13);
        assert_abs_diff_eq!(blocks[3].accuracy, 1.0);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let err = block_accuracy(&trials(1, 5, 1), 0).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn day_accuracy_per_group() {
        let mut all = trials(1, 10, 2);
        all.extend(trials(4, 4, 4));
        let days = day_accuracy(&all);
        assert_eq!(days.len(), 2);
        assert_abs_diff_eq!(days[0].accuracy, 0.5);
        assert_eq!(days[1].n_correct, 1);
    }
}
