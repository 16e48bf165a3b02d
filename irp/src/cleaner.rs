//! Quantize captured durations: durations within tolerance of each other
//! are replaced by their weighted average, so a noisy capture ends up with
//! a handful of distinct timings.

use super::{ir_sequence::is_equal, IrSequence, ModulatedIrSequence};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanerOptions {
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        CleanerOptions {
            absolute_tolerance: 60.0,
            relative_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cleaner {
    /// Distinct timings after cleaning, ascending
    timings: Vec<u32>,
    /// For every duration of the input, its index in `timings`
    indices: Vec<usize>,
    /// Which input durations were negative
    negative: Vec<bool>,
}

impl Cleaner {
    pub fn new(seq: &IrSequence, options: &CleanerOptions) -> Self {
        let raw: Vec<u32> = seq.to_ints(false).into_iter().map(|d| d as u32).collect();

        let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
        for d in &raw {
            *histogram.entry(*d).or_default() += 1;
        }

        let same = |x: u32, y: u32| {
            is_equal(
                x as f64,
                y as f64,
                options.absolute_tolerance,
                options.relative_tolerance,
            )
        };

        // first guess: every value not close to the previous leader starts a
        // new cluster
        let mut leaders: Vec<u32> = Vec::new();
        for d in histogram.keys() {
            if leaders.last().map_or(true, |last| !same(*last, *d)) {
                leaders.push(*d);
            }
        }

        // then take the weighted average of every cluster
        let mut timings = Vec::with_capacity(leaders.len());
        let mut cluster_of: BTreeMap<u32, usize> = BTreeMap::new();
        let mut values = histogram.iter().peekable();

        for (cluster, leader) in leaders.iter().enumerate() {
            let mut sum = 0u64;
            let mut terms = 0u64;

            while let Some((d, hits)) = values.next_if(|(d, _)| same(*leader, **d)) {
                sum += *d as u64 * *hits as u64;
                terms += *hits as u64;
                cluster_of.insert(*d, cluster);
            }

            timings.push(if terms == 0 {
                *leader
            } else {
                (sum as f64 / terms as f64).round() as u32
            });
        }

        let indices = raw
            .iter()
            .map(|d| cluster_of.get(d).copied().unwrap_or_default())
            .collect();

        let negative = seq.data().iter().map(|d| d.is_sign_negative()).collect();

        Cleaner {
            timings,
            indices,
            negative,
        }
    }

    /// The distinct timings of the cleaned sequence, ascending
    pub fn timings(&self) -> &[u32] {
        &self.timings
    }

    /// Index into [`Cleaner::timings`] of every duration
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn to_ir_sequence(&self, seq: &IrSequence) -> IrSequence {
        seq.map(|(i, _)| {
            let d = self.timings[self.indices[i]] as f64;
            if self.negative[i] {
                -d
            } else {
                d
            }
        })
    }

    pub fn clean(seq: &IrSequence, options: &CleanerOptions) -> IrSequence {
        Cleaner::new(seq, options).to_ir_sequence(seq)
    }

    /// Clean the durations, keeping frequency and duty cycle
    pub fn clean_modulated(
        seq: &ModulatedIrSequence,
        options: &CleanerOptions,
    ) -> ModulatedIrSequence {
        ModulatedIrSequence::new(
            Cleaner::clean(&seq.sequence, options),
            seq.frequency,
            seq.duty_cycle,
        )
    }
}
