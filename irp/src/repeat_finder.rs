//! Find the repeating part of a captured signal
//!
//! A capture of a held button is the intro, some number of copies of the
//! repeat, and possibly an ending. Every window of bursts is tried, longest
//! first, counting how many times it repeats back to back. The window
//! whose repeats last longest wins.

use super::{
    cleaner::{Cleaner, CleanerOptions},
    IrSequence, IrSignal, ModulatedIrSequence, Result,
};
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatFinderOptions {
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
    /// The last gap of a repeat must be at least this long, in µs
    pub minimum_repeat_gap: f64,
}

impl Default for RepeatFinderOptions {
    fn default() -> Self {
        RepeatFinderOptions {
            absolute_tolerance: 60.0,
            relative_tolerance: 0.1,
            minimum_repeat_gap: 20000.0,
        }
    }
}

impl RepeatFinderOptions {
    fn cleaner_options(&self) -> CleanerOptions {
        CleanerOptions {
            absolute_tolerance: self.absolute_tolerance,
            relative_tolerance: self.relative_tolerance,
        }
    }
}

/// Where the repeat was found. All lengths are in bursts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RepeatFinderData {
    pub begin: usize,
    pub repeat: usize,
    pub number_repeats: usize,
    pub ending: usize,
    /// Last gap of the repeat
    pub last_gap: f64,
    /// Total duration of all the repeats
    pub repeats_duration: f64,
}

impl RepeatFinderData {
    /// Split a sequence into intro, repeat and ending. If nothing repeats,
    /// the whole sequence is the intro.
    pub fn chop_ir_sequence(&self, seq: &ModulatedIrSequence) -> Result<IrSignal> {
        if self.number_repeats > 1 {
            seq.to_ir_signal_split(2 * self.begin, 2 * self.repeat, self.number_repeats)
        } else {
            Ok(seq.to_ir_signal())
        }
    }
}

impl fmt::Display for RepeatFinderData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "begin = {}; repeat = {}; number repeats = {}; ending = {}; repeats duration = {}",
            self.begin,
            self.repeat,
            self.number_repeats,
            self.ending,
            self.repeats_duration.round() as i64
        )
    }
}

#[derive(Debug, Clone)]
pub struct RepeatFinder {
    options: RepeatFinderOptions,
    data: RepeatFinderData,
}

impl RepeatFinder {
    pub fn new(seq: &IrSequence, options: &RepeatFinderOptions) -> Self {
        let bursts = seq.number_of_bursts();
        let mut best = RepeatFinderData::default();

        for length in (2..=bursts / 2).rev() {
            for begin in 0..bursts - length {
                let candidate = count_repeats(seq, begin, length, options);

                // on equal duration, the window found later, which is no
                // longer than the best so far, is preferred
                if candidate.number_repeats > 1
                    && candidate.last_gap > options.minimum_repeat_gap
                    && candidate.repeats_duration > best.repeats_duration - 0.1
                {
                    best = candidate;
                }
            }
        }

        debug!("repeat finder: {best}");

        RepeatFinder {
            options: *options,
            data: best,
        }
    }

    pub fn data(&self) -> &RepeatFinderData {
        &self.data
    }

    pub fn to_ir_signal(&self, seq: &ModulatedIrSequence) -> Result<IrSignal> {
        self.data.chop_ir_sequence(seq)
    }

    /// Clean the durations of the sequence, then split it
    pub fn to_ir_signal_clean(&self, seq: &ModulatedIrSequence) -> Result<IrSignal> {
        self.data
            .chop_ir_sequence(&Cleaner::clean_modulated(seq, &self.options.cleaner_options()))
    }
}

/// How many times the window of `length` bursts at `begin` repeats
fn count_repeats(
    seq: &IrSequence,
    begin: usize,
    length: usize,
    options: &RepeatFinderOptions,
) -> RepeatFinderData {
    let start = 2 * begin;
    let len = 2 * length;

    let mut res = RepeatFinderData {
        begin,
        repeat: length,
        last_gap: seq.get(start + len - 1),
        ..Default::default()
    };

    if res.last_gap < options.minimum_repeat_gap {
        return res;
    }

    let mut hits = 1;
    while seq.is_equal_range(
        start,
        start + hits * len,
        len,
        options.absolute_tolerance,
        options.relative_tolerance,
        options.minimum_repeat_gap,
    ) {
        hits += 1;
    }

    res.number_repeats = hits;
    res.ending = seq.number_of_bursts() - begin - hits * length;
    res.repeats_duration = seq.duration_of(start, hits * len);

    res
}

pub fn find_repeat(seq: &ModulatedIrSequence, options: &RepeatFinderOptions) -> Result<IrSignal> {
    RepeatFinder::new(seq, options).to_ir_signal(seq)
}

/// Like [`find_repeat`], but the durations are cleaned before splitting
pub fn find_repeat_clean(
    seq: &ModulatedIrSequence,
    options: &RepeatFinderOptions,
) -> Result<IrSignal> {
    RepeatFinder::new(seq, options).to_ir_signal_clean(seq)
}
