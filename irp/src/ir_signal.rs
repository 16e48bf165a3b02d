use super::{ir_sequence::is_equal, IrSequence, ModulatedIrSequence};
use std::fmt;

/// A rendered or captured signal: sent once as intro, then the repeat for
/// as long as the button is held, then the ending once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrSignal {
    pub frequency: f64,
    pub duty_cycle: Option<f64>,
    pub intro: IrSequence,
    pub repeat: IrSequence,
    pub ending: IrSequence,
}

impl IrSignal {
    /// An intro or ending identical to the repeat is dropped, as it would
    /// just be another repeat.
    pub fn new(
        frequency: f64,
        duty_cycle: Option<f64>,
        intro: IrSequence,
        repeat: IrSequence,
        ending: IrSequence,
    ) -> Self {
        let intro = if intro.is_equal(&repeat) {
            IrSequence::empty()
        } else {
            intro
        };
        let ending = if ending.is_equal(&repeat) {
            IrSequence::empty()
        } else {
            ending
        };

        IrSignal {
            frequency,
            duty_cycle,
            intro,
            repeat,
            ending,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intro.is_empty() && self.repeat.is_empty() && self.ending.is_empty()
    }

    /// How many times the repeat is sent when the signal is sent `count`
    /// times: the intro counts as the first one if there is one.
    pub fn repeats_per_count_semantic(&self, count: usize) -> usize {
        if self.intro.is_empty() {
            count
        } else {
            count.saturating_sub(1)
        }
    }

    /// Duration of intro, one repeat and ending
    pub fn duration(&self) -> f64 {
        self.intro.duration() + self.repeat.duration() + self.ending.duration()
    }

    /// Duration when sent `count` times
    pub fn duration_count(&self, count: usize) -> f64 {
        self.intro.duration()
            + self.repeats_per_count_semantic(count) as f64 * self.repeat.duration()
            + self.ending.duration()
    }

    /// Longest of the intro and repeat gaps
    pub fn gap(&self) -> f64 {
        self.intro.gap().max(self.repeat.gap())
    }

    pub fn contains_zeros(&self) -> bool {
        self.intro.contains_zeros() || self.repeat.contains_zeros() || self.ending.contains_zeros()
    }

    pub fn replace_zeros(&mut self, replacement: f64) {
        self.intro.replace_zeros(replacement);
        self.repeat.replace_zeros(replacement);
        self.ending.replace_zeros(replacement);
    }

    /// Intro, `repetitions` repeats and the ending, as rounded durations
    /// with gaps negative
    pub fn to_int_array(&self, repetitions: usize) -> Vec<i32> {
        self.intro
            .append_repeated(&self.repeat, repetitions)
            .append(&self.ending)
            .to_ints(true)
    }

    /// The signal as sent `count` times
    pub fn to_modulated_ir_sequence(&self, count: usize) -> ModulatedIrSequence {
        self.to_modulated_ir_sequence_explicit(1, self.repeats_per_count_semantic(count), 1)
    }

    pub fn to_modulated_ir_sequence_explicit(
        &self,
        intros: usize,
        repetitions: usize,
        endings: usize,
    ) -> ModulatedIrSequence {
        let seq = IrSequence::empty()
            .append_repeated(&self.intro, intros)
            .append_repeated(&self.repeat, repetitions)
            .append_repeated(&self.ending, endings);

        ModulatedIrSequence::new(seq, self.frequency, self.duty_cycle)
    }

    /// The signal sent `count` times, as a signal with only an intro
    pub fn to_one_shot(&self, count: usize) -> IrSignal {
        IrSignal::new(
            self.frequency,
            self.duty_cycle,
            self.to_modulated_ir_sequence(count).sequence,
            IrSequence::empty(),
            IrSequence::empty(),
        )
    }

    /// Compare with tolerances on every duration and on the frequency
    pub fn is_equal(
        &self,
        other: &IrSignal,
        absolute_tolerance: f64,
        relative_tolerance: f64,
        frequency_tolerance: f64,
    ) -> bool {
        let same = |a: &IrSequence, b: &IrSequence| {
            a.len() == b.len()
                && a.data().iter().zip(b.data()).all(|(x, y)| {
                    is_equal(x.abs(), y.abs(), absolute_tolerance, relative_tolerance)
                })
        };

        (self.frequency - other.frequency).abs() <= frequency_tolerance
            && same(&self.intro, &other.intro)
            && same(&self.repeat, &other.repeat)
            && same(&self.ending, &other.ending)
    }

    /// One line per non-empty section, signs alternating
    pub fn to_print_string(&self) -> String {
        [&self.intro, &self.repeat, &self.ending]
            .into_iter()
            .filter(|seq| !seq.is_empty())
            .map(|seq| seq.to_print_string(true, false, " "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for IrSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Freq={}Hz {}{}{}",
            self.frequency.round() as i64,
            self.intro,
            self.repeat,
            self.ending
        )
    }
}
