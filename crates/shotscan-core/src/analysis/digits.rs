use tracing::debug;

use super::region::BinaryImage;
use super::score::iou_score;
use super::templates::Template;

/// Minimum IoU for a digit template to count as a match at all.
pub const DIGIT_FLOOR: f64 = 0.6;

/// Outcome of reading one digit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitRead {
    Digit(u8),
    NotFound,
}

/// Outcome of reading the whole two-digit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterRead {
    Value(u32),
    NotFound,
}

impl CounterRead {
    pub fn value(self) -> Option<u32> {
        match self {
            CounterRead::Value(v) => Some(v),
            CounterRead::NotFound => None,
        }
    }
}

/// Best-scoring digit in `bank` whose score exceeds `floor`.
/// On ties the template that sorts first wins.
pub fn classify_digit(region: &BinaryImage, bank: &[Template<u8>], floor: f64) -> DigitRead {
    let mut best: Option<(u8, f64)> = None;
    for template in bank {
        let score = iou_score(region, &template.image);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((template.label, score));
        }
    }

    match best {
        Some((digit, score)) if score > floor => {
            debug!(digit, score, "digit classified");
            DigitRead::Digit(digit)
        }
        _ => {
            debug!(best_score = best.map(|(_, s)| s), "no digit above floor");
            DigitRead::NotFound
        }
    }
}

/// Combine both slots. Either slot failing fails the whole read.
pub fn combine_digits(left: DigitRead, right: DigitRead) -> CounterRead {
    match (left, right) {
        (DigitRead::Digit(l), DigitRead::Digit(r)) => CounterRead::Value(l as u32 * 10 + r as u32),
        _ => CounterRead::NotFound,
    }
}
