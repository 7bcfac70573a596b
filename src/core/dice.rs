/// Dice notation — parsing, rolling, and probability helpers.
///
/// Notation is `[N]dM[x][+K|-K]`: `N` dice (default 1) of `M` sides, an
/// optional `x` for exploding dice and an optional signed modifier.

use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("malformed dice notation: '{0}'")]
    MalformedNotation(String),
}

/// Unanchored dice notation, shared with the curly parser.
pub(crate) const DICE_PATTERN: &str = r"\d*d\d+x?(?:[+-]\d+)?";

fn notation_regex() -> &'static Regex {
    static NOTATION: OnceLock<Regex> = OnceLock::new();
    NOTATION.get_or_init(|| {
        Regex::new(r"(\d*)d(\d+)(x?)([+-]\d+)?").expect("dice notation pattern compiles")
    })
}

/// A parsed dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub count: u32,
    pub sides: u32,
    pub exploding: bool,
    pub modifier: i64,
}

impl DiceRoll {
    /// Parse the first dice expression found in `notation`.
    pub fn parse(notation: &str) -> Result<DiceRoll, DiceError> {
        let malformed = || DiceError::MalformedNotation(notation.to_string());
        let caps = notation_regex().captures(notation).ok_or_else(malformed)?;

        let count = match &caps[1] {
            "" => 1,
            n => n.parse().map_err(|_| malformed())?,
        };
        let sides: u32 = caps[2].parse().map_err(|_| malformed())?;
        if sides == 0 {
            return Err(malformed());
        }
        let exploding = !caps[3].is_empty();
        let modifier = match caps.get(4) {
            Some(m) => m.as_str().parse().map_err(|_| malformed())?,
            None => 0,
        };

        Ok(DiceRoll {
            count,
            sides,
            exploding,
            modifier,
        })
    }

    /// Roll the expression. Totals below zero are clamped to zero.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let mut total: i64 = 0;
        for _ in 0..self.count {
            let mut face = rng.gen_range(1..=self.sides);
            // A one-sided die would explode forever.
            if self.exploding && self.sides > 1 {
                while face == self.sides {
                    total = total.saturating_add(i64::from(face));
                    face = rng.gen_range(1..=self.sides);
                }
            }
            total = total.saturating_add(i64::from(face));
        }
        total
            .saturating_add(self.modifier)
            .clamp(0, i64::from(u32::MAX)) as u32
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.exploding {
            write!(f, "x")?;
        }
        if self.modifier != 0 {
            write!(f, "{:+}", self.modifier)?;
        }
        Ok(())
    }
}

/// Parse and roll `notation` in one step.
pub fn evaluate<R: Rng + ?Sized>(notation: &str, rng: &mut R) -> Result<u32, DiceError> {
    Ok(DiceRoll::parse(notation)?.roll(rng))
}

/// How a die's result is scored when computing expected values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieMode {
    Plain,
    /// The maximum face counts twice.
    DoubleOnMax,
    Exploding,
}

/// Number of ways each total can be rolled with the given dice, where each
/// die is described by its number of sides.
pub fn roll_distribution(dice: &[u32]) -> BTreeMap<u32, u64> {
    let mut totals = BTreeMap::from([(0u32, 1u64)]);
    for &sides in dice {
        let mut next = BTreeMap::new();
        for (&total, &ways) in &totals {
            for face in 1..=sides {
                *next.entry(total + face).or_insert(0) += ways;
            }
        }
        totals = next;
    }
    totals
}

/// Convert a distribution of counts into probabilities.
pub fn probabilities(distribution: &BTreeMap<u32, u64>) -> BTreeMap<u32, f64> {
    let all: u64 = distribution.values().sum();
    if all == 0 {
        return BTreeMap::new();
    }
    distribution
        .iter()
        .map(|(&total, &ways)| (total, ways as f64 / all as f64))
        .collect()
}

/// Expected total of rolling every die once.
pub fn expected_value(dice: &[u32], mode: DieMode) -> f64 {
    dice.iter()
        .map(|&sides| {
            let s = f64::from(sides);
            match mode {
                DieMode::Plain => (s + 1.0) / 2.0,
                DieMode::DoubleOnMax => (s + 1.0) / 2.0 + 1.0,
                DieMode::Exploding if sides > 1 => (s * (s + 1.0)) / (2.0 * (s - 1.0)),
                DieMode::Exploding => s,
            }
        })
        .sum()
}

/// Chance that a standard 2d6 check plus `score` meets or beats `dc`.
pub fn pass_probability(score: i32, dc: i32) -> f64 {
    let distribution = roll_distribution(&[6, 6]);
    let all: u64 = distribution.values().sum();
    let passing: u64 = distribution
        .iter()
        .filter(|(total, _)| **total as i32 + score >= dc)
        .map(|(_, &ways)| ways)
        .sum();
    passing as f64 / all as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn one_sided_die_is_one() {
        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(evaluate("1d1", &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn negative_totals_clamp_to_zero() {
        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(evaluate("2d6-100", &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn exploding_one_sided_die_terminates() {
        let mut rng = rng();
        assert_eq!(evaluate("1d1x", &mut rng).unwrap(), 1);
        assert_eq!(evaluate("3d1x+1", &mut rng).unwrap(), 4);
    }

    #[test]
    fn exploding_dice_can_exceed_max_face() {
        let mut rng = rng();
        let best = (0..500)
            .map(|_| evaluate("1d2x", &mut rng).unwrap())
            .max()
            .unwrap();
        assert!(best > 2, "expected at least one explosion, best was {}", best);
    }

    #[test]
    fn count_defaults_to_one() {
        let roll = DiceRoll::parse("d20").unwrap();
        assert_eq!(roll.count, 1);
        assert_eq!(roll.sides, 20);
        assert!(!roll.exploding);
        assert_eq!(roll.modifier, 0);
    }

    #[test]
    fn parse_full_notation() {
        let roll = DiceRoll::parse("3d8x+2").unwrap();
        assert_eq!(
            roll,
            DiceRoll {
                count: 3,
                sides: 8,
                exploding: true,
                modifier: 2
            }
        );
        assert_eq!(roll.to_string(), "3d8x+2");
        assert_eq!(DiceRoll::parse("2d4-1").unwrap().to_string(), "2d4-1");
    }

    #[test]
    fn notation_found_inside_text() {
        let mut rng = rng();
        assert_eq!(evaluate("roll 2d1+1 now", &mut rng).unwrap(), 3);
    }

    #[test]
    fn malformed_notation() {
        assert!(matches!(
            DiceRoll::parse("goblin"),
            Err(DiceError::MalformedNotation(n)) if n == "goblin"
        ));
        assert!(DiceRoll::parse("2d").is_err());
        assert!(DiceRoll::parse("2d0").is_err());
    }

    #[test]
    fn two_d6_distribution() {
        let dist = roll_distribution(&[6, 6]);
        assert_eq!(dist.values().sum::<u64>(), 36);
        assert_eq!(dist[&7], 6);
        assert_eq!(dist[&2], 1);
        assert_eq!(dist[&12], 1);
        let probs = probabilities(&dist);
        assert!((probs[&7] - 6.0 / 36.0).abs() < 1e-12);
    }

    #[test]
    fn expected_values() {
        assert!((expected_value(&[6, 6], DieMode::Plain) - 7.0).abs() < 1e-12);
        assert!((expected_value(&[6], DieMode::DoubleOnMax) - 4.5).abs() < 1e-12);
        assert!((expected_value(&[6], DieMode::Exploding) - 4.2).abs() < 1e-12);
        assert_eq!(expected_value(&[], DieMode::Plain), 0.0);
    }

    #[test]
    fn pass_probability_bounds() {
        assert!((pass_probability(0, 7) - 21.0 / 36.0).abs() < 1e-12);
        assert_eq!(pass_probability(0, 13), 0.0);
        assert_eq!(pass_probability(10, 7), 1.0);
    }

    proptest! {
        #[test]
        fn plain_rolls_stay_in_range(
            count in 1u32..12,
            sides in 1u32..40,
            modifier in -100i64..100,
            seed in any::<u64>(),
        ) {
            let roll = DiceRoll { count, sides, exploding: false, modifier };
            let mut rng = StdRng::seed_from_u64(seed);
            let total = i64::from(roll.roll(&mut rng));
            let low = (i64::from(count) + modifier).max(0);
            let high = (i64::from(count) * i64::from(sides) + modifier).max(0);
            prop_assert!(total >= low && total <= high);
        }
    }
}
