//! A small unit-expression parser covering the depth, volume, mass and time units the
//! hydrology products report.
//!
//! An expression is a space- or `*`-separated product of symbols with optional integer
//! exponents (`m3`, `m^3`, `m**3`, `m-2`), optionally followed by `/` and a single time
//! unit. A CF-style trailing time term with exponent `-1` (`m3 s-1`) is read as the rate
//! denominator, so `m3 s-1` and `m3/s` are the same unit.
//!
//! `month` is only valid as a denominator and is kept symbolic: its length depends on the
//! calendar month of each timestamp.

use crate::units::calendar::days_in_month;
use crate::units::error::UnitError;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Exponents of the base dimensions an expression is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
}

impl Dimension {
    pub const NONE: Dimension = Dimension::new(0, 0, 0);
    pub const LENGTH: Dimension = Dimension::new(1, 0, 0);
    pub const VOLUME: Dimension = Dimension::new(3, 0, 0);
    pub const MASS: Dimension = Dimension::new(0, 1, 0);
    pub const TIME: Dimension = Dimension::new(0, 0, 1);

    const fn new(length: i8, mass: i8, time: i8) -> Self {
        Self { length, mass, time }
    }

    /// `None` when an exponent leaves the `i8` range.
    fn scaled(self, power: i8) -> Option<Self> {
        Some(Self::new(
            self.length.checked_mul(power)?,
            self.mass.checked_mul(power)?,
            self.time.checked_mul(power)?,
        ))
    }

    fn combined(self, other: Dimension) -> Option<Self> {
        Some(Self::new(
            self.length.checked_add(other.length)?,
            self.mass.checked_add(other.mass)?,
            self.time.checked_add(other.time)?,
        ))
    }
}

/// The time base of a rate unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBase {
    /// A fixed duration in seconds.
    Fixed(f64),
    /// A calendar month; its length is the day count of each timestamp's month.
    CalendarMonth,
}

impl TimeBase {
    /// Length of this time base, in seconds, for the period containing `timestamp`.
    pub fn seconds_at(&self, timestamp: &NaiveDateTime) -> Result<f64, UnitError> {
        match self {
            TimeBase::Fixed(seconds) => Ok(*seconds),
            TimeBase::CalendarMonth => days_in_month(timestamp.date())
                .map(|days| f64::from(days) * SECONDS_PER_DAY)
                .ok_or(UnitError::DateOutOfRange(*timestamp)),
        }
    }
}

struct UnitSymbol {
    names: &'static [&'static str],
    factor: f64,
    dimension: Dimension,
}

const MONTH_NAMES: &[&str] = &["month", "months", "mon"];

// Factors are to SI base units (m, kg, s).
const SYMBOLS: &[UnitSymbol] = &[
    UnitSymbol {
        names: &["m", "meter", "meters", "metre", "metres"],
        factor: 1.0,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["mm", "millimeter", "millimeters", "millimetre", "millimetres"],
        factor: 1e-3,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["cm", "centimeter", "centimeters", "centimetre", "centimetres"],
        factor: 1e-2,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["km", "kilometer", "kilometers", "kilometre", "kilometres"],
        factor: 1e3,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["in", "inch", "inches"],
        factor: 0.0254,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["ft", "foot", "feet"],
        factor: 0.3048,
        dimension: Dimension::LENGTH,
    },
    UnitSymbol {
        names: &["l", "L", "liter", "liters", "litre", "litres"],
        factor: 1e-3,
        dimension: Dimension::VOLUME,
    },
    UnitSymbol {
        names: &["acre_foot", "acre_feet", "af"],
        factor: 1_233.481_837_547_52,
        dimension: Dimension::VOLUME,
    },
    UnitSymbol {
        names: &["kg", "kilogram", "kilograms"],
        factor: 1.0,
        dimension: Dimension::MASS,
    },
    UnitSymbol {
        names: &["g", "gram", "grams"],
        factor: 1e-3,
        dimension: Dimension::MASS,
    },
    UnitSymbol {
        names: &["s", "sec", "second", "seconds"],
        factor: 1.0,
        dimension: Dimension::TIME,
    },
    UnitSymbol {
        names: &["min", "minute", "minutes"],
        factor: 60.0,
        dimension: Dimension::TIME,
    },
    UnitSymbol {
        names: &["h", "hr", "hour", "hours"],
        factor: 3_600.0,
        dimension: Dimension::TIME,
    },
    UnitSymbol {
        names: &["d", "day", "days"],
        factor: SECONDS_PER_DAY,
        dimension: Dimension::TIME,
    },
    UnitSymbol {
        names: &["week", "weeks"],
        factor: 7.0 * SECONDS_PER_DAY,
        dimension: Dimension::TIME,
    },
];

enum BaseUnit {
    Fixed { factor: f64, dimension: Dimension },
    Month,
}

/// A parsed unit expression.
///
/// # Examples
///
/// ```
/// use lake_hydrology::units::Unit;
///
/// let flow: Unit = "m3 s-1".parse().unwrap();
/// assert!(flow.is_rate());
/// assert!(flow.is_equivalent(&"m^3/s".parse().unwrap()));
///
/// let depth: Unit = "mm".parse().unwrap();
/// assert!(!depth.is_rate());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    expression: String,
    factor: f64,
    dimension: Dimension,
    denominator: Option<TimeBase>,
}

impl Unit {
    pub fn parse(expression: &str) -> Result<Self, UnitError> {
        let expression = expression.trim();
        let malformed = || UnitError::Malformed(expression.to_string());

        let normalized = expression.replace("**", "^");
        let mut parts = normalized.split('/');
        let numerator_text = parts.next().ok_or_else(malformed)?;
        let denominator_text = parts.next();
        if parts.next().is_some() {
            return Err(malformed());
        }

        let mut factor = 1.0;
        let mut dimension = Dimension::NONE;
        let mut denominator = None;

        let numerator_tokens = tokens(numerator_text);
        if numerator_tokens.is_empty() {
            return Err(malformed());
        }
        for token in numerator_tokens {
            let (base, power) = parse_token(expression, token)?;
            let trailing_rate = power == -1 && denominator.is_none() && denominator_text.is_none();
            match base {
                BaseUnit::Fixed {
                    factor: f,
                    dimension: d,
                } if trailing_rate && d == Dimension::TIME => {
                    denominator = Some(TimeBase::Fixed(f));
                }
                BaseUnit::Fixed {
                    factor: f,
                    dimension: d,
                } => {
                    factor *= f.powi(i32::from(power));
                    dimension = d
                        .scaled(power)
                        .and_then(|scaled| dimension.combined(scaled))
                        .ok_or_else(malformed)?;
                }
                BaseUnit::Month if trailing_rate => denominator = Some(TimeBase::CalendarMonth),
                BaseUnit::Month => return Err(malformed()),
            }
        }

        if let Some(text) = denominator_text {
            let denominator_tokens = tokens(text);
            let [token] = denominator_tokens.as_slice() else {
                return Err(UnitError::NonTimeDenominator(expression.to_string()));
            };
            denominator = Some(match parse_token(expression, token)? {
                (BaseUnit::Month, 1) => TimeBase::CalendarMonth,
                (
                    BaseUnit::Fixed {
                        factor: f,
                        dimension: Dimension::TIME,
                    },
                    1,
                ) => TimeBase::Fixed(f),
                _ => return Err(UnitError::NonTimeDenominator(expression.to_string())),
            });
        }

        Ok(Self {
            expression: expression.to_string(),
            factor,
            dimension,
            denominator,
        })
    }

    /// The expression as written (trimmed).
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the unit is a quantity per time.
    pub fn is_rate(&self) -> bool {
        self.denominator.is_some()
    }

    pub fn denominator(&self) -> Option<TimeBase> {
        self.denominator
    }

    /// Dimension of the quantity part (without the rate denominator).
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Whether both expressions denote the same unit (`m3/s` and `m^3 s-1`, say).
    pub fn is_equivalent(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
            && self.denominator == other.denominator
            && ((self.factor - other.factor).abs() <= 1e-12 * self.factor.abs().max(other.factor.abs()))
    }

    /// Multiplier taking a quantity in this unit's numerator to `other`'s numerator.
    pub(crate) fn numerator_factor_to(&self, other: &Unit) -> Result<f64, UnitError> {
        if self.dimension != other.dimension {
            return Err(UnitError::DimensionMismatch {
                from: self.expression.clone(),
                to: other.expression.clone(),
            });
        }
        Ok(self.factor / other.factor)
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || c == '*' || c == '·' || c == '.')
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_token(expression: &str, token: &str) -> Result<(BaseUnit, i8), UnitError> {
    if token == "1" {
        return Ok((
            BaseUnit::Fixed {
                factor: 1.0,
                dimension: Dimension::NONE,
            },
            1,
        ));
    }

    let split = token
        .find(|c: char| c == '^' || c == '-' || c == '+' || c.is_ascii_digit())
        .unwrap_or(token.len());
    let (symbol, exponent) = token.split_at(split);
    if symbol.is_empty() {
        return Err(UnitError::Malformed(expression.to_string()));
    }
    let exponent = exponent.trim_start_matches('^');
    let power = if exponent.is_empty() {
        1
    } else {
        exponent
            .parse::<i8>()
            .map_err(|_| UnitError::Malformed(expression.to_string()))?
    };

    if MONTH_NAMES.contains(&symbol) {
        return Ok((BaseUnit::Month, power));
    }
    SYMBOLS
        .iter()
        .find(|unit| unit.names.contains(&symbol))
        .map(|unit| {
            (
                BaseUnit::Fixed {
                    factor: unit.factor,
                    dimension: unit.dimension,
                },
                power,
            )
        })
        .ok_or_else(|| UnitError::UnknownUnit {
            expression: expression.to_string(),
            symbol: symbol.to_string(),
        })
}
