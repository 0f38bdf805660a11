use std::{fmt, str::FromStr, time::Duration};

/// Parses a duration string such as `1d1h1m1s` into a [`Duration`].
///
/// The string is a sequence of integers, each followed by one of the units
/// `s`, `m`, `h` or `d`. An empty string parses to a zero duration.
///
/// Returns `None` when the input is malformed or the value overflows.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use quarry_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(chars.next()?);
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return None;
        }

        let number: u64 = number_str.parse().ok()?;
        let multiplier: u64 = match chars.next()? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(Duration::from_secs(total))
}

/// How long a cached copy may be reused before it must be revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    /// Revalidate on every load.
    #[default]
    Always,
    /// Never revalidate a copy that already exists.
    Never,
    /// Revalidate once the copy is older than the given duration.
    Every(Duration),
}

impl Interval {
    /// Whether a copy of the given age is still fresh under this interval.
    pub fn is_fresh(&self, age: Duration) -> bool {
        match self {
            Interval::Always => false,
            Interval::Never => true,
            Interval::Every(limit) => age < *limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInterval(pub String);

impl fmt::Display for InvalidInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid interval `{}`: expected `always`, `never` or a duration like `3h`",
            self.0
        )
    }
}

impl std::error::Error for InvalidInterval {}

impl FromStr for Interval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always" => Ok(Interval::Always),
            "never" => Ok(Interval::Never),
            "" => Err(InvalidInterval(s.to_string())),
            value => {
                parse_duration(value)
                    .map(Interval::Every)
                    .ok_or_else(|| InvalidInterval(s.to_string()))
            }
        }
    }
}
