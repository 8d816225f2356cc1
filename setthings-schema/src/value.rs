//! Conversion between typed scalar values and their invariant string form.
//!
//! Every representation written here is independent of the runtime locale, so
//! stores shared between processes compare byte for byte.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::ValueError;

/// A scalar that can be stored as the value of a leaf property.
pub trait SettingValue: Sized + Send + Sync + 'static {
    /// Formats the value using the invariant convention.
    fn to_setting(&self) -> String;

    /// Parses a value previously produced by [`to_setting`](Self::to_setting)
    /// or written by another client using the same convention.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when `text` is not a valid representation.
    fn from_setting(text: &str) -> Result<Self, ValueError>;
}

/// Implements [`SettingValue`] for a type through its `Display` and `FromStr`
/// implementations.
///
/// ```
/// use std::fmt;
/// use std::str::FromStr;
///
/// #[derive(Debug, PartialEq)]
/// enum Mode { Fast, Safe }
///
/// impl fmt::Display for Mode {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         f.write_str(match self { Mode::Fast => "fast", Mode::Safe => "safe" })
///     }
/// }
///
/// impl FromStr for Mode {
///     type Err = String;
///     fn from_str(s: &str) -> Result<Self, Self::Err> {
///         match s {
///             "fast" => Ok(Mode::Fast),
///             "safe" => Ok(Mode::Safe),
///             other => Err(format!("unknown mode {other}")),
///         }
///     }
/// }
///
/// setthings_schema::setting_value_from_str!(Mode);
///
/// use setthings_schema::SettingValue;
/// assert_eq!(Mode::from_setting("safe").unwrap(), Mode::Safe);
/// ```
#[macro_export]
macro_rules! setting_value_from_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::SettingValue for $ty {
                fn to_setting(&self) -> ::std::string::String {
                    ::std::string::ToString::to_string(self)
                }

                fn from_setting(
                    text: &str,
                ) -> ::std::result::Result<Self, $crate::ValueError> {
                    <$ty as ::std::str::FromStr>::from_str(text)
                        .map_err(|err| $crate::ValueError::new::<$ty>(text, err))
                }
            }
        )+
    };
}

setting_value_from_str!(
    char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, IpAddr,
    Ipv4Addr, Ipv6Addr, SocketAddr,
);

impl SettingValue for String {
    fn to_setting(&self) -> String {
        self.clone()
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        Ok(text.to_owned())
    }
}

impl SettingValue for bool {
    fn to_setting(&self) -> String {
        self.to_string()
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ValueError::new::<bool>(text, "expected `true` or `false`"))
        }
    }
}

/// Paths are written through `to_string_lossy`, so a path that is not valid
/// UTF-8 has its invalid sequences replaced by `U+FFFD` and reads back as a
/// different path.
impl SettingValue for PathBuf {
    fn to_setting(&self) -> String {
        self.to_string_lossy().into_owned()
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        Ok(PathBuf::from(text))
    }
}

const NANOS_PER_MILLI: u32 = 1_000_000;
const MILLIS_PER_SEC: u128 = 1_000;

/// Durations are stored as milliseconds. Sub-millisecond precision is kept as
/// up to six fractional digits, so `1500` is 1.5s and `1.5` is 1500µs.
impl SettingValue for Duration {
    fn to_setting(&self) -> String {
        let millis = self.as_millis();
        let sub_millis = self.subsec_nanos() % NANOS_PER_MILLI;
        if sub_millis == 0 {
            return millis.to_string();
        }
        let fraction = format!("{sub_millis:06}");
        format!("{millis}.{}", fraction.trim_end_matches('0'))
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        let trimmed = text.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (trimmed, None),
        };
        let millis = whole
            .parse::<u128>()
            .map_err(|err| ValueError::new::<Duration>(text, err))?;

        let sub_millis = match fraction {
            None => 0,
            Some(digits)
                if !digits.is_empty()
                    && digits.len() <= 6
                    && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let value = digits
                    .bytes()
                    .fold(0_u32, |acc, b| acc * 10 + u32::from(b - b'0'));
                (digits.len()..6).fold(value, |acc, _| acc * 10)
            }
            Some(_) => {
                return Err(ValueError::new::<Duration>(
                    text,
                    "expected at most six fractional millisecond digits",
                ));
            }
        };

        let secs = u64::try_from(millis / MILLIS_PER_SEC)
            .map_err(|_| ValueError::new::<Duration>(text, "duration out of range"))?;
        let millis_in_sec = u32::try_from(millis % MILLIS_PER_SEC)
            .map_err(|_| ValueError::new::<Duration>(text, "duration out of range"))?;
        Ok(Duration::new(secs, millis_in_sec * NANOS_PER_MILLI + sub_millis))
    }
}

impl SettingValue for Uuid {
    fn to_setting(&self) -> String {
        self.hyphenated().to_string()
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        Uuid::parse_str(text.trim()).map_err(|err| ValueError::new::<Uuid>(text, err))
    }
}

/// Timestamps use RFC 3339 with a `Z` suffix.
impl SettingValue for DateTime<Utc> {
    fn to_setting(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    fn from_setting(text: &str) -> Result<Self, ValueError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| ValueError::new::<DateTime<Utc>>(text, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parses_case_insensitively() {
        assert!(bool::from_setting("true").unwrap());
        assert!(bool::from_setting("True").unwrap());
        assert!(!bool::from_setting("FALSE").unwrap());
        assert_eq!(true.to_setting(), "true");
    }

    #[test]
    fn bool_rejects_garbage() {
        let err = bool::from_setting("notabool").expect_err("should not parse");
        assert_eq!(err.value, "notabool");
        assert_eq!(err.type_name, "bool");
    }

    #[test]
    fn numbers_use_invariant_format() {
        assert_eq!(1_234_567_i64.to_setting(), "1234567");
        assert_eq!(0.5_f64.to_setting(), "0.5");
        assert_eq!(f64::from_setting("2.25").unwrap(), 2.25);
        assert!(u8::from_setting("256").is_err());
        assert!(i32::from_setting("1,000").is_err());
    }

    #[test]
    fn duration_is_stored_as_millis() {
        let timeout = Duration::from_millis(1500);
        assert_eq!(timeout.to_setting(), "1500");
        assert_eq!(Duration::from_setting("1500").unwrap(), timeout);
        assert!(Duration::from_setting("1.5s").is_err());
        assert!(Duration::from_setting("1.").is_err());
        assert!(Duration::from_setting("1.0000001").is_err());
    }

    #[test]
    fn duration_keeps_sub_millisecond_precision() {
        let timeout = Duration::from_micros(1500);
        assert_eq!(timeout.to_setting(), "1.5");
        assert_eq!(Duration::from_setting("1.5").unwrap(), timeout);

        let odd = Duration::new(3, 7);
        assert_eq!(odd.to_setting(), "3000.000007");
        assert_eq!(Duration::from_setting(&odd.to_setting()).unwrap(), odd);
    }

    #[test]
    fn duration_extremes_read_back() {
        let text = Duration::MAX.to_setting();
        assert_eq!(text, "18446744073709551615999.999999");
        assert_eq!(Duration::from_setting(&text).unwrap(), Duration::MAX);
        assert!(Duration::from_setting("18446744073709551616000").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_written_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = PathBuf::from(OsStr::from_bytes(b"/srv/conf\xff"));
        let text = path.to_setting();
        assert_eq!(text, "/srv/conf\u{FFFD}");
        assert_ne!(PathBuf::from_setting(&text).unwrap(), path);
        assert_eq!(PathBuf::from_setting("/etc/app").unwrap(), PathBuf::from("/etc/app"));
    }

    #[test]
    fn network_addresses_parse() {
        let addr = SocketAddr::from_setting("127.0.0.1:6379").unwrap();
        assert_eq!(addr.port(), 6379);
        assert_eq!(addr.to_setting(), "127.0.0.1:6379");
    }

    #[test]
    fn timestamps_use_rfc3339() {
        let ts = DateTime::<Utc>::from_setting("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(ts.to_setting(), "2024-03-01T12:30:00Z");
        assert!(DateTime::<Utc>::from_setting("yesterday").is_err());
    }

    #[test]
    fn uuid_is_hyphenated() {
        let id = Uuid::new_v4();
        let text = id.to_setting();
        assert_eq!(text.len(), 36);
        assert_eq!(Uuid::from_setting(&text).unwrap(), id);
    }
}
