//! Field ↔ cell conversions

use crate::dates;
use crate::types::{CellValue, Kind};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Largest integer an Excel number (an f64) holds exactly
const MAX_EXACT_INT: i128 = 1 << 53;

/// A field type that can live in a single cell.
///
/// Conversion failures return the reason as text; the row reader and row
/// writer attach sheet, row and column context.
pub trait CellField: Sized {
    const KIND: Kind;

    /// Number format used when the column declares none
    const DEFAULT_FORMAT: Option<&'static str> = None;

    fn to_cell(&self) -> Result<CellValue, String>;

    fn from_cell(value: &CellValue, format: Option<&str>) -> Result<Self, String>;
}

impl CellField for String {
    const KIND: Kind = Kind::String;

    fn to_cell(&self) -> Result<CellValue, String> {
        Ok(CellValue::String(self.clone()))
    }

    fn from_cell(value: &CellValue, format: Option<&str>) -> Result<Self, String> {
        Ok(match value {
            CellValue::DateTime(dt) => {
                dates::format_datetime(dt, format.unwrap_or(dates::DEFAULT_DATETIME_FORMAT))
            }
            other => other.to_text(),
        })
    }
}

macro_rules! impl_int_field {
    ($($ty:ty),*) => {
        $(
            impl CellField for $ty {
                const KIND: Kind = Kind::Int;

                fn to_cell(&self) -> Result<CellValue, String> {
                    let value = *self as i128;
                    if value.abs() > MAX_EXACT_INT {
                        return Err(format!(
                            "{} does not fit an Excel number without losing precision",
                            self
                        ));
                    }
                    Ok(CellValue::Number(*self as f64))
                }

                fn from_cell(value: &CellValue, _format: Option<&str>) -> Result<Self, String> {
                    let number = match value {
                        CellValue::Empty => return Ok(0),
                        CellValue::Number(n) => *n,
                        CellValue::String(s) if s.trim().is_empty() => return Ok(0),
                        CellValue::String(s) => {
                            let text = s.trim();
                            if let Ok(parsed) = text.parse::<$ty>() {
                                return Ok(parsed);
                            }
                            text.parse::<f64>()
                                .map_err(|_| format!("'{}' is not an integer", s))?
                        }
                        other => {
                            return Err(format!("expected an integer, found {}", other.type_name()))
                        }
                    };
                    if !number.is_finite() || number.fract() != 0.0 {
                        return Err(format!("{} is not an integer", number));
                    }
                    <$ty>::try_from(number as i128)
                        .map_err(|_| format!("{} is out of range for {}", number, stringify!($ty)))
                }
            }
        )*
    };
}

impl_int_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float_field {
    ($($ty:ty),*) => {
        $(
            impl CellField for $ty {
                const KIND: Kind = Kind::Float;

                fn to_cell(&self) -> Result<CellValue, String> {
                    if !self.is_finite() {
                        return Err(format!("{} cannot be stored in an Excel cell", self));
                    }
                    Ok(CellValue::Number(*self as f64))
                }

                fn from_cell(value: &CellValue, _format: Option<&str>) -> Result<Self, String> {
                    match value {
                        CellValue::Empty => Ok(0.0),
                        CellValue::Number(n) => Ok(*n as $ty),
                        CellValue::String(s) if s.trim().is_empty() => Ok(0.0),
                        CellValue::String(s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|_| format!("'{}' is not a number", s)),
                        other => Err(format!("expected a number, found {}", other.type_name())),
                    }
                }
            }
        )*
    };
}

impl_float_field!(f32, f64);

impl CellField for bool {
    const KIND: Kind = Kind::Bool;

    fn to_cell(&self) -> Result<CellValue, String> {
        Ok(CellValue::Bool(*self))
    }

    fn from_cell(value: &CellValue, _format: Option<&str>) -> Result<Self, String> {
        match value {
            CellValue::Empty => Ok(false),
            CellValue::Bool(b) => Ok(*b),
            CellValue::Number(n) if *n == 0.0 => Ok(false),
            CellValue::Number(n) if *n == 1.0 => Ok(true),
            CellValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "" | "false" | "0" | "no" | "n" => Ok(false),
                "true" | "1" | "yes" | "y" => Ok(true),
                _ => Err(format!("'{}' is not a boolean", s)),
            },
            other => Err(format!("expected a boolean, found {}", other.to_text())),
        }
    }
}

fn datetime_from_cell(value: &CellValue, format: &str) -> Result<NaiveDateTime, String> {
    match value {
        CellValue::DateTime(dt) => Ok(*dt),
        CellValue::Number(n) => {
            dates::from_excel_serial(*n).ok_or_else(|| format!("{} is not a valid Excel date", n))
        }
        CellValue::String(s) if !s.trim().is_empty() => dates::parse_datetime(s, format)
            .ok_or_else(|| format!("'{}' does not match date format '{}'", s, format)),
        CellValue::Empty | CellValue::String(_) => Err("date cell is empty".to_string()),
        CellValue::Bool(_) => Err("expected a date, found bool".to_string()),
    }
}

impl CellField for NaiveDate {
    const KIND: Kind = Kind::Date;
    const DEFAULT_FORMAT: Option<&'static str> = Some(dates::DEFAULT_DATE_FORMAT);

    fn to_cell(&self) -> Result<CellValue, String> {
        let dt = self.and_time(NaiveTime::MIN);
        dates::check_excel_date(&dt)?;
        Ok(CellValue::DateTime(dt))
    }

    fn from_cell(value: &CellValue, format: Option<&str>) -> Result<Self, String> {
        datetime_from_cell(value, format.unwrap_or(dates::DEFAULT_DATE_FORMAT)).map(|dt| dt.date())
    }
}

impl CellField for NaiveDateTime {
    const KIND: Kind = Kind::Date;
    const DEFAULT_FORMAT: Option<&'static str> = Some(dates::DEFAULT_DATETIME_FORMAT);

    fn to_cell(&self) -> Result<CellValue, String> {
        dates::check_excel_date(self)?;
        Ok(CellValue::DateTime(*self))
    }

    fn from_cell(value: &CellValue, format: Option<&str>) -> Result<Self, String> {
        datetime_from_cell(value, format.unwrap_or(dates::DEFAULT_DATETIME_FORMAT))
    }
}

/// Optional fields: `None` ↔ empty cell
impl<T: CellField> CellField for Option<T> {
    const KIND: Kind = T::KIND;
    const DEFAULT_FORMAT: Option<&'static str> = T::DEFAULT_FORMAT;

    fn to_cell(&self) -> Result<CellValue, String> {
        match self {
            Some(value) => value.to_cell(),
            None => Ok(CellValue::Empty),
        }
    }

    fn from_cell(value: &CellValue, format: Option<&str>) -> Result<Self, String> {
        if value.is_empty() {
            return Ok(None);
        }
        T::from_cell(value, format).map(Some)
    }
}
