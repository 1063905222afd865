//! Optional default adapters and converters for date and time columns.
//!
//! Mirrors the classic DB-API convention: dates and timestamps are stored
//! as ISO-8601 text, and columns declared `DATE` or `TIMESTAMP` come back
//! as [`time::Date`] / [`time::PrimitiveDateTime`]. Nothing here is
//! registered automatically; call [`register_default_adapters`] once at
//! startup to opt in.

use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, PrimitiveDateTime,
};

use crate::{adapt::register_adapter, adapt::register_converter, Value};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATETIME_SUBSEC_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

/// Register adapters for [`Date`] and [`PrimitiveDateTime`] plus matching
/// converters for the declared types `DATE` and `TIMESTAMP`.
///
/// Idempotent; registering again simply overwrites the previous entries.
pub fn register_default_adapters() {
    register_adapter::<Date, _>(|date| {
        date.format(DATE_FORMAT)
            .map(Value::Text)
            .map_err(|e| e.to_string())
    });

    register_adapter::<PrimitiveDateTime, _>(|datetime| {
        let format = if datetime.nanosecond() == 0 {
            DATETIME_FORMAT
        } else {
            DATETIME_SUBSEC_FORMAT
        };
        datetime
            .format(format)
            .map(Value::Text)
            .map_err(|e| e.to_string())
    });

    register_converter::<Date, _>("DATE", |value| {
        let text = value.as_text().ok_or("DATE column does not contain text")?;
        Date::parse(text, DATE_FORMAT).map_err(|e| e.to_string())
    });

    register_converter::<PrimitiveDateTime, _>("TIMESTAMP", |value| {
        let text = value
            .as_text()
            .ok_or("TIMESTAMP column does not contain text")?;
        PrimitiveDateTime::parse(text, DATETIME_SUBSEC_FORMAT)
            .or_else(|_| PrimitiveDateTime::parse(text, DATETIME_FORMAT))
            .map_err(|e| e.to_string())
    });
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::adapt::{adapt, convert, Param};

    #[test]
    fn test_date_round_trip() -> crate::Result<()> {
        register_default_adapters();

        let stored = adapt(Param::custom(date!(2024 - 02 - 29)))?;
        assert_eq!(stored, Value::Text("2024-02-29".into()));

        let cell = convert(stored, Some("DATE"))?;
        assert_eq!(cell.downcast_ref::<Date>(), Some(&date!(2024 - 02 - 29)));
        Ok(())
    }

    #[test]
    fn test_timestamp_round_trip() -> crate::Result<()> {
        register_default_adapters();

        let original = datetime!(2024-02-29 12:30:45.5);
        let stored = adapt(Param::custom(original))?;
        let cell = convert(stored, Some("TIMESTAMP"))?;
        assert_eq!(cell.downcast_ref::<PrimitiveDateTime>(), Some(&original));

        let plain = datetime!(2024-02-29 12:30:45);
        let stored = adapt(Param::custom(plain))?;
        assert_eq!(stored, Value::Text("2024-02-29 12:30:45".into()));
        let cell = convert(stored, Some("TIMESTAMP"))?;
        assert_eq!(cell.downcast_ref::<PrimitiveDateTime>(), Some(&plain));
        Ok(())
    }
}
