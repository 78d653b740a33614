use crate::{DrdaError, DrdaResult};
use time::{format_description::FormatItem, macros::format_description, Date, PrimitiveDateTime, Time};

// Character representations in ISO format:
// DATE "yyyy-mm-dd", TIME "hh:mm:ss", TIMESTAMP "yyyy-mm-dd-hh.mm.ss.ffffff".

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const TIME_FORMAT_DOTTED: &[FormatItem<'static>] =
    format_description!("[hour].[minute].[second]");
const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]-[hour].[minute].[second].[subsecond digits:6]"
);
const TIMESTAMP_PARSE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour].[minute].[second].[subsecond]");

pub(crate) fn date_to_string(date: Date) -> DrdaResult<String> {
    date.format(DATE_FORMAT).map_err(format_err)
}

pub(crate) fn time_to_string(time: Time) -> DrdaResult<String> {
    time.format(TIME_FORMAT).map_err(format_err)
}

pub(crate) fn timestamp_to_string(ts: PrimitiveDateTime) -> DrdaResult<String> {
    ts.format(TIMESTAMP_FORMAT).map_err(format_err)
}

pub(crate) fn parse_date(s: &str) -> DrdaResult<Date> {
    Date::parse(s.trim_end(), DATE_FORMAT).map_err(|e| parse_err("DATE", s, &e))
}

pub(crate) fn parse_time(s: &str) -> DrdaResult<Time> {
    let s = s.trim_end();
    Time::parse(s, TIME_FORMAT)
        .or_else(|_| Time::parse(s, TIME_FORMAT_DOTTED))
        .map_err(|e| parse_err("TIME", s, &e))
}

pub(crate) fn parse_timestamp(s: &str) -> DrdaResult<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s.trim_end(), TIMESTAMP_PARSE_FORMAT)
        .map_err(|e| parse_err("TIMESTAMP", s, &e))
}

fn format_err(e: time::error::Format) -> DrdaError {
    DrdaError::UsageDetailed(format!("cannot format date/time value: {e}"))
}

fn parse_err(what: &str, s: &str, e: &time::error::Parse) -> DrdaError {
    impl_err!("invalid {what} value {s:?} received: {e}")
}
