//! Date functions over serial date numbers
//!
//! Serials follow the context's date system. In the 1900 system serial 60
//! is the phantom 1900-02-29, which has no calendar date but still has a
//! year, month and day.

use super::{cell_result, integer, number};
use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use chrono::{Datelike, Days, Local, NaiveDate, Timelike};
use gridcalc_core::{CellError, DateSystem};

const LAST_YEAR: i64 = 9999;

/// Calendar date of a serial operand, `#NUM!` when it has none
pub(crate) fn date_argument(
    args: &[FormulaValue],
    index: usize,
    ctx: &EvaluationContext,
) -> Result<NaiveDate, CellError> {
    let serial = number(args, index)?;
    ctx.date_system()
        .date_from_serial(serial)
        .ok_or(CellError::Num)
}

/// Serial of a computed date, `#NUM!` outside serial 0 through 9999-12-31
pub(crate) fn serial_value(
    date: NaiveDate,
    ctx: &EvaluationContext,
) -> Result<FormulaValue, CellError> {
    let system = ctx.date_system();
    let serial = system.serial_from_date(date);
    if !(0..=system.max_serial()).contains(&serial) {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(serial as f64))
}

fn offset_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days < 0 {
        date.checked_sub_days(magnitude)
    } else {
        date.checked_add_days(magnitude)
    }
}

/// Year, month and day of a serial
fn parts(serial: f64, system: DateSystem) -> Result<(i32, u32, u32), CellError> {
    let whole = serial.floor();
    if system == DateSystem::Excel1900 {
        if whole == 0.0 {
            return Ok((1900, 1, 0));
        }
        if whole == 60.0 {
            return Ok((1900, 2, 29));
        }
    }
    system
        .date_from_serial(serial)
        .map(|date| (date.year(), date.month(), date.day()))
        .ok_or(CellError::Num)
}

/// DATE(year, month, day)
///
/// Years below 1900 are offsets from 1900; months and days outside their
/// usual bounds roll over into the neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(build_date(args, ctx))
}

fn build_date(args: &[FormulaValue], ctx: &EvaluationContext) -> Result<FormulaValue, CellError> {
    let mut year = integer(args, 0)?;
    let month = integer(args, 1)?;
    let day = integer(args, 2)?;
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=LAST_YEAR).contains(&year) {
        return Err(CellError::Num);
    }

    let months = month
        .checked_sub(1)
        .and_then(|m| m.checked_add(year * 12))
        .ok_or(CellError::Num)?;
    let first = i32::try_from(months.div_euclid(12))
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, months.rem_euclid(12) as u32 + 1, 1))
        .ok_or(CellError::Num)?;
    let date = day
        .checked_sub(1)
        .and_then(|offset| offset_days(first, offset))
        .ok_or(CellError::Num)?;
    serial_value(date, ctx)
}

fn date_part(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    part: fn((i32, u32, u32)) -> f64,
) -> FormulaResult<FormulaValue> {
    cell_result(
        number(args, 0)
            .and_then(|serial| parts(serial, ctx.date_system()))
            .map(|ymd| FormulaValue::Number(part(ymd))),
    )
}

/// YEAR(serial_number)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(y, _, _)| f64::from(y))
}

/// MONTH(serial_number)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(_, m, _)| f64::from(m))
}

/// DAY(serial_number)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, ctx, |(_, _, d)| f64::from(d))
}

/// WEEKDAY(serial_number, [return_type])
///
/// Return type 1 counts Sunday as 1, type 2 Monday as 1, type 3 Monday as 0,
/// and types 11 to 17 start the week on Monday through Sunday.
pub fn fn_weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(weekday(args, ctx))
}

fn weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> Result<FormulaValue, CellError> {
    let serial = number(args, 0)?.floor();
    if !(0.0..=ctx.date_system().max_serial() as f64).contains(&serial) {
        return Err(CellError::Num);
    }
    let return_type = if args.len() > 1 { integer(args, 1)? } else { 1 };

    // Serial 1 in the 1900 system is a Sunday, serial 0 in 1904 a Friday
    let shift = match ctx.date_system() {
        DateSystem::Excel1900 => 6,
        DateSystem::Excel1904 => 5,
    };
    let from_sunday = (serial as i64 + shift).rem_euclid(7);
    let from_monday = (from_sunday + 6).rem_euclid(7);

    let day = match return_type {
        1 => from_sunday + 1,
        2 => from_monday + 1,
        3 => from_monday,
        11..=17 => (from_monday - (return_type - 11)).rem_euclid(7) + 1,
        _ => return Err(CellError::Num),
    };
    Ok(FormulaValue::Number(day as f64))
}

/// TODAY()
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(serial_value(Local::now().date_naive(), ctx))
}

/// NOW(): today's serial plus the elapsed fraction of the day
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let now = Local::now().naive_local();
    let day = ctx.date_system().serial_from_date(now.date()) as f64;
    let fraction = f64::from(now.time().num_seconds_from_midnight()) / 86_400.0;
    Ok(FormulaValue::Number(day + fraction))
}
