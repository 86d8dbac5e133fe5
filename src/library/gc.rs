//! # `std.gc`
//!
//! The collector surface: per-generation cell counts, promotion thresholds
//! and explicit collection. Generations run 0 (youngest) through 2
//! (oldest); an out-of-range generation is an error.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::gc::GENERATION_OLDEST;
use crate::global::{ApiVersion, Global};
use crate::value::{skey, Object, Value};

fn check_generation(generation: i64) -> Result<usize> {
    if !(0..=GENERATION_OLDEST as i64).contains(&generation) {
        return Err(RuntimeError::Range(format!("invalid generation `{generation}`")));
    }
    Ok(generation as usize)
}

pub fn count_variables(global: &Global, generation: i64) -> Result<i64> {
    let gen = check_generation(generation)?;
    Ok(global.garbage_collector().count_tracked_variables(gen) as i64)
}

pub fn get_threshold(global: &Global, generation: i64) -> Result<i64> {
    let gen = check_generation(generation)?;
    Ok(global.garbage_collector().get_threshold(gen) as i64)
}

/// Set the threshold of a generation, returning the previous value. The
/// new threshold is clamped to a sane non-negative range.
pub fn set_threshold(global: &Global, generation: i64, threshold: i64) -> Result<i64> {
    let gen = check_generation(generation)?;
    let clamped = threshold.clamp(0, i64::MAX >> 1) as usize;
    Ok(global.garbage_collector().set_threshold(gen, clamped) as i64)
}

pub fn collect(global: &Global, generation_limit: Option<i64>) -> Result<i64> {
    let limit = match generation_limit {
        None => GENERATION_OLDEST,
        Some(g) => {
            if !(0..=GENERATION_OLDEST as i64).contains(&g) {
                return Err(RuntimeError::Range(format!("invalid generation limit `{g}`")));
            }
            g as usize
        }
    };
    Ok(global.garbage_collector().collect_variables(limit) as i64)
}

pub fn create_bindings_gc(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("count_variables"),
        Value::from(NativeFunction::new(
            "std.gc.count_variables",
            "generation",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let gen = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(count_variables(global, gen)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_threshold"),
        Value::from(NativeFunction::new(
            "std.gc.get_threshold",
            "generation",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let gen = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(get_threshold(global, gen)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("set_threshold"),
        Value::from(NativeFunction::new(
            "std.gc.set_threshold",
            "generation, threshold",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let gen = reader.required_integer()?;
                let threshold = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(set_threshold(global, gen, threshold)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("collect"),
        Value::from(NativeFunction::new(
            "std.gc.collect",
            "[generation_limit]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let limit = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(collect(global, limit)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_validation() {
        let global = Global::new(ApiVersion::V0001_0000);
        assert!(count_variables(&global, 3).is_err());
        assert!(count_variables(&global, -1).is_err());
        assert!(collect(&global, Some(5)).is_err());
        assert_eq!(count_variables(&global, 0).unwrap(), 0);
    }

    #[test]
    fn thresholds_round_trip() {
        let global = Global::new(ApiVersion::V0001_0000);
        let old = get_threshold(&global, 1).unwrap();
        assert_eq!(set_threshold(&global, 1, 77).unwrap(), old);
        assert_eq!(get_threshold(&global, 1).unwrap(), 77);
    }

    #[test]
    fn collect_reports_reclaimed_cells() {
        let global = Global::new(ApiVersion::V0001_0000);
        {
            let _v = global.garbage_collector().create_variable(Value::Integer(1));
        }
        assert_eq!(collect(&global, None).unwrap(), 1);
        assert_eq!(collect(&global, Some(0)).unwrap(), 0);
    }
}
