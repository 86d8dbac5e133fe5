//! # `std.math`
//!
//! Transcendental functions. Thin wrappers over the platform facilities,
//! with base-specific fast paths for the exponential and logarithm families
//! and a variadic `hypot` that skips nulls.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::Result;
use crate::global::ApiVersion;
use crate::value::{skey, Object, Value};

const E: f64 = 2.718_281_828_459_045_235_360_287_471_352_7;

pub fn exp(y: f64) -> f64 {
    y.exp()
}

pub fn exp_base(base: f64, y: f64) -> f64 {
    if base == E {
        return y.exp();
    }
    if base == 2.0 {
        return y.exp2();
    }
    base.powf(y)
}

pub fn log(x: f64) -> f64 {
    x.ln()
}

pub fn log_base(base: f64, x: f64) -> f64 {
    if base == E {
        return x.ln();
    }
    if base == 2.0 {
        return x.log2();
    }
    if base == 10.0 {
        return x.log10();
    }
    let r = base.log2();
    if r > 1.0 {
        x.log2() / r
    } else {
        f64::NAN
    }
}

pub fn expm1(y: f64) -> f64 {
    y.exp_m1()
}

pub fn log1p(x: f64) -> f64 {
    x.ln_1p()
}

pub fn hypot(values: &[Value]) -> Result<f64> {
    let mut len: f64 = 0.0;
    for val in values {
        if !val.is_null() {
            len = len.hypot(val.as_real()?);
        }
    }
    Ok(len)
}

pub fn sincos(x: f64) -> (f64, f64) {
    x.sin_cos()
}

pub fn erf(x: f64) -> f64 {
    libm::erf(x)
}

pub fn cerf(x: f64) -> f64 {
    libm::erfc(x)
}

pub fn gamma(x: f64) -> f64 {
    libm::tgamma(x)
}

pub fn lgamma(x: f64) -> f64 {
    libm::lgamma(x)
}

/// Insert a unary real wrapper.
macro_rules! bind_unary {
    ($result:ident, $key:literal, $full:literal, $func:expr) => {
        $result.insert(
            skey($key),
            Value::from(NativeFunction::new(
                $full,
                "x",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let x = reader.required_real()?;
                    if reader.end_overload() {
                        return Ok(Value::from(($func)(x)));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

pub fn create_bindings_math(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("exp"),
        Value::from(NativeFunction::new(
            "std.math.exp",
            "[base], y",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let y = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(exp(y)));
                }
                reader.start_overload();
                let base = reader.required_real()?;
                let y = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(exp_base(base, y)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("log"),
        Value::from(NativeFunction::new(
            "std.math.log",
            "[base], x",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let x = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(log(x)));
                }
                reader.start_overload();
                let base = reader.required_real()?;
                let x = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(log_base(base, x)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    bind_unary!(result, "expm1", "std.math.expm1", expm1);
    bind_unary!(result, "log1p", "std.math.log1p", log1p);
    bind_unary!(result, "sin", "std.math.sin", f64::sin);
    bind_unary!(result, "cos", "std.math.cos", f64::cos);
    bind_unary!(result, "tan", "std.math.tan", f64::tan);
    bind_unary!(result, "asin", "std.math.asin", f64::asin);
    bind_unary!(result, "acos", "std.math.acos", f64::acos);
    bind_unary!(result, "atan", "std.math.atan", f64::atan);
    bind_unary!(result, "sinh", "std.math.sinh", f64::sinh);
    bind_unary!(result, "cosh", "std.math.cosh", f64::cosh);
    bind_unary!(result, "tanh", "std.math.tanh", f64::tanh);
    bind_unary!(result, "asinh", "std.math.asinh", f64::asinh);
    bind_unary!(result, "acosh", "std.math.acosh", f64::acosh);
    bind_unary!(result, "atanh", "std.math.atanh", f64::atanh);
    bind_unary!(result, "erf", "std.math.erf", erf);
    bind_unary!(result, "cerf", "std.math.cerf", cerf);
    bind_unary!(result, "gamma", "std.math.gamma", gamma);
    bind_unary!(result, "lgamma", "std.math.lgamma", lgamma);

    result.insert(
        skey("atan2"),
        Value::from(NativeFunction::new(
            "std.math.atan2",
            "y, x",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let y = reader.required_real()?;
                let x = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(y.atan2(x)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("hypot"),
        Value::from(NativeFunction::new(
            "std.math.hypot",
            "...",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if let Some(values) = reader.end_overload_values()? {
                    return Ok(Value::from(hypot(&values)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("sincos"),
        Value::from(NativeFunction::new(
            "std.math.sincos",
            "x",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let x = reader.required_real()?;
                if reader.end_overload() {
                    let (s, c) = sincos(x);
                    return Ok(Value::from(vec![Value::from(s), Value::from(c)]));
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
    fn exp_log_fast_paths_agree() {
        assert_eq!(exp_base(2.0, 10.0), 1024.0);
        assert!((exp_base(E, 1.0) - E).abs() < 1e-15);
        assert_eq!(log_base(2.0, 1024.0), 10.0);
        assert_eq!(log_base(10.0, 1000.0), 3.0);
        assert!((log_base(8.0, 64.0) - 2.0).abs() < 1e-12);
        // A base whose logarithm is not greater than one yields NaN.
        assert!(log_base(1.0, 5.0).is_nan());
        assert!(log_base(0.5, 5.0).is_nan());
    }

    #[test]
    fn hypot_skips_nulls() {
        let vals = vec![Value::Integer(3), Value::Null, Value::Integer(4)];
        assert_eq!(hypot(&vals).unwrap(), 5.0);
        assert_eq!(hypot(&[]).unwrap(), 0.0);
        assert!(hypot(&[Value::from("x")]).is_err());
    }

    #[test]
    fn special_functions() {
        assert!((erf(0.0)).abs() < 1e-15);
        assert!((cerf(0.0) - 1.0).abs() < 1e-15);
        assert!((gamma(5.0) - 24.0).abs() < 1e-10);
        assert!((lgamma(5.0) - 24f64.ln()).abs() < 1e-10);
        let (s, c) = sincos(0.0);
        assert_eq!((s, c), (0.0, 1.0));
    }
}
