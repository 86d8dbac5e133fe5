//! # `std.array`
//!
//! Slicing, searching, sorting and shuffling over arrays.
//!
//! ## Notes
//! - Slice offsets may be negative, counting from the end; out-of-range
//!   slices clamp to empty rather than failing.
//! - The find/count/exclude family accepts either a plain value (matched
//!   with the partial equality) or a unary predicate function.
//! - `sort`/`usort`/`ksort` are stable bottom-up block merge sorts working
//!   over two buffers swapped between passes. A comparison without an order
//!   is an error; sortedness of inputs to the bound queries is the caller's
//!   problem and never corrupts state.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::{ApiVersion, Global};
use crate::library::{compare_by, invoke_with_values};
use crate::value::{skey, Array, Compare, Object, Value};
use crate::variable::FunRef;

/// Clamp `(from, length)` to element bounds, wrapping a negative `from`
/// from the end.
pub(crate) fn slice_bounds(len: usize, from: i64, length: Option<i64>) -> (usize, usize) {
    let slen = len as i64;

    let clamp_from = |begin: usize| -> (usize, usize) {
        match length {
            None => (begin, len),
            Some(l) if l <= 0 => (begin, begin),
            Some(l) => {
                let avail = (len - begin) as i64;
                (begin, begin + l.min(avail) as usize)
            }
        }
    };

    if from >= slen {
        return (len, len);
    }
    if from >= 0 {
        return clamp_from(from as usize);
    }
    let rfrom = from + slen;
    if rfrom >= 0 {
        return clamp_from(rfrom as usize);
    }
    // The wrapped offset is before the first element; the part before the
    // beginning still consumes length.
    match length {
        None => (0, len),
        Some(l) if l <= 0 => (0, 0),
        Some(l) => {
            let remaining = rfrom + l;
            if remaining <= 0 {
                (0, 0)
            } else {
                (0, len.min(remaining as usize))
            }
        }
    }
}

/// Whether `elem` matches `target`: predicate truth for functions, partial
/// equality otherwise.
fn matches_target(global: &Global, target: &Value, elem: &Value) -> Result<bool> {
    if let Value::Function(func) = target {
        let result = invoke_with_values(global, func, vec![elem.clone()])?;
        return Ok(result.test());
    }
    Ok(elem.compare_partial(target) == Compare::Equal)
}

fn unordered_error(lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::Ordering(format!(
        "elements not comparable (operands were `{lhs}` and `{rhs}`)"
    ))
}

pub fn slice(data: Array, from: i64, length: Option<i64>) -> Array {
    let (begin, end) = slice_bounds(data.len(), from, length);
    if (begin, end) == (0, data.len()) {
        return data;
    }
    data[begin..end].to_vec()
}

pub fn replace_slice(
    data: Array,
    from: i64,
    length: Option<i64>,
    replacement: Array,
    rfrom: Option<i64>,
    rlength: Option<i64>,
) -> Array {
    let (begin, end) = slice_bounds(data.len(), from, length);
    let (rbegin, rend) = slice_bounds(replacement.len(), rfrom.unwrap_or(0), rlength);

    let mut res = data;
    res.splice(begin..end, replacement[rbegin..rend].iter().cloned());
    res
}

pub fn find(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Option<i64>> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    for k in begin..end {
        if matches_target(global, target, &data[k])? {
            return Ok(Some(k as i64));
        }
    }
    Ok(None)
}

pub fn find_not(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Option<i64>> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    for k in begin..end {
        if !matches_target(global, target, &data[k])? {
            return Ok(Some(k as i64));
        }
    }
    Ok(None)
}

pub fn rfind(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Option<i64>> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    for k in (begin..end).rev() {
        if matches_target(global, target, &data[k])? {
            return Ok(Some(k as i64));
        }
    }
    Ok(None)
}

pub fn rfind_not(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Option<i64>> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    for k in (begin..end).rev() {
        if !matches_target(global, target, &data[k])? {
            return Ok(Some(k as i64));
        }
    }
    Ok(None)
}

pub fn count(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<i64> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    let mut total = 0;
    for k in begin..end {
        if matches_target(global, target, &data[k])? {
            total += 1;
        }
    }
    Ok(total)
}

pub fn count_not(
    global: &Global,
    data: &Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<i64> {
    let (begin, end) = slice_bounds(data.len(), from, length);
    let mut total = 0;
    for k in begin..end {
        if !matches_target(global, target, &data[k])? {
            total += 1;
        }
    }
    Ok(total)
}

pub fn exclude(
    global: &Global,
    data: Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Array> {
    let (begin, mut end) = slice_bounds(data.len(), from, length);
    let mut res = data;
    let mut k = begin;
    while k < end {
        if matches_target(global, target, &res[k])? {
            res.remove(k);
            end -= 1;
        } else {
            k += 1;
        }
    }
    Ok(res)
}

pub fn exclude_not(
    global: &Global,
    data: Array,
    from: i64,
    length: Option<i64>,
    target: &Value,
) -> Result<Array> {
    let (begin, mut end) = slice_bounds(data.len(), from, length);
    let mut res = data;
    let mut k = begin;
    while k < end {
        if !matches_target(global, target, &res[k])? {
            res.remove(k);
            end -= 1;
        } else {
            k += 1;
        }
    }
    Ok(res)
}

pub fn is_sorted(global: &Global, data: &Array, comparator: &Option<FunRef>) -> Result<bool> {
    let first = match data.first() {
        Some(v) => v,
        None => return Ok(true),
    };
    // The first element shall not be unordered with itself.
    if compare_by(global, comparator, first, first)? != Compare::Equal {
        return Ok(false);
    }
    for w in data.windows(2) {
        if compare_by(global, comparator, &w[0], &w[1])? == Compare::Greater {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Binary search returning `(position, found)`; the data must be sorted
/// under the comparator.
fn bsearch(
    global: &Global,
    data: &Array,
    comparator: &Option<FunRef>,
    target: &Value,
    mut begin: usize,
    mut end: usize,
) -> Result<(usize, bool)> {
    loop {
        if end <= begin {
            return Ok((begin, false));
        }
        let mid = begin + (end - begin) / 2;
        match compare_by(global, comparator, target, &data[mid])? {
            Compare::Equal => return Ok((mid, true)),
            Compare::Less => end = mid,
            _ => begin = mid + 1,
        }
    }
}

fn bound(
    global: &Global,
    data: &Array,
    comparator: &Option<FunRef>,
    target: &Value,
    mut begin: usize,
    mut end: usize,
    pred: impl Fn(Compare) -> bool,
) -> Result<usize> {
    loop {
        if end <= begin {
            return Ok(begin);
        }
        let mid = begin + (end - begin) / 2;
        if pred(compare_by(global, comparator, target, &data[mid])?) {
            end = mid;
        } else {
            begin = mid + 1;
        }
    }
}

pub fn binary_search(
    global: &Global,
    data: &Array,
    target: &Value,
    comparator: &Option<FunRef>,
) -> Result<Option<i64>> {
    let (pos, found) = bsearch(global, data, comparator, target, 0, data.len())?;
    Ok(found.then_some(pos as i64))
}

pub fn lower_bound(
    global: &Global,
    data: &Array,
    target: &Value,
    comparator: &Option<FunRef>,
) -> Result<i64> {
    let pos = bound(global, data, comparator, target, 0, data.len(), |cmp| {
        cmp != Compare::Greater
    })?;
    Ok(pos as i64)
}

pub fn upper_bound(
    global: &Global,
    data: &Array,
    target: &Value,
    comparator: &Option<FunRef>,
) -> Result<i64> {
    let pos = bound(global, data, comparator, target, 0, data.len(), |cmp| {
        cmp == Compare::Less
    })?;
    Ok(pos as i64)
}

pub fn equal_range(
    global: &Global,
    data: &Array,
    target: &Value,
    comparator: &Option<FunRef>,
) -> Result<(i64, i64)> {
    let (pivot, _) = bsearch(global, data, comparator, target, 0, data.len())?;
    let lo = bound(global, data, comparator, target, 0, pivot, |cmp| {
        cmp != Compare::Greater
    })?;
    let hi = bound(global, data, comparator, target, pivot, data.len(), |cmp| {
        cmp == Compare::Less
    })?;
    Ok((lo as i64, (hi - lo) as i64))
}

/// Merge adjacent sorted blocks of `bsize` elements from `input` into
/// `output`. With `unique`, consecutive equal elements collapse, keeping
/// the earlier occurrence.
fn merge_blocks(
    output: &mut Array,
    unique: bool,
    input: &mut Array,
    compare: &mut dyn FnMut(&Value, &Value) -> Result<Compare>,
    bsize: usize,
) -> Result<()> {
    output.clear();
    let total = input.len();

    fn push(
        output: &mut Array,
        unique: bool,
        compare: &mut dyn FnMut(&Value, &Value) -> Result<Compare>,
        elem: Value,
    ) -> Result<()> {
        if unique {
            if let Some(last) = output.last() {
                match compare(last, &elem)? {
                    Compare::Unordered => return Err(unordered_error(last, &elem)),
                    Compare::Equal => return Ok(()),
                    _ => {}
                }
            }
        }
        output.push(elem);
        Ok(())
    }

    let mut bin = 0;
    // Merge while at least two blocks remain.
    while total - bin > bsize {
        let b0 = bin;
        let e0 = bin + bsize;
        let e1 = (e0 + bsize).min(total);
        bin = e1;

        let mut i0 = b0;
        let mut i1 = e0;
        loop {
            let cmp = compare(&input[i0], &input[i1])?;
            if cmp == Compare::Unordered {
                return Err(unordered_error(&input[i0], &input[i1]));
            }
            // For the merge to be stable, equal elements take the first
            // block.
            if cmp == Compare::Greater {
                let elem = std::mem::take(&mut input[i1]);
                i1 += 1;
                push(output, unique, compare, elem)?;
                if i1 == e1 {
                    break;
                }
            } else {
                let elem = std::mem::take(&mut input[i0]);
                i0 += 1;
                push(output, unique, compare, elem)?;
                if i0 == e0 {
                    break;
                }
            }
        }
        for k in i0..e0 {
            push(output, unique, compare, std::mem::take(&mut input[k]))?;
        }
        for k in i1..e1 {
            push(output, unique, compare, std::mem::take(&mut input[k]))?;
        }
    }
    // Move any remaining partial block.
    for k in bin..total {
        push(output, unique, compare, std::mem::take(&mut input[k]))?;
    }
    Ok(())
}

pub fn sort(global: &Global, data: Array, comparator: &Option<FunRef>) -> Result<Array> {
    if data.len() <= 1 {
        return Ok(data);
    }
    let mut compare =
        |lhs: &Value, rhs: &Value| -> Result<Compare> { compare_by(global, comparator, lhs, rhs) };

    let mut data = data;
    let mut temp = Array::with_capacity(data.len());
    let mut bsize = 1;
    while bsize < data.len() {
        merge_blocks(&mut temp, false, &mut data, &mut compare, bsize)?;
        std::mem::swap(&mut data, &mut temp);
        bsize *= 2;
    }
    Ok(data)
}

pub fn usort(global: &Global, data: Array, comparator: &Option<FunRef>) -> Result<Array> {
    if data.len() <= 1 {
        return Ok(data);
    }
    let mut compare =
        |lhs: &Value, rhs: &Value| -> Result<Compare> { compare_by(global, comparator, lhs, rhs) };

    let mut data = data;
    let mut temp = Array::with_capacity(data.len());
    let mut bsize = 1;
    while bsize * 2 < data.len() {
        merge_blocks(&mut temp, false, &mut data, &mut compare, bsize)?;
        std::mem::swap(&mut data, &mut temp);
        bsize *= 2;
    }
    merge_blocks(&mut temp, true, &mut data, &mut compare, bsize)?;
    Ok(temp)
}

pub fn ksort(global: &Global, object: Object, comparator: &Option<FunRef>) -> Result<Array> {
    let mut data: Array = object
        .into_iter()
        .map(|(key, value)| Value::from(vec![Value::from(key), value]))
        .collect();
    if data.len() <= 1 {
        return Ok(data);
    }
    // Keys are known to be unique.
    let mut compare = |lhs: &Value, rhs: &Value| -> Result<Compare> {
        compare_by(global, comparator, &lhs.as_array()?[0], &rhs.as_array()?[0])
    };

    let mut temp = Array::with_capacity(data.len());
    let mut bsize = 1;
    while bsize < data.len() {
        merge_blocks(&mut temp, false, &mut data, &mut compare, bsize)?;
        std::mem::swap(&mut data, &mut temp);
        bsize *= 2;
    }
    Ok(data)
}

pub fn max_of(global: &Global, data: &Array, comparator: &Option<FunRef>) -> Result<Value> {
    let mut result = Value::Null;
    for elem in data {
        if elem.is_null() {
            continue;
        }
        if result.is_null() {
            result = elem.clone();
            continue;
        }
        match compare_by(global, comparator, &result, elem)? {
            Compare::Unordered => return Err(unordered_error(&result, elem)),
            Compare::Less => result = elem.clone(),
            _ => {}
        }
    }
    Ok(result)
}

pub fn min_of(global: &Global, data: &Array, comparator: &Option<FunRef>) -> Result<Value> {
    let mut result = Value::Null;
    for elem in data {
        if elem.is_null() {
            continue;
        }
        if result.is_null() {
            result = elem.clone();
            continue;
        }
        match compare_by(global, comparator, &result, elem)? {
            Compare::Unordered => return Err(unordered_error(&result, elem)),
            Compare::Greater => result = elem.clone(),
            _ => {}
        }
    }
    Ok(result)
}

pub fn reverse(data: Array) -> Array {
    let mut res = data;
    res.reverse();
    res
}

pub fn generate(global: &Global, generator: &FunRef, length: i64) -> Result<Array> {
    let mut data = Array::new();
    data.reserve(length.max(0) as usize);
    for index in 0..length.max(0) {
        let previous = data.last().cloned().unwrap_or(Value::Null);
        let elem = invoke_with_values(global, generator, vec![Value::Integer(index), previous])?;
        data.push(elem);
    }
    Ok(data)
}

pub fn shuffle(global: &Global, data: Array, seed: Option<i64>) -> Array {
    if data.len() <= 1 {
        return data;
    }
    let mut lcg = match seed {
        Some(s) => s as u64,
        None => {
            let hi = global.random_u32() as u64;
            (hi << 32) ^ global.random_u32() as u64
        }
    };

    let mut res = data;
    for k in 0..res.len() {
        // These parameters are the same as glibc's `drand48()`.
        lcg = lcg.wrapping_mul(0x5DEECE66D).wrapping_add(0xB) & 0xFFFF_FFFF_FFFF;

        let r = ((lcg >> 16) as usize) % res.len();
        if r != k {
            res.swap(r, k);
        }
    }
    res
}

pub fn rotate(data: Array, shift: i64) -> Array {
    if data.len() <= 1 {
        return data;
    }
    let slen = data.len() as i64;
    let seek = shift % slen;
    if seek == 0 {
        return data;
    }
    // Convert the signed shift into a left rotation.
    let left = if seek > 0 { slen - seek } else { -seek };
    let mut res = data;
    res.rotate_left(left as usize);
    res
}

pub fn copy_keys(source: Object) -> Array {
    source.into_keys().map(Value::from).collect()
}

pub fn copy_values(source: Object) -> Array {
    source.into_values().collect()
}

pub fn create_bindings_array(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("slice"),
        Value::from(NativeFunction::new(
            "std.array.slice",
            "data, from, [length]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let from = reader.required_integer()?;
                let len = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(slice(data, from, len)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("replace_slice"),
        Value::from(NativeFunction::new(
            "std.array.replace_slice",
            "data, from, [length], replacement, [rfrom, [rlength]]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let from = reader.required_integer()?;
                reader.save_state(0);
                let rep = reader.required_array()?;
                let rfrom = reader.optional_integer()?;
                let rlen = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(replace_slice(data, from, None, rep, rfrom, rlen)));
                }

                reader.load_state(0);
                let len = reader.optional_integer()?;
                let rep = reader.required_array()?;
                let rfrom = reader.optional_integer()?;
                let rlen = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(replace_slice(data, from, len, rep, rfrom, rlen)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("find"),
        Value::from(NativeFunction::new(
            "std.array.find",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("find_not"),
        Value::from(NativeFunction::new(
            "std.array.find_not",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find_not(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find_not(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(find_not(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("rfind"),
        Value::from(NativeFunction::new(
            "std.array.rfind",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("rfind_not"),
        Value::from(NativeFunction::new(
            "std.array.rfind_not",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind_not(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind_not(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(rfind_not(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("count"),
        Value::from(NativeFunction::new(
            "std.array.count",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("count_not"),
        Value::from(NativeFunction::new(
            "std.array.count_not",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count_not(global, &data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count_not(global, &data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(count_not(global, &data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("exclude"),
        Value::from(NativeFunction::new(
            "std.array.exclude",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude(global, data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude(global, data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude(global, data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("exclude_not"),
        Value::from(NativeFunction::new(
            "std.array.exclude_not",
            "data, [from, [length]], [target]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude_not(global, data, 0, None, &targ)?));
                }
                reader.load_state(0);
                let from = reader.required_integer()?;
                reader.save_state(0);
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude_not(global, data, from, None, &targ)?));
                }
                reader.load_state(0);
                let len = reader.optional_integer()?;
                let targ = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(Value::from(exclude_not(global, data, from, len, &targ)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("is_sorted"),
        Value::from(NativeFunction::new(
            "std.array.is_sorted",
            "data, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(is_sorted(global, &data, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("binary_search"),
        Value::from(NativeFunction::new(
            "std.array.binary_search",
            "data, [target], [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let targ = reader.optional_value()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(binary_search(global, &data, &targ, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("lower_bound"),
        Value::from(NativeFunction::new(
            "std.array.lower_bound",
            "data, [target], [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let targ = reader.optional_value()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(lower_bound(global, &data, &targ, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("upper_bound"),
        Value::from(NativeFunction::new(
            "std.array.upper_bound",
            "data, [target], [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let targ = reader.optional_value()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(upper_bound(global, &data, &targ, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("equal_range"),
        Value::from(NativeFunction::new(
            "std.array.equal_range",
            "data, [target], [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let targ = reader.optional_value()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    let (offset, length) = equal_range(global, &data, &targ, &comp)?;
                    return Ok(Value::from(vec![Value::from(offset), Value::from(length)]));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("sort"),
        Value::from(NativeFunction::new(
            "std.array.sort",
            "data, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(sort(global, data, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("usort"),
        Value::from(NativeFunction::new(
            "std.array.usort",
            "data, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(usort(global, data, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("ksort"),
        Value::from(NativeFunction::new(
            "std.array.ksort",
            "object, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let object = reader.required_object()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return Ok(Value::from(ksort(global, object, &comp)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("max_of"),
        Value::from(NativeFunction::new(
            "std.array.max_of",
            "data, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return max_of(global, &data, &comp);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("min_of"),
        Value::from(NativeFunction::new(
            "std.array.min_of",
            "data, [comparator]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let comp = reader.optional_function()?;
                if reader.end_overload() {
                    return min_of(global, &data, &comp);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("reverse"),
        Value::from(NativeFunction::new(
            "std.array.reverse",
            "data",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                if reader.end_overload() {
                    return Ok(Value::from(reverse(data)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("generate"),
        Value::from(NativeFunction::new(
            "std.array.generate",
            "generator, length",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let generator = reader.required_function()?;
                let length = reader.required_integer()?;
                if reader.end_overload() {
                    let generator = generator.ok_or_else(|| {
                        RuntimeError::Invariant("generator unavailable".to_string())
                    })?;
                    return Ok(Value::from(generate(global, &generator, length)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("shuffle"),
        Value::from(NativeFunction::new(
            "std.array.shuffle",
            "data, [seed]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let seed = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(shuffle(global, data, seed)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("rotate"),
        Value::from(NativeFunction::new(
            "std.array.rotate",
            "data, shift",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_array()?;
                let shift = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(rotate(data, shift)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("copy_keys"),
        Value::from(NativeFunction::new(
            "std.array.copy_keys",
            "source",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let source = reader.required_object()?;
                if reader.end_overload() {
                    return Ok(Value::from(copy_keys(source)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("copy_values"),
        Value::from(NativeFunction::new(
            "std.array.copy_values",
            "source",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let source = reader.required_object()?;
                if reader.end_overload() {
                    return Ok(Value::from(copy_values(source)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Array {
        values.iter().map(|&i| Value::Integer(i)).collect()
    }

    fn global() -> Global {
        Global::new(ApiVersion::V0001_0000)
    }

    #[test]
    fn slice_boundaries() {
        let data = ints(&[1, 2, 3, 4, 5]);
        assert_eq!(slice(data.clone(), -2, Some(10)), ints(&[4, 5]));
        assert_eq!(slice(data.clone(), 10, Some(1)), ints(&[]));
        assert_eq!(slice(data.clone(), -100, None), ints(&[1, 2, 3, 4, 5]));
        assert_eq!(slice(data.clone(), 1, Some(2)), ints(&[2, 3]));
        assert_eq!(slice(data.clone(), 0, Some(5)), data);
        // A wrapped offset before the start still consumes length.
        assert_eq!(slice(data.clone(), -7, Some(4)), ints(&[1, 2]));
    }

    #[test]
    fn slice_wraparound_law() {
        let data = ints(&[9, 8, 7, 6]);
        let n = data.len() as i64;
        for from in -n..0 {
            assert_eq!(slice(data.clone(), from, None), slice(data.clone(), from + n, None));
        }
    }

    #[test]
    fn replace_slice_length_law() {
        let a = ints(&[1, 2, 3, 4, 5]);
        let r = ints(&[7, 8]);
        for from in 0..=5i64 {
            for len in 0..=6i64 {
                let out = replace_slice(a.clone(), from, Some(len), r.clone(), None, None);
                let removed = (len as usize).min(a.len() - from as usize);
                assert_eq!(out.len(), a.len() - removed + r.len());
            }
        }
    }

    #[test]
    fn find_by_value_and_by_predicate() {
        let g = global();
        let data = ints(&[3, 1, 4, 1, 5]);
        assert_eq!(find(&g, &data, 0, None, &Value::Integer(1)).unwrap(), Some(1));
        assert_eq!(rfind(&g, &data, 0, None, &Value::Integer(1)).unwrap(), Some(3));
        assert_eq!(find(&g, &data, 2, None, &Value::Integer(1)).unwrap(), Some(3));
        assert_eq!(find(&g, &data, 0, None, &Value::Integer(9)).unwrap(), None);
        assert_eq!(count(&g, &data, 0, None, &Value::Integer(1)).unwrap(), 2);

        // Mixed numeric equality: partial comparison equates 1 and 1.0.
        assert_eq!(find(&g, &data, 0, None, &Value::Real(4.0)).unwrap(), Some(2));
    }

    #[test]
    fn exclude_removes_within_range_only() {
        let g = global();
        let data = ints(&[1, 2, 1, 2, 1]);
        let out = exclude(&g, data, 1, Some(3), &Value::Integer(1)).unwrap();
        assert_eq!(out, ints(&[1, 2, 2, 1]));
    }

    #[test]
    fn sort_is_stable_across_numeric_equality() {
        let g = global();
        let data = vec![
            Value::Integer(3),
            Value::Real(1.0),
            Value::Integer(2),
            Value::Integer(1),
            Value::Real(3.0),
        ];
        let sorted = sort(&g, data, &None).unwrap();
        // 1.0 came before 1, and 3 before 3.0.
        assert_eq!(sorted[0], Value::Real(1.0));
        assert!(sorted[0].is_real() && !sorted[0].is_integer());
        assert!(sorted[1].is_integer());
        assert!(sorted[3].is_integer());
        assert!(sorted[4].is_real() && !sorted[4].is_integer());
    }

    #[test]
    fn usort_collapses_equal_elements_keeping_the_first() {
        let g = global();
        let data = vec![
            Value::Integer(3),
            Value::Real(1.0),
            Value::Integer(2),
            Value::Integer(1),
            Value::Real(3.0),
        ];
        let sorted = usort(&g, data, &None).unwrap();
        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[0], Value::Real(1.0));
        assert!(!sorted[0].is_integer());
        assert_eq!(sorted[1], Value::Integer(2));
        assert_eq!(sorted[2], Value::Integer(3));
        assert!(sorted[2].is_integer());
    }

    #[test]
    fn sort_rejects_unordered_elements() {
        let g = global();
        let data = vec![Value::Integer(1), Value::from("x")];
        let err = sort(&g, data, &None).unwrap_err();
        assert!(err.to_string().contains("not comparable"));

        let data = vec![Value::Real(1.0), Value::Real(f64::NAN)];
        assert!(sort(&g, data, &None).is_err());

        let data = vec![Value::Real(f64::NAN), Value::Integer(1), Value::Integer(2)];
        assert!(max_of(&g, &data, &None).is_err());
    }

    #[test]
    fn sorted_queries() {
        let g = global();
        let data = ints(&[1, 2, 2, 2, 4, 7]);
        assert!(is_sorted(&g, &data, &None).unwrap());
        assert_eq!(lower_bound(&g, &data, &Value::Integer(2), &None).unwrap(), 1);
        assert_eq!(upper_bound(&g, &data, &Value::Integer(2), &None).unwrap(), 4);
        assert_eq!(equal_range(&g, &data, &Value::Integer(2), &None).unwrap(), (1, 3));
        assert!(binary_search(&g, &data, &Value::Integer(4), &None).unwrap().is_some());
        assert_eq!(binary_search(&g, &data, &Value::Integer(5), &None).unwrap(), None);
        assert!(!is_sorted(&g, &ints(&[2, 1]), &None).unwrap());
    }

    #[test]
    fn ksort_orders_pairs_by_key() {
        let g = global();
        let mut object = Object::new();
        object.insert(skey("b"), Value::Integer(2));
        object.insert(skey("a"), Value::Integer(1));
        object.insert(skey("c"), Value::Integer(3));
        let pairs = ksort(&g, object, &None).unwrap();
        let keys: Vec<Value> = pairs
            .iter()
            .map(|p| p.as_array().unwrap()[0].clone())
            .collect();
        assert_eq!(keys, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
    }

    #[test]
    fn min_max_skip_nulls() {
        let g = global();
        let data = vec![Value::Null, Value::Integer(3), Value::Null, Value::Integer(1)];
        assert_eq!(max_of(&g, &data, &None).unwrap(), Value::Integer(3));
        assert_eq!(min_of(&g, &data, &None).unwrap(), Value::Integer(1));
        assert_eq!(max_of(&g, &ints(&[]), &None).unwrap(), Value::Null);
    }

    #[test]
    fn rotate_shifts_right_for_positive_amounts() {
        assert_eq!(rotate(ints(&[1, 2, 3, 4, 5]), 1), ints(&[5, 1, 2, 3, 4]));
        assert_eq!(rotate(ints(&[1, 2, 3, 4, 5]), -1), ints(&[2, 3, 4, 5, 1]));
        assert_eq!(rotate(ints(&[1, 2, 3]), 3), ints(&[1, 2, 3]));
        assert_eq!(rotate(ints(&[1, 2, 3]), 7), ints(&[3, 1, 2]));
    }

    #[test]
    fn shuffle_is_a_permutation_and_deterministic_by_seed() {
        let g = global();
        let data = ints(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let a = shuffle(&g, data.clone(), Some(42));
        let b = shuffle(&g, data.clone(), Some(42));
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_by(|x, y| x.as_integer().unwrap().cmp(&y.as_integer().unwrap()));
        assert_eq!(sorted, data);
    }

    #[test]
    fn generate_feeds_index_and_previous() {
        let g = global();
        let generator: FunRef = NativeFunction::new(
            "test.gen",
            "i, prev",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let i = reader.required_integer()?;
                let prev = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::Integer(i + prev.unwrap_or(100)));
                }
                Err(reader.no_matching_function_call())
            }),
        );
        let out = generate(&g, &generator, 3).unwrap();
        assert_eq!(out, ints(&[100, 101, 103]));
    }

    #[test]
    fn object_flattening_preserves_insertion_order() {
        let mut object = Object::new();
        object.insert(skey("z"), Value::Integer(1));
        object.insert(skey("a"), Value::Integer(2));
        assert_eq!(copy_keys(object.clone()), vec![Value::from("z"), Value::from("a")]);
        assert_eq!(copy_values(object), ints(&[1, 2]));
    }
}
