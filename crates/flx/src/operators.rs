//! Shared operator semantics used by both the tree-walking evaluator and the
//! bytecode VM, so neither engine can silently drift from the other.
//!
//! Numeric operators promote across the `Bool < Int < Float` tower; string
//! and array concatenation go through the heap; floor division rounds
//! toward negative infinity (Python's `//`, not C's truncating `/`).

use crate::ast::{BinOp, UnOp};
use crate::error::{CodeLoc, RuntimeError};
use crate::heap::{Heap, HeapObject};
use crate::value::RuntimeValue;
use RuntimeValue::*;

type OpResult = Result<RuntimeValue, RuntimeError>;

pub fn apply_unary(op: UnOp, v: &RuntimeValue, at: CodeLoc) -> OpResult {
    match (op, v) {
        (UnOp::Neg, Int(i)) => Ok(Int(-i)),
        (UnOp::Neg, Float(x)) => Ok(Float(-x)),
        (UnOp::Neg, Bool(b)) => Ok(Int(-(*b as i64))),
        (UnOp::Not, _) => Ok(Bool(!v.is_truthy())),
        (UnOp::BitNot, Int(i)) => Ok(Int(!i)),
        (UnOp::BitNot, Bool(b)) => Ok(Int(!(*b as i64))),
        _ => Err(RuntimeError::Internal { message: format!("operator {op:?} not defined for {:?}", v.tag()) }),
    }
}

pub fn apply_binary(op: BinOp, lhs: &RuntimeValue, rhs: &RuntimeValue, heap: &mut Heap, at: CodeLoc) -> OpResult {
    match op {
        BinOp::And => return Ok(Bool(lhs.is_truthy() && rhs.is_truthy())),
        BinOp::Or => return Ok(Bool(lhs.is_truthy() || rhs.is_truthy())),
        BinOp::Eq => return Ok(Bool(values_equal(lhs, rhs, heap))),
        BinOp::NotEq => return Ok(Bool(!values_equal(lhs, rhs, heap))),
        _ => {}
    }

    if let (String(a), String(b)) = (lhs, rhs) {
        if op == BinOp::Add {
            let s = format!("{}{}", string_of(*a, heap), string_of(*b, heap));
            return Ok(RuntimeValue::String(heap.allocate(HeapObject::Str(s))));
        }
    }
    if let (Array(a), Array(b)) = (lhs, rhs) {
        if op == BinOp::Add {
            let mut items = array_of(*a, heap).to_vec();
            items.extend_from_slice(array_of(*b, heap));
            return Ok(RuntimeValue::Array(heap.allocate(HeapObject::Array(items))));
        }
    }

    match relational(op, lhs, rhs) {
        Some(r) => return Ok(Bool(r)),
        None => {}
    }

    if matches!(lhs, Float(_)) || matches!(rhs, Float(_)) {
        let a = lhs.as_float().ok_or(type_err(op, lhs, at))?;
        let b = rhs.as_float().ok_or(type_err(op, rhs, at))?;
        return float_arith(op, a, b, at);
    }

    let a = lhs.as_int().ok_or(type_err(op, lhs, at))?;
    let b = rhs.as_int().ok_or(type_err(op, rhs, at))?;
    int_arith(op, a, b, at)
}

fn type_err(op: BinOp, v: &RuntimeValue, at: CodeLoc) -> RuntimeError {
    RuntimeError::Internal { message: format!("operator {op:?} not defined for {:?} at {at}", v.tag()) }
}

fn relational(op: BinOp, lhs: &RuntimeValue, rhs: &RuntimeValue) -> Option<bool> {
    let cmp = |a: f64, b: f64| a.partial_cmp(&b);
    let ordering = match (lhs, rhs) {
        (Char(a), Char(b)) => Some(a.cmp(b)),
        _ => lhs.as_float().zip(rhs.as_float()).and_then(|(a, b)| cmp(a, b)),
    }?;
    use std::cmp::Ordering::*;
    Some(match op {
        BinOp::Less => ordering == Less,
        BinOp::LessEq => ordering != Greater,
        BinOp::Greater => ordering == Greater,
        BinOp::GreaterEq => ordering != Less,
        _ => return None,
    })
}

fn int_arith(op: BinOp, a: i64, b: i64, at: CodeLoc) -> OpResult {
    Ok(Int(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { at });
            }
            let q = a / b;
            let r = a % b;
            if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { at });
            }
            let r = a % b;
            if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl => a.wrapping_shl(b as u32),
        BinOp::Shr => a.wrapping_shr(b as u32),
        _ => return Err(RuntimeError::Internal { message: format!("operator {op:?} not defined for int") }),
    }))
}

fn float_arith(op: BinOp, a: f64, b: f64, at: CodeLoc) -> OpResult {
    Ok(Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { at });
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { at });
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
        }
        _ => return Err(RuntimeError::Internal { message: format!("operator {op:?} not defined for float") }),
    }))
}

pub fn values_equal(a: &RuntimeValue, b: &RuntimeValue, heap: &Heap) -> bool {
    match (a, b) {
        (Undefined, Undefined) | (Void, Void) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Char(x), Char(y)) => x == y,
        (String(x), String(y)) => string_of(*x, heap) == string_of(*y, heap),
        (Array(x), Array(y)) => {
            let (xs, ys) = (array_of(*x, heap), array_of(*y, heap));
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(a, b)| values_equal(a, b, heap))
        }
        (Struct(x), Struct(y)) => x == y,
        (Function(x), Function(y)) => x == y,
        (Any(x), Any(y)) => values_equal(x, y, heap),
        (Any(x), other) | (other, Any(x)) => values_equal(x, other, heap),
        _ => a.as_float().zip(b.as_float()).is_some_and(|(x, y)| x == y),
    }
}

fn string_of(id: crate::heap::HeapId, heap: &Heap) -> &str {
    match heap.get(id) {
        HeapObject::Str(s) => s.as_str(),
        _ => "",
    }
}

fn array_of(id: crate::heap::HeapId, heap: &Heap) -> &[RuntimeValue] {
    match heap.get(id) {
        HeapObject::Array(items) => items.as_slice(),
        _ => &[],
    }
}

/// Bounds-checks an array index per the data model's array-dim-check
/// invariant: negative and out-of-range indices are both rejected (no
/// Python-style negative indexing).
pub fn check_array_index(index: i64, len: usize, at: CodeLoc) -> Result<usize, RuntimeError> {
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len, at });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> CodeLoc {
        CodeLoc::default()
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        let mut heap = Heap::new();
        let r = apply_binary(BinOp::Div, &Int(-7), &Int(2), &mut heap, loc()).unwrap();
        assert_eq!(r, Int(-4));
    }

    #[test]
    fn modulo_result_takes_sign_of_divisor() {
        let mut heap = Heap::new();
        let r = apply_binary(BinOp::Mod, &Int(-7), &Int(2), &mut heap, loc()).unwrap();
        assert_eq!(r, Int(1));
    }

    #[test]
    fn int_division_by_zero_is_a_runtime_error() {
        let mut heap = Heap::new();
        let err = apply_binary(BinOp::Div, &Int(1), &Int(0), &mut heap, loc());
        assert!(matches!(err, Err(RuntimeError::DivisionByZero { .. })));
    }

    #[test]
    fn mixed_int_float_promotes_to_float() {
        let mut heap = Heap::new();
        let r = apply_binary(BinOp::Add, &Int(1), &Float(0.5), &mut heap, loc()).unwrap();
        assert_eq!(r, Float(1.5));
    }

    #[test]
    fn string_concatenation_allocates_new_heap_entry() {
        let mut heap = Heap::new();
        let a = heap.allocate(HeapObject::Str("foo".into()));
        let b = heap.allocate(HeapObject::Str("bar".into()));
        let r = apply_binary(BinOp::Add, &RuntimeValue::String(a), &RuntimeValue::String(b), &mut heap, loc()).unwrap();
        assert_eq!(string_of(r.heap_id().unwrap(), &heap), "foobar");
    }

    #[test]
    fn array_bounds_check_rejects_negative_and_overflowing_index() {
        assert!(check_array_index(-1, 3, loc()).is_err());
        assert!(check_array_index(3, 3, loc()).is_err());
        assert_eq!(check_array_index(2, 3, loc()).unwrap(), 2);
    }
}
