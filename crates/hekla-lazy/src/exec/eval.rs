//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Bottom-up expression evaluation over one frame.
//!
//! Leaf `Column` nodes borrow the frame's buffers; every other node
//! allocates one output column. Literal operands take the scalar-variant
//! kernels, length-1 results broadcast against full columns, and a per-node
//! memo keyed by structural hash gives duplicate subexpressions a single
//! evaluation.

use std::collections::HashMap;

use hekla::column::builder::{ColumnBuilder, PrimBuilder, StrBuilder};
use hekla::column::{Bitmap, PrimType, PrimitiveArray};
use hekla::groupby::{grouped_aggregate, AggKind, Groups};
use hekla::mem::AlignedVec;
use hekla::simd::{kernels, CmpOp};
use hekla::{Column, DataType, Error, Frame, Result, Scalar};

use crate::expr::{Expr, ListFunc, Literal, Operator, StrFunc, WindowFunc};

/// Per-node evaluation memo: structural hash → materialized column.
pub type Memo = HashMap<u64, Column>;

/// Evaluate `exprs` against `frame` with shared subexpression memoization.
/// Length-1 results broadcast to the longest output.
pub fn eval_exprs(frame: &Frame, exprs: &[Expr]) -> Result<Vec<(String, Column)>> {
    let mut memo = Memo::new();
    let mut out = Vec::with_capacity(exprs.len());
    for e in exprs {
        let name = e.output_name()?.to_string();
        let col = eval_expr(frame, e, &mut memo)?;
        out.push((name, col));
    }
    // Aggregations produce one row; broadcast only when mixed with longer
    // results.
    let target = out.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
    if target > 1 {
        for (name, col) in out.iter_mut() {
            if col.len() == 1 && target != 1 {
                *col = Column::full(&col.get(0), target, &col.dtype())?;
            } else if col.len() != target {
                return Err(Error::shape(format!(
                    "expression '{name}' produced {} rows, expected {target}",
                    col.len()
                )));
            }
        }
    }
    Ok(out)
}

/// Evaluate one predicate to a 0/1 row mask; null counts as 0.
pub fn filter_mask(frame: &Frame, predicate: &Expr) -> Result<Vec<u8>> {
    let mut memo = Memo::new();
    let col = eval_expr(frame, predicate, &mut memo)?;
    if col.len() == 1 && frame.nrows() != 1 {
        let keep = matches!(col.get(0), Scalar::Bool(true));
        return Ok(vec![keep as u8; frame.nrows()]);
    }
    if col.len() != frame.nrows() {
        return Err(Error::shape(format!(
            "filter predicate produced {} rows for a batch of {}",
            col.len(),
            frame.nrows()
        )));
    }
    col.bool_mask()
}

/// Evaluate one expression to a column.
pub fn eval_expr(frame: &Frame, expr: &Expr, memo: &mut Memo) -> Result<Column> {
    let key = expr.structural_hash();
    if let Some(hit) = memo.get(&key) {
        return Ok(hit.clone());
    }
    let out = eval_uncached(frame, expr, memo)?;
    memo.insert(key, out.clone());
    Ok(out)
}

fn eval_uncached(frame: &Frame, expr: &Expr, memo: &mut Memo) -> Result<Column> {
    match expr {
        Expr::Column(name) => frame.column(name).cloned(),
        Expr::Literal(v) => Column::full(&v.to_scalar(), 1, &v.dtype()),
        Expr::Alias(e, _) => eval_expr(frame, e, memo),
        Expr::Cast {
            expr,
            dtype,
            allow_lossy,
        } => eval_expr(frame, expr, memo)?.cast(dtype, *allow_lossy),
        Expr::Binary { left, op, right } => eval_binary(frame, left, *op, right, memo),
        Expr::Not(e) => {
            let col = eval_expr(frame, e, memo)?;
            let Column::Bool(a) = &col else {
                return Err(Error::type_err(format!(
                    "'not' requires bool, got {}",
                    col.dtype()
                )));
            };
            let mut out = AlignedVec::with_capacity(a.len())?;
            for &v in a.values() {
                out.push((v == 0) as u8)?;
            }
            Ok(Column::Bool(PrimitiveArray::new(
                out.freeze(),
                a.validity().cloned(),
            )))
        }
        Expr::IsNull(e) => {
            let col = eval_expr(frame, e, memo)?;
            let bits: Vec<u8> = (0..col.len()).map(|i| !col.is_valid(i) as u8).collect();
            Ok(Column::Bool(PrimitiveArray::from_vec(bits)?))
        }
        Expr::IsNotNull(e) => {
            let col = eval_expr(frame, e, memo)?;
            let bits: Vec<u8> = (0..col.len()).map(|i| col.is_valid(i) as u8).collect();
            Ok(Column::Bool(PrimitiveArray::from_vec(bits)?))
        }
        Expr::FillNull { expr, value } => {
            let col = eval_expr(frame, expr, memo)?;
            if col.null_count() == 0 {
                return Ok(col);
            }
            let fill = eval_expr(frame, value, memo)?;
            let fill_value = fill.get(0);
            let dtype = col.dtype();
            let mut b = ColumnBuilder::with_capacity(&dtype, col.len())?;
            for i in 0..col.len() {
                let v = col.get(i);
                if v.is_null() {
                    b.append_scalar(&fill_value)?;
                } else {
                    b.append_scalar(&v)?;
                }
            }
            b.finish()
        }
        Expr::Coalesce(exprs) => {
            let cols = exprs
                .iter()
                .map(|e| eval_expr(frame, e, memo))
                .collect::<Result<Vec<_>>>()?;
            let n = cols.iter().map(|c| c.len()).max().unwrap_or(0);
            let schema = frame.schema();
            let dtype = expr.dtype(&schema)?;
            let mut b = ColumnBuilder::with_capacity(&dtype, n)?;
            for i in 0..n {
                let mut picked = Scalar::Null;
                for c in &cols {
                    let v = if c.len() == 1 { c.get(0) } else { c.get(i) };
                    if !v.is_null() {
                        picked = v;
                        break;
                    }
                }
                b.append_scalar(&picked)?;
            }
            b.finish()
        }
        Expr::Agg { input, kind } => {
            let col = eval_expr(frame, input, memo)?;
            aggregate_full(&col, kind)
        }
        Expr::Window { input, func } => {
            let col = eval_expr(frame, input, memo)?;
            eval_window(&col, func)
        }
        Expr::StrFn { input, func } => {
            let col = eval_expr(frame, input, memo)?;
            eval_str_fn(&col, func)
        }
        Expr::ListFn { input, func } => {
            let col = eval_expr(frame, input, memo)?;
            eval_list_fn(&col, func)
        }
        Expr::Field { input, name } => {
            let col = eval_expr(frame, input, memo)?;
            let arr = col.struct_array().ok_or_else(|| {
                Error::type_err(format!(
                    "field access '{name}' requires a struct, got {}",
                    col.dtype()
                ))
            })?;
            arr.field(name)
                .cloned()
                .ok_or_else(|| Error::schema(format!("struct field '{name}' not found")))
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let mask_col = eval_expr(frame, cond, memo)?;
            let mask = mask_col.bool_mask()?;
            let then_col = eval_expr(frame, then, memo)?;
            let else_col = eval_expr(frame, otherwise, memo)?;
            let n = mask.len().max(then_col.len()).max(else_col.len());
            let schema = frame.schema();
            let dtype = expr.dtype(&schema)?;
            let then_col = then_col.cast(&dtype, false)?;
            let else_col = else_col.cast(&dtype, false)?;
            let pick = |c: &Column, i: usize| if c.len() == 1 { c.get(0) } else { c.get(i) };
            let mut b = ColumnBuilder::with_capacity(&dtype, n)?;
            for i in 0..n {
                let m = if mask.len() == 1 { mask[0] } else { mask[i] };
                let v = if m != 0 {
                    pick(&then_col, i)
                } else {
                    pick(&else_col, i)
                };
                b.append_scalar(&v)?;
            }
            b.finish()
        }
    }
}

// ---------------------------------------------------------------------------
// Full-column aggregation
// ---------------------------------------------------------------------------

/// Aggregate a whole column to one row by running the grouped kernels over
/// a single all-rows group.
pub fn aggregate_full(col: &Column, kind: &AggKind) -> Result<Column> {
    if col.is_empty() {
        let dtype = kind.output_dtype(&col.dtype());
        if matches!(kind, AggKind::Count) {
            return Column::from_vec(vec![0u32]);
        }
        return Column::full(&Scalar::Null, 1, &dtype);
    }
    let groups = Groups {
        ids: vec![0; col.len()],
        first_rows: vec![0],
        counts: vec![col.len() as u32],
    };
    grouped_aggregate(col, &groups, kind)
}

// ---------------------------------------------------------------------------
// Binary operators
// ---------------------------------------------------------------------------

fn eval_binary(
    frame: &Frame,
    left: &Expr,
    op: Operator,
    right: &Expr,
    memo: &mut Memo,
) -> Result<Column> {
    if op.is_logical() {
        return eval_logical(frame, left, op, right, memo);
    }

    // Literal operands skip materialization and use the scalar-variant
    // kernels directly.
    if let Expr::Literal(v) = right {
        let lhs = eval_expr(frame, left, memo)?;
        return binary_with_scalar(&lhs, op, v, false);
    }
    if let Expr::Literal(v) = left {
        let rhs = eval_expr(frame, right, memo)?;
        return binary_with_scalar(&rhs, op, v, true);
    }

    let lhs = eval_expr(frame, left, memo)?;
    let rhs = eval_expr(frame, right, memo)?;

    // Length-1 sides broadcast through the scalar kernels as well.
    if rhs.len() == 1 && lhs.len() != 1 {
        return binary_with_scalar_value(&lhs, op, &rhs.get(0), false);
    }
    if lhs.len() == 1 && rhs.len() != 1 {
        return binary_with_scalar_value(&rhs, op, &lhs.get(0), true);
    }
    if lhs.len() != rhs.len() {
        return Err(Error::shape(format!(
            "binary '{}' over lengths {} and {}",
            op.symbol(),
            lhs.len(),
            rhs.len()
        )));
    }

    if op.is_comparison() {
        return compare_columns(&lhs, op, &rhs);
    }
    arithmetic_columns(&lhs, op, &rhs)
}

fn eval_logical(
    frame: &Frame,
    left: &Expr,
    op: Operator,
    right: &Expr,
    memo: &mut Memo,
) -> Result<Column> {
    let lhs = eval_expr(frame, left, memo)?;
    let rhs = eval_expr(frame, right, memo)?;
    let (Column::Bool(a), Column::Bool(b)) = (&lhs, &rhs) else {
        return Err(Error::type_err(format!(
            "logical '{}' requires bool operands, got {} and {}",
            op.symbol(),
            lhs.dtype(),
            rhs.dtype()
        )));
    };
    let n = a.len().max(b.len());
    let av = |i: usize| if a.len() == 1 { a.values()[0] } else { a.values()[i] };
    let bv = |i: usize| if b.len() == 1 { b.values()[0] } else { b.values()[i] };
    let mut out = AlignedVec::with_capacity(n)?;
    for i in 0..n {
        let v = match op {
            Operator::And => av(i) & bv(i),
            Operator::Or => av(i) | bv(i),
            _ => unreachable!(),
        };
        out.push(v)?;
    }
    let validity = match (a.len(), b.len()) {
        (1, _) => b.validity().cloned(),
        (_, 1) => a.validity().cloned(),
        _ => Bitmap::merge(a.validity(), b.validity())?,
    };
    Ok(Column::Bool(PrimitiveArray::new(out.freeze(), validity)))
}

/// The numeric type both operands cast to before the kernel runs.
fn unified_numeric(op: Operator, lt: &DataType, rt: &DataType) -> Result<DataType> {
    if !lt.is_numeric() || !rt.is_numeric() {
        return Err(Error::type_err(format!(
            "'{}' is invalid for {lt} and {rt}",
            op.symbol()
        )));
    }
    if op == Operator::Div || lt.is_float() || rt.is_float() {
        return Ok(DataType::F64);
    }
    if lt == rt {
        return Ok(lt.clone());
    }
    let width = |t: &DataType| t.prim_kind().map_or(8, |k| k.width());
    let signed = |t: &DataType| t.prim_kind().is_some_and(|k| k.is_signed());
    Ok(match (width(lt).max(width(rt)), signed(lt) || signed(rt)) {
        (8, false) => DataType::U64,
        (8, true) => DataType::I64,
        (4, false) => DataType::U32,
        (4, true) => DataType::I32,
        (_, false) => DataType::U8,
        (_, true) => DataType::I8,
    })
}

fn arithmetic_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    op: Operator,
    b: &PrimitiveArray<T>,
) -> Result<PrimitiveArray<T>> {
    if op == Operator::Rem && !T::IS_FLOAT {
        for i in 0..b.len() {
            if b.get(i) == Some(T::zero()) {
                return Err(Error::arithmetic(format!(
                    "integer '%' by zero at row {i}"
                )));
            }
        }
    }
    let k = kernels::<T>();
    let mut out = AlignedVec::full(a.len(), T::zero())?;
    let f = match op {
        Operator::Add => k.add,
        Operator::Sub => k.sub,
        Operator::Mul => k.mul,
        Operator::Div => k.div,
        Operator::Rem => k.rem,
        _ => return Err(Error::internal("non-arithmetic op in arithmetic kernel")),
    };
    f(a.values(), b.values(), out.as_mut_slice());
    let validity = Bitmap::merge(a.validity(), b.validity())?;
    Ok(PrimitiveArray::new(out.freeze(), validity))
}

macro_rules! per_numeric_pair {
    ($a:expr, $b:expr, $f:ident ( $($args:expr),* )) => {
        match ($a, $b) {
            (Column::F64(x), Column::F64(y)) => Column::F64($f(x $(, $args)*, y)?),
            (Column::F32(x), Column::F32(y)) => Column::F32($f(x $(, $args)*, y)?),
            (Column::I64(x), Column::I64(y)) => Column::I64($f(x $(, $args)*, y)?),
            (Column::I32(x), Column::I32(y)) => Column::I32($f(x $(, $args)*, y)?),
            (Column::U64(x), Column::U64(y)) => Column::U64($f(x $(, $args)*, y)?),
            (Column::U32(x), Column::U32(y)) => Column::U32($f(x $(, $args)*, y)?),
            (Column::I8(x), Column::I8(y)) => Column::I8($f(x $(, $args)*, y)?),
            (Column::U8(x), Column::U8(y)) => Column::U8($f(x $(, $args)*, y)?),
            _ => return Err(Error::internal("operands not unified before kernel")),
        }
    };
}

fn arithmetic_columns(lhs: &Column, op: Operator, rhs: &Column) -> Result<Column> {
    let target = unified_numeric(op, &lhs.dtype(), &rhs.dtype())?;
    let lhs = lhs.cast(&target, false)?;
    let rhs = rhs.cast(&target, false)?;
    Ok(per_numeric_pair!(&lhs, &rhs, arithmetic_prim(op)))
}

fn compare_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    op: CmpOp,
    b: &PrimitiveArray<T>,
) -> Result<PrimitiveArray<u8>> {
    let k = kernels::<T>();
    let mut out = vec![0u8; a.len()];
    (k.cmp)(op, a.values(), b.values(), &mut out);
    let validity = Bitmap::merge(a.validity(), b.validity())?;
    Ok(PrimitiveArray::new(
        AlignedVec::from_slice(&out)?.freeze(),
        validity,
    ))
}

fn cmp_op(op: Operator) -> CmpOp {
    match op {
        Operator::Eq => CmpOp::Eq,
        Operator::NotEq => CmpOp::Ne,
        Operator::Lt => CmpOp::Lt,
        Operator::LtEq => CmpOp::Le,
        Operator::Gt => CmpOp::Gt,
        Operator::GtEq => CmpOp::Ge,
        _ => unreachable!("not a comparison"),
    }
}

fn compare_columns(lhs: &Column, op: Operator, rhs: &Column) -> Result<Column> {
    // String comparison walks rows; numeric comparison unifies and runs the
    // lane kernels.
    let lt = lhs.dtype();
    let rt = rhs.dtype();
    if matches!(lt, DataType::Str | DataType::Categorical)
        && matches!(rt, DataType::Str | DataType::Categorical)
    {
        let mut b = PrimBuilder::<u8>::with_capacity(lhs.len())?;
        for i in 0..lhs.len() {
            match (string_at(lhs, i), string_at(rhs, i)) {
                (Some(x), Some(y)) => {
                    let r = match op {
                        Operator::Eq => x == y,
                        Operator::NotEq => x != y,
                        Operator::Lt => x < y,
                        Operator::LtEq => x <= y,
                        Operator::Gt => x > y,
                        Operator::GtEq => x >= y,
                        _ => unreachable!(),
                    };
                    b.append_value(r as u8)?;
                }
                _ => b.append_null()?,
            }
        }
        return Ok(Column::Bool(b.finish()?));
    }
    if lt == DataType::Bool && rt == DataType::Bool {
        let lhs = lhs.cast(&DataType::U8, false)?;
        let rhs = rhs.cast(&DataType::U8, false)?;
        let arr = per_numeric_pair_cmp(&lhs, &rhs, cmp_op(op))?;
        return Ok(Column::Bool(arr));
    }
    let target = if lt == rt {
        lt
    } else {
        unified_numeric(Operator::Add, &lt, &rt)?
    };
    let lhs = lhs.cast(&target, false)?;
    let rhs = rhs.cast(&target, false)?;
    let out = per_numeric_pair_cmp(&lhs, &rhs, cmp_op(op))?;
    Ok(Column::Bool(out))
}

fn per_numeric_pair_cmp(lhs: &Column, rhs: &Column, op: CmpOp) -> Result<PrimitiveArray<u8>> {
    Ok(match (lhs, rhs) {
        (Column::F64(x), Column::F64(y)) => compare_prim(x, op, y)?,
        (Column::F32(x), Column::F32(y)) => compare_prim(x, op, y)?,
        (Column::I64(x), Column::I64(y)) => compare_prim(x, op, y)?,
        (Column::I32(x), Column::I32(y)) => compare_prim(x, op, y)?,
        (Column::U64(x), Column::U64(y)) => compare_prim(x, op, y)?,
        (Column::U32(x), Column::U32(y)) => compare_prim(x, op, y)?,
        (Column::I8(x), Column::I8(y)) => compare_prim(x, op, y)?,
        (Column::U8(x), Column::U8(y)) => compare_prim(x, op, y)?,
        (Column::Datetime(x, _), Column::Datetime(y, _))
        | (Column::Duration(x, _), Column::Duration(y, _)) => compare_prim(x, op, y)?,
        (l, r) => {
            return Err(Error::type_err(format!(
                "cannot compare {} with {}",
                l.dtype(),
                r.dtype()
            )))
        }
    })
}

fn string_at(col: &Column, i: usize) -> Option<String> {
    match col.get(i) {
        Scalar::Str(s) => Some(s.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Scalar-variant paths
// ---------------------------------------------------------------------------

fn binary_with_scalar(col: &Column, op: Operator, lit: &Literal, scalar_on_left: bool) -> Result<Column> {
    binary_with_scalar_value(col, op, &lit.to_scalar(), scalar_on_left)
}

fn scalar_arith_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    op: Operator,
    scalar_on_left: bool,
    s: T,
) -> Result<PrimitiveArray<T>> {
    if op == Operator::Rem && !T::IS_FLOAT && !scalar_on_left && s == T::zero() {
        return Err(Error::arithmetic("integer '%' by zero".to_string()));
    }
    let k = kernels::<T>();
    let mut out = AlignedVec::full(a.len(), T::zero())?;
    match (op, scalar_on_left) {
        (Operator::Add, _) => (k.add_scalar)(a.values(), s, out.as_mut_slice()),
        (Operator::Sub, false) => (k.sub_scalar)(a.values(), s, out.as_mut_slice()),
        (Operator::Sub, true) => (k.rsub_scalar)(s, a.values(), out.as_mut_slice()),
        (Operator::Mul, _) => (k.mul_scalar)(a.values(), s, out.as_mut_slice()),
        (Operator::Div, false) => (k.div_scalar)(a.values(), s, out.as_mut_slice()),
        (Operator::Div, true) => (k.rdiv_scalar)(s, a.values(), out.as_mut_slice()),
        (Operator::Rem, false) => {
            for (o, &v) in out.as_mut_slice().iter_mut().zip(a.values()) {
                *o = v.rem_v(s);
            }
        }
        (Operator::Rem, true) => {
            for (o, &v) in out.as_mut_slice().iter_mut().zip(a.values()) {
                *o = s.rem_v(v);
            }
        }
        _ => return Err(Error::internal("non-arithmetic op in scalar kernel")),
    }
    Ok(PrimitiveArray::new(
        out.freeze(),
        a.validity().cloned(),
    ))
}

fn scalar_cmp_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    op: CmpOp,
    s: T,
) -> Result<PrimitiveArray<u8>> {
    let k = kernels::<T>();
    let mut out = vec![0u8; a.len()];
    (k.cmp_scalar)(op, a.values(), s, &mut out);
    Ok(PrimitiveArray::new(
        AlignedVec::from_slice(&out)?.freeze(),
        a.validity().cloned(),
    ))
}

macro_rules! per_numeric_scalar {
    ($col:expr, $scalar:expr, $f:ident ( $($args:expr),* )) => {
        match $col {
            Column::F64(a) => Column::F64($f(a $(, $args)*, $scalar.to_f64().unwrap_or(f64::NAN))?),
            Column::F32(a) => Column::F32($f(a $(, $args)*, $scalar.to_f64().unwrap_or(f64::NAN) as f32)?),
            Column::I64(a) => Column::I64($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0))?),
            Column::I32(a) => Column::I32($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0) as i32)?),
            Column::U64(a) => Column::U64($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0) as u64)?),
            Column::U32(a) => Column::U32($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0) as u32)?),
            Column::I8(a) => Column::I8($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0) as i8)?),
            Column::U8(a) => Column::U8($f(a $(, $args)*, $scalar.to_i64().unwrap_or(0) as u8)?),
            other => {
                return Err(Error::type_err(format!(
                    "scalar arithmetic is invalid for {}",
                    other.dtype()
                )))
            }
        }
    };
}

fn binary_with_scalar_value(
    col: &Column,
    op: Operator,
    scalar: &Scalar,
    scalar_on_left: bool,
) -> Result<Column> {
    // A null scalar poisons every row.
    if scalar.is_null() {
        let schema_dtype = if op.is_comparison() {
            DataType::Bool
        } else {
            col.dtype()
        };
        return Column::full(&Scalar::Null, col.len(), &schema_dtype);
    }

    // String comparisons against a literal.
    if matches!(col.dtype(), DataType::Str | DataType::Categorical) {
        let Some(pat) = scalar.as_str() else {
            return Err(Error::type_err(format!(
                "cannot apply '{}' to {} and {:?}",
                op.symbol(),
                col.dtype(),
                scalar
            )));
        };
        if !op.is_comparison() {
            return Err(Error::type_err(format!(
                "arithmetic '{}' is invalid for strings",
                op.symbol()
            )));
        }
        let mut b = PrimBuilder::<u8>::with_capacity(col.len())?;
        for i in 0..col.len() {
            match string_at(col, i) {
                Some(v) => {
                    let (l, r) = if scalar_on_left {
                        (pat.to_string(), v)
                    } else {
                        (v, pat.to_string())
                    };
                    let res = match op {
                        Operator::Eq => l == r,
                        Operator::NotEq => l != r,
                        Operator::Lt => l < r,
                        Operator::LtEq => l <= r,
                        Operator::Gt => l > r,
                        Operator::GtEq => l >= r,
                        _ => unreachable!(),
                    };
                    b.append_value(res as u8)?;
                }
                None => b.append_null()?,
            }
        }
        return Ok(Column::Bool(b.finish()?));
    }

    if op.is_comparison() {
        // Mixed numeric kinds unify through f64 for a literal comparison.
        let col_dtype = col.dtype();
        let target = if matches!(col_dtype, DataType::Bool) {
            DataType::U8
        } else if col_dtype.is_numeric()
            || matches!(col_dtype, DataType::Datetime(_) | DataType::Duration(_))
        {
            if col_dtype.is_float() || matches!(scalar, Scalar::F64(_) | Scalar::F32(_)) {
                DataType::F64
            } else {
                col_dtype.clone()
            }
        } else {
            return Err(Error::type_err(format!(
                "cannot compare {col_dtype} with {scalar:?}"
            )));
        };
        let unified = col.cast(&target, false)?;
        let cmp = if scalar_on_left {
            // s OP x  ==  x FLIP(OP) s
            match cmp_op(op) {
                CmpOp::Lt => CmpOp::Gt,
                CmpOp::Le => CmpOp::Ge,
                CmpOp::Gt => CmpOp::Lt,
                CmpOp::Ge => CmpOp::Le,
                other => other,
            }
        } else {
            cmp_op(op)
        };
        let f = scalar.to_f64().unwrap_or(f64::NAN);
        let i = scalar.to_i64().unwrap_or(0);
        let mask = match &unified {
            Column::F64(a) => scalar_cmp_prim(a, cmp, f)?,
            Column::F32(a) => scalar_cmp_prim(a, cmp, f as f32)?,
            Column::I64(a) => scalar_cmp_prim(a, cmp, i)?,
            Column::I32(a) => scalar_cmp_prim(a, cmp, i as i32)?,
            Column::U64(a) => scalar_cmp_prim(a, cmp, i as u64)?,
            Column::U32(a) => scalar_cmp_prim(a, cmp, i as u32)?,
            Column::I8(a) => scalar_cmp_prim(a, cmp, i as i8)?,
            Column::U8(a) => scalar_cmp_prim(a, cmp, i as u8)?,
            Column::Datetime(a, _) | Column::Duration(a, _) => scalar_cmp_prim(a, cmp, i)?,
            other => {
                return Err(Error::type_err(format!(
                    "cannot compare {} with {scalar:?}",
                    other.dtype()
                )))
            }
        };
        return Ok(Column::Bool(mask));
    }

    // Scalar arithmetic.
    let scalar_dtype = scalar.dtype().unwrap_or(DataType::F64);
    let target = unified_numeric(op, &col.dtype(), &scalar_dtype)?;
    let col = col.cast(&target, false)?;
    Ok(per_numeric_scalar!(
        &col,
        scalar,
        scalar_arith_prim(op, scalar_on_left)
    ))
}

// ---------------------------------------------------------------------------
// Window evaluation
// ---------------------------------------------------------------------------

fn eval_window(col: &Column, func: &WindowFunc) -> Result<Column> {
    use hekla::window;
    match func {
        WindowFunc::Lag(n, default) => {
            let d = default.as_ref().map(|l| l.to_scalar());
            window::shift(col, *n, d.as_ref())
        }
        WindowFunc::Lead(n, default) => {
            let d = default.as_ref().map(|l| l.to_scalar());
            window::shift(col, -n, d.as_ref())
        }
        WindowFunc::Diff(n) => window::diff(col, *n),
        WindowFunc::PctChange(n) => window::pct_change(col, *n),
        WindowFunc::CumSum => window::cum_sum(col),
        WindowFunc::CumMin => window::cum_min(col),
        WindowFunc::CumMax => window::cum_max(col),
        WindowFunc::RollingSum {
            window: w,
            min_periods,
        } => window::rolling_sum(col, *w, *min_periods),
        WindowFunc::RollingMean {
            window: w,
            min_periods,
        } => window::rolling_mean(col, *w, *min_periods),
        WindowFunc::RollingMin {
            window: w,
            min_periods,
        } => window::rolling_min(col, *w, *min_periods),
        WindowFunc::RollingMax {
            window: w,
            min_periods,
        } => window::rolling_max(col, *w, *min_periods),
        WindowFunc::RollingStd {
            window: w,
            min_periods,
        } => window::rolling_std(col, *w, *min_periods),
        WindowFunc::RowNumber => window::row_number(col.len()),
        WindowFunc::Rank => window::rank(col),
        WindowFunc::DenseRank => window::dense_rank(col),
    }
}

// ---------------------------------------------------------------------------
// String evaluation
// ---------------------------------------------------------------------------

fn eval_str_fn(col: &Column, func: &StrFunc) -> Result<Column> {
    let col = if matches!(col.dtype(), DataType::Categorical) {
        col.cast(&DataType::Str, false)?
    } else {
        col.clone()
    };
    let arr = col.str_array().ok_or_else(|| {
        Error::type_err(format!(
            "string function '{:?}' is invalid for {}",
            func,
            col.dtype()
        ))
    })?;
    match func {
        StrFunc::Len => {
            let mut b = PrimBuilder::<u32>::with_capacity(arr.len())?;
            for s in arr.iter() {
                b.append_option(s.map(|s| s.chars().count() as u32))?;
            }
            Ok(Column::U32(b.finish()?))
        }
        StrFunc::Contains(pat) => str_pred(arr, |s| s.contains(pat.as_ref())),
        StrFunc::StartsWith(pat) => str_pred(arr, |s| s.starts_with(pat.as_ref())),
        StrFunc::EndsWith(pat) => str_pred(arr, |s| s.ends_with(pat.as_ref())),
        StrFunc::Upper => str_map(arr, |s| s.to_uppercase()),
        StrFunc::Lower => str_map(arr, |s| s.to_lowercase()),
        StrFunc::Trim => str_map(arr, |s| s.trim().to_string()),
        StrFunc::Replace(from, to) => {
            str_map(arr, |s| s.replace(from.as_ref(), to.as_ref()))
        }
    }
}

fn str_pred(
    arr: &hekla::column::StrArray,
    f: impl Fn(&str) -> bool,
) -> Result<Column> {
    let mut b = PrimBuilder::<u8>::with_capacity(arr.len())?;
    for s in arr.iter() {
        b.append_option(s.map(|s| f(s) as u8))?;
    }
    Ok(Column::Bool(b.finish()?))
}

fn str_map(
    arr: &hekla::column::StrArray,
    f: impl Fn(&str) -> String,
) -> Result<Column> {
    let mut b = StrBuilder::with_capacity(arr.len())?;
    for s in arr.iter() {
        match s {
            Some(s) => b.append_value(&f(s))?,
            None => b.append_null()?,
        }
    }
    Ok(Column::Str(b.finish()?))
}

// ---------------------------------------------------------------------------
// List evaluation
// ---------------------------------------------------------------------------

fn eval_list_fn(col: &Column, func: &ListFunc) -> Result<Column> {
    let arr = col.list_array().ok_or_else(|| {
        Error::type_err(format!(
            "list function '{:?}' is invalid for {}",
            func,
            col.dtype()
        ))
    })?;
    match func {
        ListFunc::Len => {
            let mut b = PrimBuilder::<u32>::with_capacity(arr.len())?;
            for i in 0..arr.len() {
                if arr.is_valid(i) {
                    b.append_value(arr.list_len(i) as u32)?;
                } else {
                    b.append_null()?;
                }
            }
            Ok(Column::U32(b.finish()?))
        }
        ListFunc::Get(idx) => {
            let elem = arr.elem_dtype();
            let mut b = ColumnBuilder::with_capacity(&elem, arr.len())?;
            for i in 0..arr.len() {
                match arr.list_at(i) {
                    Some(list) if !list.is_empty() => {
                        let at = if *idx < 0 {
                            list.len() as i64 + idx
                        } else {
                            *idx
                        };
                        if at < 0 || at >= list.len() as i64 {
                            b.append_null()?;
                        } else {
                            b.append_scalar(&list.get(at as usize))?;
                        }
                    }
                    _ => b.append_null()?,
                }
            }
            b.finish()
        }
        ListFunc::Sum | ListFunc::Min | ListFunc::Max | ListFunc::Mean => {
            let kind = match func {
                ListFunc::Sum => AggKind::Sum,
                ListFunc::Min => AggKind::Min,
                ListFunc::Max => AggKind::Max,
                _ => AggKind::Mean,
            };
            let out_dtype = kind.output_dtype(&arr.elem_dtype());
            let mut b = ColumnBuilder::with_capacity(&out_dtype, arr.len())?;
            for i in 0..arr.len() {
                match arr.list_at(i) {
                    Some(list) if !list.is_empty() => {
                        let agg = aggregate_full(&list, &kind)?;
                        b.append_scalar(&agg.get(0))?;
                    }
                    _ => b.append_null()?,
                }
            }
            b.finish()
        }
        ListFunc::Explode => {
            // Empty and null lists emit a single null row, keeping the row.
            let elem = arr.elem_dtype();
            let mut b = ColumnBuilder::new(&elem)?;
            for i in 0..arr.len() {
                match arr.list_at(i) {
                    Some(list) if !list.is_empty() => {
                        for j in 0..list.len() {
                            b.append_scalar(&list.get(j))?;
                        }
                    }
                    _ => b.append_null()?,
                }
            }
            b.finish()
        }
    }
}
