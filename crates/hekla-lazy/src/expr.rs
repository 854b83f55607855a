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

//! The expression IR: a typed tree built by `col`/`lit` and fluent methods,
//! evaluated by the physical executor. Every node has a deterministic type
//! rule against an input schema, a canonical display form, and a structural
//! hash used for common-subexpression sharing and plan hashing.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hekla::frame::Schema;
use hekla::groupby::AggKind;
use hekla::{DataType, Error, Result, Scalar};

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Literal values in expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

impl Literal {
    pub fn dtype(&self) -> DataType {
        match self {
            // A bare null types as f64, the engine's NaN-null kind.
            Literal::Null => DataType::F64,
            Literal::Bool(_) => DataType::Bool,
            Literal::Int(_) => DataType::I64,
            Literal::Float(_) => DataType::F64,
            Literal::Str(_) => DataType::Str,
        }
    }

    pub fn to_scalar(&self) -> Scalar {
        match self {
            Literal::Null => Scalar::Null,
            Literal::Bool(v) => Scalar::Bool(*v),
            Literal::Int(v) => Scalar::I64(*v),
            Literal::Float(v) => Scalar::F64(*v),
            Literal::Str(s) => Scalar::Str(s.clone()),
        }
    }
}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Null => {}
            Literal::Bool(v) => v.hash(state),
            Literal::Int(v) => v.hash(state),
            Literal::Float(v) => v.to_bits().hash(state),
            Literal::Str(s) => s.hash(state),
        }
    }
}

macro_rules! impl_into_literal {
    ($($t:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$t> for Literal {
                fn from(v: $t) -> Literal {
                    Literal::$variant(v as $conv)
                }
            }
        )*
    };
}

impl_into_literal!(
    i64 => Int as i64,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float as f64,
    f32 => Float as f64,
);

impl From<bool> for Literal {
    fn from(v: bool) -> Literal {
        Literal::Bool(v)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Literal {
        Literal::Str(Arc::from(s))
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Literal {
        Literal::Str(Arc::from(s.as_str()))
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators and function namespaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::NotEq | Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "&",
            Operator::Or => "|",
        }
    }
}

/// Window and cumulative functions.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunc {
    Lag(i64, Option<Literal>),
    Lead(i64, Option<Literal>),
    Diff(i64),
    PctChange(i64),
    CumSum,
    CumMin,
    CumMax,
    RollingSum { window: usize, min_periods: usize },
    RollingMean { window: usize, min_periods: usize },
    RollingMin { window: usize, min_periods: usize },
    RollingMax { window: usize, min_periods: usize },
    RollingStd { window: usize, min_periods: usize },
    RowNumber,
    Rank,
    DenseRank,
}

impl WindowFunc {
    fn name(&self) -> &'static str {
        match self {
            WindowFunc::Lag(..) => "lag",
            WindowFunc::Lead(..) => "lead",
            WindowFunc::Diff(_) => "diff",
            WindowFunc::PctChange(_) => "pct_change",
            WindowFunc::CumSum => "cum_sum",
            WindowFunc::CumMin => "cum_min",
            WindowFunc::CumMax => "cum_max",
            WindowFunc::RollingSum { .. } => "rolling_sum",
            WindowFunc::RollingMean { .. } => "rolling_mean",
            WindowFunc::RollingMin { .. } => "rolling_min",
            WindowFunc::RollingMax { .. } => "rolling_max",
            WindowFunc::RollingStd { .. } => "rolling_std",
            WindowFunc::RowNumber => "row_number",
            WindowFunc::Rank => "rank",
            WindowFunc::DenseRank => "dense_rank",
        }
    }
}

/// String namespace functions.
#[derive(Debug, Clone, PartialEq)]
pub enum StrFunc {
    Upper,
    Lower,
    Trim,
    Len,
    Contains(Arc<str>),
    StartsWith(Arc<str>),
    EndsWith(Arc<str>),
    Replace(Arc<str>, Arc<str>),
}

impl StrFunc {
    fn name(&self) -> &'static str {
        match self {
            StrFunc::Upper => "upper",
            StrFunc::Lower => "lower",
            StrFunc::Trim => "trim",
            StrFunc::Len => "len",
            StrFunc::Contains(_) => "contains",
            StrFunc::StartsWith(_) => "starts_with",
            StrFunc::EndsWith(_) => "ends_with",
            StrFunc::Replace(..) => "replace",
        }
    }
}

/// List namespace functions.
#[derive(Debug, Clone, PartialEq)]
pub enum ListFunc {
    Get(i64),
    Len,
    Sum,
    Mean,
    Min,
    Max,
    Explode,
}

impl ListFunc {
    fn name(&self) -> &'static str {
        match self {
            ListFunc::Get(_) => "get",
            ListFunc::Len => "len",
            ListFunc::Sum => "sum",
            ListFunc::Mean => "mean",
            ListFunc::Min => "min",
            ListFunc::Max => "max",
            ListFunc::Explode => "explode",
        }
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(Arc<str>),
    Literal(Literal),
    Binary {
        left: Arc<Expr>,
        op: Operator,
        right: Arc<Expr>,
    },
    Not(Arc<Expr>),
    IsNull(Arc<Expr>),
    IsNotNull(Arc<Expr>),
    FillNull {
        expr: Arc<Expr>,
        value: Arc<Expr>,
    },
    Coalesce(Vec<Expr>),
    Cast {
        expr: Arc<Expr>,
        dtype: DataType,
        allow_lossy: bool,
    },
    Alias(Arc<Expr>, Arc<str>),
    Agg {
        input: Arc<Expr>,
        kind: AggKind,
    },
    Window {
        input: Arc<Expr>,
        func: WindowFunc,
    },
    StrFn {
        input: Arc<Expr>,
        func: StrFunc,
    },
    ListFn {
        input: Arc<Expr>,
        func: ListFunc,
    },
    Field {
        input: Arc<Expr>,
        name: Arc<str>,
    },
    Ternary {
        cond: Arc<Expr>,
        then: Arc<Expr>,
        otherwise: Arc<Expr>,
    },
}

/// Reference a column by name.
pub fn col(name: &str) -> Expr {
    Expr::Column(Arc::from(name))
}

/// A literal value.
pub fn lit(value: impl Into<Literal>) -> Expr {
    Expr::Literal(value.into())
}

/// Start a conditional: `when(cond).then(a).otherwise(b)`.
pub fn when(cond: Expr) -> When {
    When { cond }
}

pub struct When {
    cond: Expr,
}

impl When {
    pub fn then(self, expr: Expr) -> WhenThen {
        WhenThen {
            cond: self.cond,
            then: expr,
        }
    }
}

pub struct WhenThen {
    cond: Expr,
    then: Expr,
}

impl WhenThen {
    pub fn otherwise(self, expr: Expr) -> Expr {
        Expr::Ternary {
            cond: Arc::new(self.cond),
            then: Arc::new(self.then),
            otherwise: Arc::new(expr),
        }
    }
}

macro_rules! binary_method {
    ($name:ident, $op:ident) => {
        pub fn $name(self, other: Expr) -> Expr {
            Expr::Binary {
                left: Arc::new(self),
                op: Operator::$op,
                right: Arc::new(other),
            }
        }
    };
}

macro_rules! agg_method {
    ($name:ident, $kind:expr) => {
        pub fn $name(self) -> Expr {
            Expr::Agg {
                input: Arc::new(self),
                kind: $kind,
            }
        }
    };
}

macro_rules! window_method {
    ($name:ident, $func:expr) => {
        pub fn $name(self) -> Expr {
            Expr::Window {
                input: Arc::new(self),
                func: $func,
            }
        }
    };
}

macro_rules! rolling_method {
    ($name:ident, $variant:ident) => {
        pub fn $name(self, window: usize, min_periods: usize) -> Expr {
            Expr::Window {
                input: Arc::new(self),
                func: WindowFunc::$variant {
                    window,
                    min_periods,
                },
            }
        }
    };
}

impl Expr {
    binary_method!(eq, Eq);
    binary_method!(neq, NotEq);
    binary_method!(lt, Lt);
    binary_method!(lt_eq, LtEq);
    binary_method!(gt, Gt);
    binary_method!(gt_eq, GtEq);
    binary_method!(and, And);
    binary_method!(or, Or);

    agg_method!(sum, AggKind::Sum);
    agg_method!(min, AggKind::Min);
    agg_method!(max, AggKind::Max);
    agg_method!(mean, AggKind::Mean);
    agg_method!(count, AggKind::Count);
    agg_method!(first, AggKind::First);
    agg_method!(last, AggKind::Last);
    agg_method!(std, AggKind::Std);
    agg_method!(var, AggKind::Var);
    agg_method!(median, AggKind::Median);
    agg_method!(skew, AggKind::Skew);
    agg_method!(kurtosis, AggKind::Kurtosis);

    pub fn quantile(self, q: f64) -> Expr {
        Expr::Agg {
            input: Arc::new(self),
            kind: AggKind::Quantile(q),
        }
    }

    pub fn lag(self, offset: i64, default: Option<Literal>) -> Expr {
        Expr::Window {
            input: Arc::new(self),
            func: WindowFunc::Lag(offset, default),
        }
    }

    pub fn lead(self, offset: i64, default: Option<Literal>) -> Expr {
        Expr::Window {
            input: Arc::new(self),
            func: WindowFunc::Lead(offset, default),
        }
    }

    pub fn diff(self, n: i64) -> Expr {
        Expr::Window {
            input: Arc::new(self),
            func: WindowFunc::Diff(n),
        }
    }

    pub fn pct_change(self, n: i64) -> Expr {
        Expr::Window {
            input: Arc::new(self),
            func: WindowFunc::PctChange(n),
        }
    }

    window_method!(cum_sum, WindowFunc::CumSum);
    window_method!(cum_min, WindowFunc::CumMin);
    window_method!(cum_max, WindowFunc::CumMax);
    window_method!(row_number, WindowFunc::RowNumber);
    window_method!(rank, WindowFunc::Rank);
    window_method!(dense_rank, WindowFunc::DenseRank);

    rolling_method!(rolling_sum, RollingSum);
    rolling_method!(rolling_mean, RollingMean);
    rolling_method!(rolling_min, RollingMin);
    rolling_method!(rolling_max, RollingMax);
    rolling_method!(rolling_std, RollingStd);

    pub fn alias(self, name: &str) -> Expr {
        Expr::Alias(Arc::new(self), Arc::from(name))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Arc::new(self))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(Arc::new(self))
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(Arc::new(self))
    }

    pub fn fill_null(self, value: impl Into<Literal>) -> Expr {
        Expr::FillNull {
            expr: Arc::new(self),
            value: Arc::new(Expr::Literal(value.into())),
        }
    }

    /// First non-null across `self` and `others`, left to right.
    pub fn coalesce(self, others: Vec<Expr>) -> Expr {
        let mut all = vec![self];
        all.extend(others);
        Expr::Coalesce(all)
    }

    pub fn cast(self, dtype: DataType) -> Expr {
        Expr::Cast {
            expr: Arc::new(self),
            dtype,
            allow_lossy: false,
        }
    }

    pub fn cast_lossy(self, dtype: DataType) -> Expr {
        Expr::Cast {
            expr: Arc::new(self),
            dtype,
            allow_lossy: true,
        }
    }

    /// Struct field access.
    pub fn field(self, name: &str) -> Expr {
        Expr::Field {
            input: Arc::new(self),
            name: Arc::from(name),
        }
    }

    /// String namespace.
    pub fn str(self) -> StrNameSpace {
        StrNameSpace { inner: self }
    }

    /// List namespace.
    pub fn list(self) -> ListNameSpace {
        ListNameSpace { inner: self }
    }

    // ---- Introspection ---------------------------------------------------

    /// Name the output column takes without an alias.
    pub fn output_name(&self) -> Result<Arc<str>> {
        match self {
            Expr::Column(name) => Ok(name.clone()),
            Expr::Alias(_, name) => Ok(name.clone()),
            Expr::Literal(_) => Ok(Arc::from("literal")),
            Expr::Binary { left, .. } => left.output_name(),
            Expr::Not(e)
            | Expr::IsNull(e)
            | Expr::IsNotNull(e) => e.output_name(),
            Expr::FillNull { expr, .. } => expr.output_name(),
            Expr::Coalesce(exprs) => exprs
                .first()
                .ok_or_else(|| Error::schema("coalesce of zero expressions"))?
                .output_name(),
            Expr::Cast { expr, .. } => expr.output_name(),
            Expr::Agg { input, .. } => input.output_name(),
            Expr::Window { input, .. } => input.output_name(),
            Expr::StrFn { input, .. } => input.output_name(),
            Expr::ListFn { input, .. } => input.output_name(),
            Expr::Field { name, .. } => Ok(name.clone()),
            Expr::Ternary { then, .. } => then.output_name(),
        }
    }

    /// Column names this expression reads.
    pub fn collect_columns(&self, out: &mut HashSet<String>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.to_string());
            }
            Expr::Literal(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.collect_columns(out),
            Expr::FillNull { expr, value } => {
                expr.collect_columns(out);
                value.collect_columns(out);
            }
            Expr::Coalesce(exprs) => {
                for e in exprs {
                    e.collect_columns(out);
                }
            }
            Expr::Cast { expr, .. } => expr.collect_columns(out),
            Expr::Alias(e, _) => e.collect_columns(out),
            Expr::Agg { input, .. }
            | Expr::Window { input, .. }
            | Expr::StrFn { input, .. }
            | Expr::ListFn { input, .. }
            | Expr::Field { input, .. } => input.collect_columns(out),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_columns(out);
                then.collect_columns(out);
                otherwise.collect_columns(out);
            }
        }
    }

    /// True when the node tree contains an aggregation.
    pub fn has_agg(&self) -> bool {
        self.any_node(&|e| matches!(e, Expr::Agg { .. }))
    }

    /// True when the node tree contains a window or cumulative function.
    pub fn has_window(&self) -> bool {
        self.any_node(&|e| matches!(e, Expr::Window { .. }))
    }

    /// Row-local: output row `i` depends only on input row `i`. Such
    /// expressions stream batch by batch.
    pub fn is_elementwise(&self) -> bool {
        !self.has_agg() && !self.has_window() && !self.any_node(&|e| {
            matches!(
                e,
                Expr::ListFn {
                    func: ListFunc::Explode,
                    ..
                }
            )
        })
    }

    fn any_node(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Expr::Column(_) | Expr::Literal(_) => false,
            Expr::Binary { left, right, .. } => left.any_node(pred) || right.any_node(pred),
            Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.any_node(pred),
            Expr::FillNull { expr, value } => expr.any_node(pred) || value.any_node(pred),
            Expr::Coalesce(exprs) => exprs.iter().any(|e| e.any_node(pred)),
            Expr::Cast { expr, .. } => expr.any_node(pred),
            Expr::Alias(e, _) => e.any_node(pred),
            Expr::Agg { input, .. }
            | Expr::Window { input, .. }
            | Expr::StrFn { input, .. }
            | Expr::ListFn { input, .. }
            | Expr::Field { input, .. } => input.any_node(pred),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => cond.any_node(pred) || then.any_node(pred) || otherwise.any_node(pred),
        }
    }

    /// Structural hash for CSE and plan hashing.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_node(&mut hasher);
        hasher.finish()
    }

    fn hash_node<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Expr::Column(name) => name.hash(state),
            Expr::Literal(v) => v.hash(state),
            Expr::Binary { left, op, right } => {
                left.hash_node(state);
                op.hash(state);
                right.hash_node(state);
            }
            Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.hash_node(state),
            Expr::FillNull { expr, value } => {
                expr.hash_node(state);
                value.hash_node(state);
            }
            Expr::Coalesce(exprs) => {
                exprs.len().hash(state);
                for e in exprs {
                    e.hash_node(state);
                }
            }
            Expr::Cast {
                expr,
                dtype,
                allow_lossy,
            } => {
                expr.hash_node(state);
                dtype.hash(state);
                allow_lossy.hash(state);
            }
            Expr::Alias(e, name) => {
                e.hash_node(state);
                name.hash(state);
            }
            Expr::Agg { input, kind } => {
                input.hash_node(state);
                match kind {
                    AggKind::Quantile(q) => {
                        255u8.hash(state);
                        q.to_bits().hash(state);
                    }
                    other => format!("{other:?}").hash(state),
                }
            }
            Expr::Window { input, func } => {
                input.hash_node(state);
                format!("{func:?}").hash(state);
            }
            Expr::StrFn { input, func } => {
                input.hash_node(state);
                format!("{func:?}").hash(state);
            }
            Expr::ListFn { input, func } => {
                input.hash_node(state);
                format!("{func:?}").hash(state);
            }
            Expr::Field { input, name } => {
                input.hash_node(state);
                name.hash(state);
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.hash_node(state);
                then.hash_node(state);
                otherwise.hash_node(state);
            }
        }
    }

    // ---- Type inference --------------------------------------------------

    /// Output type against `schema`.
    pub fn dtype(&self, schema: &Schema) -> Result<DataType> {
        match self {
            Expr::Column(name) => schema.dtype(name).cloned(),
            Expr::Literal(v) => Ok(v.dtype()),
            Expr::Binary { left, op, right } => {
                let lt = left.dtype(schema)?;
                let rt = right.dtype(schema)?;
                if op.is_comparison() {
                    check_comparable(&lt, &rt)?;
                    return Ok(DataType::Bool);
                }
                if op.is_logical() {
                    if lt != DataType::Bool || rt != DataType::Bool {
                        return Err(Error::type_err(format!(
                            "logical '{}' requires bool operands, got {lt} and {rt}",
                            op.symbol()
                        )));
                    }
                    return Ok(DataType::Bool);
                }
                arithmetic_type(*op, &lt, &rt)
            }
            Expr::Not(e) => {
                let t = e.dtype(schema)?;
                if t != DataType::Bool {
                    return Err(Error::type_err(format!("'not' requires bool, got {t}")));
                }
                Ok(DataType::Bool)
            }
            Expr::IsNull(e) | Expr::IsNotNull(e) => {
                e.dtype(schema)?;
                Ok(DataType::Bool)
            }
            Expr::FillNull { expr, .. } => expr.dtype(schema),
            Expr::Coalesce(exprs) => {
                let mut out: Option<DataType> = None;
                for e in exprs {
                    let t = e.dtype(schema)?;
                    out = Some(match out {
                        None => t,
                        Some(cur) => super_type(&cur, &t).ok_or_else(|| {
                            Error::type_err(format!(
                                "coalesce mixes incompatible types {cur} and {t}"
                            ))
                        })?,
                    });
                }
                out.ok_or_else(|| Error::schema("coalesce of zero expressions"))
            }
            Expr::Cast { dtype, .. } => Ok(dtype.clone()),
            Expr::Alias(e, _) => e.dtype(schema),
            Expr::Agg { input, kind } => {
                let t = input.dtype(schema)?;
                Ok(kind.output_dtype(&t))
            }
            Expr::Window { input, func } => {
                let t = input.dtype(schema)?;
                Ok(match func {
                    WindowFunc::Lag(..)
                    | WindowFunc::Lead(..)
                    | WindowFunc::Diff(_)
                    | WindowFunc::CumMin
                    | WindowFunc::CumMax
                    | WindowFunc::RollingSum { .. }
                    | WindowFunc::RollingMin { .. }
                    | WindowFunc::RollingMax { .. } => t,
                    WindowFunc::CumSum => match t {
                        DataType::I32 | DataType::I8 => DataType::I64,
                        DataType::U32 | DataType::U8 => DataType::U64,
                        other => other,
                    },
                    WindowFunc::PctChange(_)
                    | WindowFunc::RollingMean { .. }
                    | WindowFunc::RollingStd { .. } => DataType::F64,
                    WindowFunc::RowNumber | WindowFunc::Rank | WindowFunc::DenseRank => {
                        DataType::U32
                    }
                })
            }
            Expr::StrFn { input, func } => {
                let t = input.dtype(schema)?;
                if !matches!(t, DataType::Str | DataType::Categorical) {
                    return Err(Error::type_err(format!(
                        "string function '{}' is invalid for {t}",
                        func.name()
                    )));
                }
                Ok(match func {
                    StrFunc::Len => DataType::U32,
                    StrFunc::Contains(_) | StrFunc::StartsWith(_) | StrFunc::EndsWith(_) => {
                        DataType::Bool
                    }
                    _ => DataType::Str,
                })
            }
            Expr::ListFn { input, func } => {
                let t = input.dtype(schema)?;
                let DataType::List(elem) = t else {
                    return Err(Error::type_err(format!(
                        "list function '{}' is invalid for {t}",
                        func.name()
                    )));
                };
                Ok(match func {
                    ListFunc::Get(_) | ListFunc::Explode => *elem,
                    ListFunc::Len => DataType::U32,
                    ListFunc::Sum | ListFunc::Min | ListFunc::Max => *elem,
                    ListFunc::Mean => DataType::F64,
                })
            }
            Expr::Field { input, name } => {
                let t = input.dtype(schema)?;
                let DataType::Struct(fields) = t else {
                    return Err(Error::type_err(format!(
                        "field access '{name}' is invalid for {t}"
                    )));
                };
                fields
                    .iter()
                    .find(|f| f.name.as_str() == name.as_ref())
                    .map(|f| f.dtype.clone())
                    .ok_or_else(|| Error::schema(format!("struct field '{name}' not found")))
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let ct = cond.dtype(schema)?;
                if ct != DataType::Bool {
                    return Err(Error::type_err(format!(
                        "when() condition must be bool, got {ct}"
                    )));
                }
                let tt = then.dtype(schema)?;
                let ot = otherwise.dtype(schema)?;
                super_type(&tt, &ot).ok_or_else(|| {
                    Error::type_err(format!(
                        "when/then/otherwise mixes incompatible types {tt} and {ot}"
                    ))
                })
            }
        }
    }
}

/// Arithmetic result type: any f64 wins, integer division yields f64,
/// mixed integer widths widen to the wider signed kind.
fn arithmetic_type(op: Operator, lt: &DataType, rt: &DataType) -> Result<DataType> {
    if !lt.is_numeric() || !rt.is_numeric() {
        return Err(Error::type_err(format!(
            "arithmetic '{}' is invalid for {lt} and {rt}",
            op.symbol()
        )));
    }
    if op == Operator::Div {
        return Ok(DataType::F64);
    }
    if lt.is_float() || rt.is_float() {
        return Ok(DataType::F64);
    }
    // Both integers: widen to the wider kind; mixed signedness goes signed.
    let width = |t: &DataType| t.prim_kind().map_or(8, |k| k.width());
    let signed = |t: &DataType| t.prim_kind().is_some_and(|k| k.is_signed());
    let w = width(lt).max(width(rt));
    Ok(match (w, signed(lt) || signed(rt)) {
        (8, false) => DataType::U64,
        (8, true) => DataType::I64,
        (4, false) => DataType::U32,
        (4, true) => DataType::I32,
        (_, false) => DataType::U8,
        (_, true) => DataType::I8,
    })
}

fn check_comparable(lt: &DataType, rt: &DataType) -> Result<()> {
    let ok = lt == rt
        || (lt.is_numeric() && rt.is_numeric())
        || matches!(
            (lt, rt),
            (DataType::Str, DataType::Categorical) | (DataType::Categorical, DataType::Str)
        );
    if ok {
        Ok(())
    } else {
        Err(Error::type_err(format!(
            "cannot compare {lt} with {rt}"
        )))
    }
}

/// Common result type of two branches.
pub fn super_type(a: &DataType, b: &DataType) -> Option<DataType> {
    if a == b {
        return Some(a.clone());
    }
    if a.is_numeric() && b.is_numeric() {
        if a.is_float() || b.is_float() {
            return Some(DataType::F64);
        }
        return Some(DataType::I64);
    }
    None
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

pub struct StrNameSpace {
    inner: Expr,
}

impl StrNameSpace {
    fn wrap(self, func: StrFunc) -> Expr {
        Expr::StrFn {
            input: Arc::new(self.inner),
            func,
        }
    }

    pub fn upper(self) -> Expr {
        self.wrap(StrFunc::Upper)
    }

    pub fn lower(self) -> Expr {
        self.wrap(StrFunc::Lower)
    }

    pub fn trim(self) -> Expr {
        self.wrap(StrFunc::Trim)
    }

    pub fn len(self) -> Expr {
        self.wrap(StrFunc::Len)
    }

    pub fn contains(self, pat: &str) -> Expr {
        self.wrap(StrFunc::Contains(Arc::from(pat)))
    }

    pub fn starts_with(self, pat: &str) -> Expr {
        self.wrap(StrFunc::StartsWith(Arc::from(pat)))
    }

    pub fn ends_with(self, pat: &str) -> Expr {
        self.wrap(StrFunc::EndsWith(Arc::from(pat)))
    }

    pub fn replace(self, from: &str, to: &str) -> Expr {
        self.wrap(StrFunc::Replace(Arc::from(from), Arc::from(to)))
    }
}

pub struct ListNameSpace {
    inner: Expr,
}

impl ListNameSpace {
    fn wrap(self, func: ListFunc) -> Expr {
        Expr::ListFn {
            input: Arc::new(self.inner),
            func,
        }
    }

    pub fn get(self, i: i64) -> Expr {
        self.wrap(ListFunc::Get(i))
    }

    pub fn len(self) -> Expr {
        self.wrap(ListFunc::Len)
    }

    pub fn sum(self) -> Expr {
        self.wrap(ListFunc::Sum)
    }

    pub fn mean(self) -> Expr {
        self.wrap(ListFunc::Mean)
    }

    pub fn min(self) -> Expr {
        self.wrap(ListFunc::Min)
    }

    pub fn max(self) -> Expr {
        self.wrap(ListFunc::Max)
    }

    pub fn explode(self) -> Expr {
        self.wrap(ListFunc::Explode)
    }
}

// ---------------------------------------------------------------------------
// Operator overloads
// ---------------------------------------------------------------------------

macro_rules! impl_expr_op {
    ($trait:ident, $method:ident, $op:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary {
                    left: Arc::new(self),
                    op: Operator::$op,
                    right: Arc::new(rhs),
                }
            }
        }
    };
}

impl_expr_op!(Add, add, Add);
impl_expr_op!(Sub, sub, Sub);
impl_expr_op!(Mul, mul, Mul);
impl_expr_op!(Div, div, Div);
impl_expr_op!(Rem, rem, Rem);

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "col({name})"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Binary { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Not(e) => write!(f, "not({e})"),
            Expr::IsNull(e) => write!(f, "{e}.is_null()"),
            Expr::IsNotNull(e) => write!(f, "{e}.is_not_null()"),
            Expr::FillNull { expr, value } => write!(f, "{expr}.fill_null({value})"),
            Expr::Coalesce(exprs) => {
                f.write_str("coalesce(")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            Expr::Cast { expr, dtype, .. } => write!(f, "{expr}.cast({dtype})"),
            Expr::Alias(e, name) => write!(f, "{e}.alias({name})"),
            Expr::Agg { input, kind } => write!(f, "{input}.{kind:?}()"),
            Expr::Window { input, func } => write!(f, "{input}.{}()", func.name()),
            Expr::StrFn { input, func } => write!(f, "{input}.str.{}()", func.name()),
            Expr::ListFn { input, func } => write!(f, "{input}.list.{}()", func.name()),
            Expr::Field { input, name } => write!(f, "{input}.field({name})"),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => write!(f, "when({cond}).then({then}).otherwise({otherwise})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hekla::column::Field;

    fn schema() -> Schema {
        Schema(vec![
            Field::new("a", DataType::I64),
            Field::new("b", DataType::F64),
            Field::new("s", DataType::Str),
        ])
    }

    #[test]
    fn widening_rules() {
        let s = schema();
        assert_eq!((col("a") + col("a")).dtype(&s).unwrap(), DataType::I64);
        assert_eq!((col("a") + col("b")).dtype(&s).unwrap(), DataType::F64);
        assert_eq!((col("a") / col("a")).dtype(&s).unwrap(), DataType::F64);
        assert_eq!(col("a").gt(lit(0)).dtype(&s).unwrap(), DataType::Bool);
    }

    #[test]
    fn invalid_ops_reject() {
        let s = schema();
        assert!((col("s") + col("a")).dtype(&s).is_err());
        assert!(col("a").str().upper().dtype(&s).is_err());
        assert!(col("missing").dtype(&s).is_err());
    }

    #[test]
    fn structural_hash_equality() {
        let a = (col("x") + lit(1)).alias("y");
        let b = (col("x") + lit(1)).alias("y");
        let c = (col("x") + lit(2)).alias("y");
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert_ne!(a.structural_hash(), c.structural_hash());
    }

    #[test]
    fn output_names() {
        assert_eq!(&*col("v").sum().output_name().unwrap(), "v");
        assert_eq!(&*(col("v") + lit(1)).output_name().unwrap(), "v");
        assert_eq!(&*col("v").alias("z").output_name().unwrap(), "z");
    }
}
