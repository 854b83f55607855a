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

//! The logical plan tree. Plans are immutable: optimizer passes rebuild the
//! nodes they change and share the rest through `Arc`.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use hekla::column::Field;
use hekla::frame::Schema;
use hekla::groupby::AggKind;
use hekla::join::JoinHow;
use hekla::{Column, Error, Frame, Result};

use crate::expr::Expr;
use crate::pipeline::BatchSource;

/// A user function applied to one column; output length must match input.
pub type UdfFunc = dyn Fn(&Column) -> Result<Column> + Send + Sync;

/// Where a scan pulls rows from.
#[derive(Clone)]
pub enum ScanSource {
    /// In-memory frame, re-sliced into batches on every execution.
    Frame(Arc<Frame>),
    /// External single-shot batch source.
    Source(Arc<Mutex<Box<dyn BatchSource + Send>>>),
}

impl ScanSource {
    pub fn schema(&self) -> Result<Schema> {
        match self {
            ScanSource::Frame(f) => Ok(f.schema()),
            ScanSource::Source(s) => Ok(s
                .lock()
                .map_err(|_| Error::internal("batch source lock poisoned"))?
                .schema()),
        }
    }

    /// Row count when known (in-memory frames only).
    pub fn known_rows(&self) -> Option<usize> {
        match self {
            ScanSource::Frame(f) => Some(f.nrows()),
            ScanSource::Source(_) => None,
        }
    }

    fn identity(&self) -> usize {
        match self {
            ScanSource::Frame(f) => Arc::as_ptr(f) as usize,
            ScanSource::Source(s) => Arc::as_ptr(s) as *const () as usize,
        }
    }
}

/// Logical plan nodes.
#[derive(Clone)]
pub enum LogicalPlan {
    Scan {
        source: ScanSource,
        projection: Option<Vec<String>>,
        predicate: Option<Expr>,
        limit: Option<usize>,
    },
    Filter {
        input: Arc<LogicalPlan>,
        predicate: Expr,
    },
    Project {
        input: Arc<LogicalPlan>,
        exprs: Vec<Expr>,
    },
    WithColumn {
        input: Arc<LogicalPlan>,
        name: String,
        expr: Expr,
    },
    Sort {
        input: Arc<LogicalPlan>,
        by: Vec<String>,
        descending: Vec<bool>,
        /// Bound pushed down from a `Limit` above: partial top-K sort.
        top_k: Option<usize>,
    },
    /// First `n` rows in order; `head` builds the same node.
    Limit {
        input: Arc<LogicalPlan>,
        n: usize,
    },
    Aggregate {
        input: Arc<LogicalPlan>,
        keys: Vec<Expr>,
        aggs: Vec<Expr>,
        /// Sort the output by key instead of first-seen order.
        sorted_keys: bool,
    },
    Join {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        how: JoinHow,
        left_on: Vec<String>,
        right_on: Vec<String>,
        suffix: String,
    },
    Pivot {
        input: Arc<LogicalPlan>,
        index: String,
        column: String,
        values: String,
        agg: AggKind,
    },
    Melt {
        input: Arc<LogicalPlan>,
        id_vars: Vec<String>,
        value_vars: Vec<String>,
        var_name: String,
        value_name: String,
    },
    /// Materialize once, serve every consumer from the materialization.
    Cache {
        input: Arc<LogicalPlan>,
    },
    /// User function over one column. Opaque: a CSE and pushdown barrier.
    Udf {
        input: Arc<LogicalPlan>,
        column: String,
        func: Arc<UdfFunc>,
        fn_id: usize,
    },
}

impl LogicalPlan {
    /// Output schema. Pivot output columns depend on the data; its static
    /// schema carries the index column only.
    pub fn schema(&self) -> Result<Schema> {
        match self {
            LogicalPlan::Scan {
                source, projection, ..
            } => {
                let schema = source.schema()?;
                match projection {
                    None => Ok(schema),
                    Some(names) => {
                        let mut fields = Vec::with_capacity(names.len());
                        for name in names {
                            fields.push(Field::new(name.clone(), schema.dtype(name)?.clone()));
                        }
                        Ok(Schema(fields))
                    }
                }
            }
            LogicalPlan::Filter { input, .. } | LogicalPlan::Limit { input, .. } => input.schema(),
            LogicalPlan::Sort { input, .. } => input.schema(),
            LogicalPlan::Project { input, exprs } => {
                let schema = input.schema()?;
                let mut fields = Vec::with_capacity(exprs.len());
                for e in exprs {
                    fields.push(Field::new(
                        e.output_name()?.to_string(),
                        e.dtype(&schema)?,
                    ));
                }
                Ok(Schema(fields))
            }
            LogicalPlan::WithColumn { input, name, expr } => {
                let schema = input.schema()?;
                let dtype = expr.dtype(&schema)?;
                let mut fields = schema.0;
                match fields.iter_mut().find(|f| &f.name == name) {
                    Some(f) => f.dtype = dtype,
                    None => fields.push(Field::new(name.clone(), dtype)),
                }
                Ok(Schema(fields))
            }
            LogicalPlan::Aggregate {
                input, keys, aggs, ..
            } => {
                let schema = input.schema()?;
                let mut fields = Vec::with_capacity(keys.len() + aggs.len());
                for k in keys {
                    fields.push(Field::new(k.output_name()?.to_string(), k.dtype(&schema)?));
                }
                for a in aggs {
                    fields.push(Field::new(a.output_name()?.to_string(), a.dtype(&schema)?));
                }
                Ok(Schema(fields))
            }
            LogicalPlan::Join {
                left,
                right,
                left_on: _,
                right_on,
                suffix,
                ..
            } => {
                let ls = left.schema()?;
                let rs = right.schema()?;
                let mut fields = ls.0.clone();
                for f in &rs.0 {
                    if right_on.contains(&f.name) {
                        continue;
                    }
                    let name = if fields.iter().any(|l| l.name == f.name) {
                        format!("{}{suffix}", f.name)
                    } else {
                        f.name.clone()
                    };
                    fields.push(Field::new(name, f.dtype.clone()));
                }
                Ok(Schema(fields))
            }
            LogicalPlan::Pivot { input, index, .. } => {
                let schema = input.schema()?;
                Ok(Schema(vec![Field::new(
                    index.clone(),
                    schema.dtype(index)?.clone(),
                )]))
            }
            LogicalPlan::Melt {
                input,
                id_vars,
                value_vars,
                var_name,
                value_name,
            } => {
                let schema = input.schema()?;
                let mut fields = Vec::new();
                for name in id_vars {
                    fields.push(Field::new(name.clone(), schema.dtype(name)?.clone()));
                }
                fields.push(Field::new(var_name.clone(), hekla::DataType::Str));
                let mut value_dtype: Option<hekla::DataType> = None;
                for name in value_vars {
                    let t = schema.dtype(name)?.clone();
                    value_dtype = Some(match value_dtype {
                        None => t,
                        Some(cur) => crate::expr::super_type(&cur, &t).ok_or_else(|| {
                            Error::type_err(format!(
                                "melt value columns mix incompatible types {cur} and {t}"
                            ))
                        })?,
                    });
                }
                fields.push(Field::new(
                    value_name.clone(),
                    value_dtype.ok_or_else(|| Error::schema("melt requires value columns"))?,
                ));
                Ok(Schema(fields))
            }
            LogicalPlan::Cache { input } => input.schema(),
            LogicalPlan::Udf { input, .. } => input.schema(),
        }
    }

    /// Child plans, for generic traversal.
    pub fn inputs(&self) -> Vec<&Arc<LogicalPlan>> {
        match self {
            LogicalPlan::Scan { .. } => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::WithColumn { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Pivot { input, .. }
            | LogicalPlan::Melt { input, .. }
            | LogicalPlan::Cache { input }
            | LogicalPlan::Udf { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Structural hash; in-memory sources hash by identity, UDFs by
    /// registration id.
    pub fn plan_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_node(&mut hasher);
        hasher.finish()
    }

    fn hash_node<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LogicalPlan::Scan {
                source,
                projection,
                predicate,
                limit,
            } => {
                source.identity().hash(state);
                projection.hash(state);
                if let Some(p) = predicate {
                    p.structural_hash().hash(state);
                }
                limit.hash(state);
            }
            LogicalPlan::Filter { input, predicate } => {
                input.hash_node(state);
                predicate.structural_hash().hash(state);
            }
            LogicalPlan::Project { input, exprs } => {
                input.hash_node(state);
                for e in exprs {
                    e.structural_hash().hash(state);
                }
            }
            LogicalPlan::WithColumn { input, name, expr } => {
                input.hash_node(state);
                name.hash(state);
                expr.structural_hash().hash(state);
            }
            LogicalPlan::Sort {
                input,
                by,
                descending,
                top_k,
            } => {
                input.hash_node(state);
                by.hash(state);
                descending.hash(state);
                top_k.hash(state);
            }
            LogicalPlan::Limit { input, n } => {
                input.hash_node(state);
                n.hash(state);
            }
            LogicalPlan::Aggregate {
                input,
                keys,
                aggs,
                sorted_keys,
            } => {
                input.hash_node(state);
                for e in keys.iter().chain(aggs) {
                    e.structural_hash().hash(state);
                }
                sorted_keys.hash(state);
            }
            LogicalPlan::Join {
                left,
                right,
                how,
                left_on,
                right_on,
                suffix,
            } => {
                left.hash_node(state);
                right.hash_node(state);
                how.hash(state);
                left_on.hash(state);
                right_on.hash(state);
                suffix.hash(state);
            }
            LogicalPlan::Pivot {
                input,
                index,
                column,
                values,
                agg,
            } => {
                input.hash_node(state);
                index.hash(state);
                column.hash(state);
                values.hash(state);
                format!("{agg:?}").hash(state);
            }
            LogicalPlan::Melt {
                input,
                id_vars,
                value_vars,
                var_name,
                value_name,
            } => {
                input.hash_node(state);
                id_vars.hash(state);
                value_vars.hash(state);
                var_name.hash(state);
                value_name.hash(state);
            }
            LogicalPlan::Cache { input } => input.hash_node(state),
            LogicalPlan::Udf {
                input,
                column,
                fn_id,
                ..
            } => {
                input.hash_node(state);
                column.hash(state);
                fn_id.hash(state);
            }
        }
    }

    /// Render the plan tree, one node per line, children indented.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        use std::fmt::Write;
        let pad = "  ".repeat(depth);
        match self {
            LogicalPlan::Scan {
                source,
                projection,
                predicate,
                limit,
            } => {
                let rows = source
                    .known_rows()
                    .map_or_else(|| "?".to_string(), |n| n.to_string());
                let _ = write!(out, "{pad}SCAN [{rows} rows]");
                if let Some(p) = projection {
                    let _ = write!(out, " projection={p:?}");
                }
                if let Some(p) = predicate {
                    let _ = write!(out, " predicate={p}");
                }
                if let Some(n) = limit {
                    let _ = write!(out, " limit={n}");
                }
                out.push('\n');
            }
            LogicalPlan::Filter { input, predicate } => {
                let _ = writeln!(out, "{pad}FILTER {predicate}");
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Project { input, exprs } => {
                let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                let _ = writeln!(out, "{pad}PROJECT [{}]", rendered.join(", "));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::WithColumn { input, name, expr } => {
                let _ = writeln!(out, "{pad}WITH_COLUMN {name} = {expr}");
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Sort {
                input,
                by,
                descending,
                top_k,
            } => {
                let _ = write!(out, "{pad}SORT by={by:?} descending={descending:?}");
                if let Some(k) = top_k {
                    let _ = write!(out, " top_k={k}");
                }
                out.push('\n');
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Limit { input, n } => {
                let _ = writeln!(out, "{pad}LIMIT {n}");
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Aggregate {
                input, keys, aggs, ..
            } => {
                let k: Vec<String> = keys.iter().map(|e| e.to_string()).collect();
                let a: Vec<String> = aggs.iter().map(|e| e.to_string()).collect();
                let _ = writeln!(out, "{pad}AGGREGATE keys=[{}] aggs=[{}]", k.join(", "), a.join(", "));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Join {
                left,
                right,
                how,
                left_on,
                right_on,
                ..
            } => {
                let _ = writeln!(
                    out,
                    "{pad}JOIN {how:?} left_on={left_on:?} right_on={right_on:?}"
                );
                left.explain_into(out, depth + 1);
                right.explain_into(out, depth + 1);
            }
            LogicalPlan::Pivot {
                input,
                index,
                column,
                values,
                agg,
            } => {
                let _ = writeln!(
                    out,
                    "{pad}PIVOT index={index} column={column} values={values} agg={agg:?}"
                );
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Melt {
                input,
                id_vars,
                value_vars,
                ..
            } => {
                let _ = writeln!(out, "{pad}MELT id={id_vars:?} values={value_vars:?}");
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Cache { input } => {
                let _ = writeln!(out, "{pad}CACHE");
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Udf { input, column, .. } => {
                let _ = writeln!(out, "{pad}UDF column={column}");
                input.explain_into(out, depth + 1);
            }
        }
    }
}

impl std::fmt::Debug for LogicalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.explain())
    }
}
