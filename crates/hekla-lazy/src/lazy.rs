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

//! The lazy query surface and its eager mirror.
//!
//! A [`LazyFrame`] accumulates logical plan nodes; `collect` optimizes and
//! executes. The eager [`FrameExt`] operations route through the same path,
//! so eager and lazy results agree by construction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hekla::frame::Schema;
use hekla::groupby::AggKind;
use hekla::join::JoinHow;
use hekla::{Column, Frame, Result};

use crate::expr::{col, Expr};
use crate::pipeline::BatchSource;
use crate::plan::{LogicalPlan, ScanSource, UdfFunc};

static UDF_IDS: AtomicUsize = AtomicUsize::new(0);

/// A lazily evaluated query.
#[derive(Clone)]
pub struct LazyFrame {
    plan: Arc<LogicalPlan>,
}

impl LazyFrame {
    /// Scan an in-memory frame.
    pub fn scan_frame(frame: Frame) -> Self {
        LazyFrame {
            plan: Arc::new(LogicalPlan::Scan {
                source: ScanSource::Frame(Arc::new(frame)),
                projection: None,
                predicate: None,
                limit: None,
            }),
        }
    }

    /// Scan an external batch source. The source is single-shot: a second
    /// execution observes its end of stream.
    pub fn scan_source(source: Box<dyn BatchSource + Send>) -> Self {
        LazyFrame {
            plan: Arc::new(LogicalPlan::Scan {
                source: ScanSource::Source(Arc::new(Mutex::new(source))),
                projection: None,
                predicate: None,
                limit: None,
            }),
        }
    }

    pub fn from_plan(plan: LogicalPlan) -> Self {
        LazyFrame {
            plan: Arc::new(plan),
        }
    }

    pub fn logical_plan(&self) -> &LogicalPlan {
        &self.plan
    }

    pub fn schema(&self) -> Result<Schema> {
        self.plan.schema()
    }

    fn wrap(self, plan: LogicalPlan) -> Self {
        LazyFrame {
            plan: Arc::new(plan),
        }
    }

    // ---- Plan builders ---------------------------------------------------

    pub fn filter(self, predicate: Expr) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Filter { input, predicate })
    }

    pub fn select(self, exprs: Vec<Expr>) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Project { input, exprs })
    }

    pub fn with_column(self, name: &str, expr: Expr) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::WithColumn {
            input,
            name: name.to_string(),
            expr,
        })
    }

    /// Rename columns via `(old, new)` pairs. Expressed as a projection of
    /// aliases over the current schema.
    pub fn rename(self, mapping: &[(&str, &str)]) -> Result<Self> {
        let schema = self.plan.schema()?;
        let mut exprs = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let new = mapping
                .iter()
                .find(|(old, _)| *old == field.name)
                .map(|(_, new)| *new);
            exprs.push(match new {
                Some(new) => col(&field.name).alias(new),
                None => col(&field.name),
            });
        }
        Ok(self.select(exprs))
    }

    pub fn sort(self, by: &[&str], descending: &[bool]) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Sort {
            input,
            by: by.iter().map(|s| s.to_string()).collect(),
            descending: descending.to_vec(),
            top_k: None,
        })
    }

    pub fn limit(self, n: usize) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Limit { input, n })
    }

    pub fn head(self, n: usize) -> Self {
        self.limit(n)
    }

    pub fn join(
        self,
        other: LazyFrame,
        left_on: &[&str],
        right_on: &[&str],
        how: JoinHow,
        suffix: &str,
    ) -> Self {
        let left = self.plan.clone();
        self.wrap(LogicalPlan::Join {
            left,
            right: other.plan,
            how,
            left_on: left_on.iter().map(|s| s.to_string()).collect(),
            right_on: right_on.iter().map(|s| s.to_string()).collect(),
            suffix: suffix.to_string(),
        })
    }

    pub fn group_by(self, keys: Vec<Expr>) -> LazyGroupBy {
        LazyGroupBy {
            lf: self,
            keys,
            sorted_keys: false,
        }
    }

    pub fn pivot(self, index: &str, column: &str, values: &str, agg: AggKind) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Pivot {
            input,
            index: index.to_string(),
            column: column.to_string(),
            values: values.to_string(),
            agg,
        })
    }

    pub fn melt(
        self,
        id_vars: &[&str],
        value_vars: &[&str],
        var_name: &str,
        value_name: &str,
    ) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Melt {
            input,
            id_vars: id_vars.iter().map(|s| s.to_string()).collect(),
            value_vars: value_vars.iter().map(|s| s.to_string()).collect(),
            var_name: var_name.to_string(),
            value_name: value_name.to_string(),
        })
    }

    /// Apply a user function to one column. Opaque to the optimizer.
    pub fn udf(
        self,
        column: &str,
        func: impl Fn(&Column) -> Result<Column> + Send + Sync + 'static,
    ) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Udf {
            input,
            column: column.to_string(),
            func: Arc::new(func) as Arc<UdfFunc>,
            fn_id: UDF_IDS.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Materialize this plan once; later executions of any plan sharing the
    /// node read the cached frame.
    pub fn cache(self) -> Self {
        let input = self.plan.clone();
        self.wrap(LogicalPlan::Cache { input })
    }

    // ---- Execution -------------------------------------------------------

    /// Render the plan tree, optimized or raw.
    pub fn explain(&self, optimized: bool) -> String {
        if optimized {
            crate::optimizer::optimize(&self.plan).explain()
        } else {
            self.plan.explain()
        }
    }

    /// Optimize and execute to a materialized frame.
    pub fn collect(&self) -> Result<Frame> {
        let optimized = crate::optimizer::optimize(&self.plan);
        crate::exec::execute(&optimized)
    }

    /// Collect at most the first `n` rows.
    pub fn fetch(&self, n: usize) -> Result<Frame> {
        self.clone().limit(n).collect()
    }
}

/// Pending group-by: holds keys until `agg` supplies the aggregations.
pub struct LazyGroupBy {
    lf: LazyFrame,
    keys: Vec<Expr>,
    sorted_keys: bool,
}

impl LazyGroupBy {
    /// Sort the output by key instead of first-seen order.
    pub fn sorted(mut self) -> Self {
        self.sorted_keys = true;
        self
    }

    pub fn agg(self, aggs: Vec<Expr>) -> LazyFrame {
        let input = self.lf.plan.clone();
        self.lf.wrap(LogicalPlan::Aggregate {
            input,
            keys: self.keys,
            aggs,
            sorted_keys: self.sorted_keys,
        })
    }
}

// ---------------------------------------------------------------------------
// Eager mirror
// ---------------------------------------------------------------------------

/// Eager operations on [`Frame`], routed through the lazy engine so the two
/// paths cannot diverge.
pub trait FrameExt {
    fn lazy(&self) -> LazyFrame;
    fn filter(&self, predicate: Expr) -> Result<Frame>;
    fn with_column_expr(&self, name: &str, expr: Expr) -> Result<Frame>;
    fn group_by(&self, keys: &[&str]) -> EagerGroupBy;
    fn join_on(
        &self,
        other: &Frame,
        left_on: &[&str],
        right_on: &[&str],
        how: JoinHow,
        suffix: &str,
    ) -> Result<Frame>;
    fn pivot(&self, index: &str, column: &str, values: &str, agg: AggKind) -> Result<Frame>;
    fn melt(
        &self,
        id_vars: &[&str],
        value_vars: &[&str],
        var_name: &str,
        value_name: &str,
    ) -> Result<Frame>;
}

impl FrameExt for Frame {
    fn lazy(&self) -> LazyFrame {
        LazyFrame::scan_frame(self.clone())
    }

    fn filter(&self, predicate: Expr) -> Result<Frame> {
        self.lazy().filter(predicate).collect()
    }

    fn with_column_expr(&self, name: &str, expr: Expr) -> Result<Frame> {
        self.lazy().with_column(name, expr).collect()
    }

    fn group_by(&self, keys: &[&str]) -> EagerGroupBy {
        EagerGroupBy {
            lf: self.lazy(),
            keys: keys.iter().map(|name| col(name)).collect(),
        }
    }

    fn join_on(
        &self,
        other: &Frame,
        left_on: &[&str],
        right_on: &[&str],
        how: JoinHow,
        suffix: &str,
    ) -> Result<Frame> {
        self.lazy()
            .join(other.lazy(), left_on, right_on, how, suffix)
            .collect()
    }

    fn pivot(&self, index: &str, column: &str, values: &str, agg: AggKind) -> Result<Frame> {
        self.lazy().pivot(index, column, values, agg).collect()
    }

    fn melt(
        &self,
        id_vars: &[&str],
        value_vars: &[&str],
        var_name: &str,
        value_name: &str,
    ) -> Result<Frame> {
        self.lazy()
            .melt(id_vars, value_vars, var_name, value_name)
            .collect()
    }
}

/// Pending eager group-by.
pub struct EagerGroupBy {
    lf: LazyFrame,
    keys: Vec<Expr>,
}

impl EagerGroupBy {
    pub fn agg(self, aggs: Vec<Expr>) -> Result<Frame> {
        self.lf.group_by(self.keys).agg(aggs).collect()
    }
}
