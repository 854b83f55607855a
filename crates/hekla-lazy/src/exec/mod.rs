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

//! The physical executor.
//!
//! Streaming operators (scan, filter, elementwise project/with-column,
//! limit, udf, melt) pull batches through [`stream`]; pipeline breakers
//! (sort, aggregate, join, pivot, cache, and any projection containing an
//! aggregation or window) materialize their input first. The `Cache` node
//! materializes once into a process-global map keyed by the child plan's
//! structural hash.

pub mod eval;
pub mod reshape;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;

use hekla::groupby::{self, AggKind};
use hekla::sort::SortKey;
use hekla::{Column, Error, Frame, Result};

use crate::expr::Expr;
use crate::pipeline::SourceCtx;
use crate::plan::{LogicalPlan, ScanSource};

/// Pull-based batch stream: `None` is end of stream.
pub type BatchStream = Box<dyn FnMut() -> Result<Option<Frame>>>;

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

fn cache_map() -> &'static Mutex<HashMap<u64, Arc<Frame>>> {
    static CACHE: OnceLock<Mutex<HashMap<u64, Arc<Frame>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Drop every cached materialization.
pub fn clear_cache() {
    if let Ok(mut map) = cache_map().lock() {
        map.clear();
    }
}

// ---------------------------------------------------------------------------
// Materializing execution
// ---------------------------------------------------------------------------

/// Execute a plan to one materialized frame.
pub fn execute(plan: &LogicalPlan) -> Result<Frame> {
    match plan {
        LogicalPlan::Sort {
            input,
            by,
            descending,
            top_k,
        } => {
            let frame = execute(input)?;
            match top_k {
                Some(k) => {
                    let keys: Vec<SortKey<'_>> = by
                        .iter()
                        .enumerate()
                        .map(|(i, name)| {
                            Ok(SortKey {
                                column: frame.column(name)?,
                                descending: descending.get(i).copied().unwrap_or(false),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let order = hekla::sort::top_k(&keys, *k)?;
                    frame.take(&order)
                }
                None => {
                    let by: Vec<&str> = by.iter().map(|s| s.as_str()).collect();
                    frame.sort(&by, descending)
                }
            }
        }
        LogicalPlan::Aggregate {
            input,
            keys,
            aggs,
            sorted_keys,
        } => {
            let frame = execute(input)?;
            execute_aggregate(&frame, keys, aggs, *sorted_keys)
        }
        LogicalPlan::Join {
            left,
            right,
            how,
            left_on,
            right_on,
            suffix,
        } => {
            let lf = execute(left)?;
            let rf = execute(right)?;
            let left_on: Vec<&str> = left_on.iter().map(|s| s.as_str()).collect();
            let right_on: Vec<&str> = right_on.iter().map(|s| s.as_str()).collect();
            hekla::join::join_frames(&lf, &rf, &left_on, &right_on, *how, suffix)
        }
        LogicalPlan::Pivot {
            input,
            index,
            column,
            values,
            agg,
        } => {
            let frame = execute(input)?;
            reshape::pivot(&frame, index, column, values, agg)
        }
        LogicalPlan::Cache { input } => {
            let key = input.plan_hash();
            if let Some(hit) = cache_map()
                .lock()
                .map_err(|_| Error::internal("cache lock poisoned"))?
                .get(&key)
            {
                debug!("cache hit for plan {key:x}");
                return Ok(hit.as_ref().clone());
            }
            let frame = execute(input)?;
            cache_map()
                .lock()
                .map_err(|_| Error::internal("cache lock poisoned"))?
                .insert(key, Arc::new(frame.clone()));
            Ok(frame)
        }
        // Everything else streams.
        other => {
            let mut stream = stream(other)?;
            let mut batches = Vec::new();
            while let Some(batch) = stream()? {
                batches.push(batch);
            }
            if batches.is_empty() {
                return empty_frame(other);
            }
            Frame::concat(&batches)
        }
    }
}

fn empty_frame(plan: &LogicalPlan) -> Result<Frame> {
    let schema = plan.schema()?;
    let mut cols = Vec::with_capacity(schema.len());
    for f in schema.fields() {
        cols.push((f.name.clone(), Column::empty(&f.dtype)?));
    }
    Frame::new(cols)
}

// ---------------------------------------------------------------------------
// Batch streaming
// ---------------------------------------------------------------------------

/// Build the pull stream for a plan. Pipeline-breaking nodes materialize
/// and emit a single batch.
pub fn stream(plan: &LogicalPlan) -> Result<BatchStream> {
    match plan {
        LogicalPlan::Scan {
            source,
            projection,
            predicate,
            limit,
        } => scan_stream(source, projection.clone(), predicate.clone(), *limit),
        LogicalPlan::Filter { input, predicate } => {
            let mut inner = stream(input)?;
            let predicate = predicate.clone();
            Ok(Box::new(move || loop {
                let Some(batch) = inner()? else {
                    return Ok(None);
                };
                let mask = eval::filter_mask(&batch, &predicate)?;
                let out = batch.filter_mask(&mask)?;
                if !out.is_empty() {
                    return Ok(Some(out));
                }
            }))
        }
        LogicalPlan::Project { input, exprs } => {
            if exprs.iter().all(|e| e.is_elementwise()) {
                let mut inner = stream(input)?;
                let exprs = exprs.clone();
                Ok(Box::new(move || {
                    let Some(batch) = inner()? else {
                        return Ok(None);
                    };
                    let cols = eval::eval_exprs(&batch, &exprs)?;
                    Ok(Some(Frame::new(cols)?))
                }))
            } else {
                // Aggregations and window functions need the whole input.
                let frame = execute(input)?;
                let cols = eval::eval_exprs(&frame, exprs)?;
                once_stream(Frame::new(cols)?)
            }
        }
        LogicalPlan::WithColumn { input, name, expr } => {
            if expr.is_elementwise() {
                let mut inner = stream(input)?;
                let expr = expr.clone();
                let name = name.clone();
                Ok(Box::new(move || {
                    let Some(batch) = inner()? else {
                        return Ok(None);
                    };
                    let mut memo = eval::Memo::new();
                    let mut col = eval::eval_expr(&batch, &expr, &mut memo)?;
                    if col.len() == 1 && batch.nrows() != 1 {
                        col = Column::full(&col.get(0), batch.nrows(), &col.dtype())?;
                    }
                    Ok(Some(batch.with_column(&name, col)?))
                }))
            } else {
                let frame = execute(input)?;
                let mut memo = eval::Memo::new();
                let mut col = eval::eval_expr(&frame, expr, &mut memo)?;
                if col.len() == 1 && frame.nrows() != 1 {
                    col = Column::full(&col.get(0), frame.nrows(), &col.dtype())?;
                }
                once_stream(frame.with_column(name, col)?)
            }
        }
        LogicalPlan::Limit { input, n } => {
            let mut inner = stream(input)?;
            let mut remaining = *n;
            Ok(Box::new(move || {
                if remaining == 0 {
                    return Ok(None);
                }
                let Some(batch) = inner()? else {
                    return Ok(None);
                };
                let take = remaining.min(batch.nrows());
                remaining -= take;
                if take == batch.nrows() {
                    Ok(Some(batch))
                } else {
                    Ok(Some(batch.slice(0, take)))
                }
            }))
        }
        LogicalPlan::Udf {
            input,
            column,
            func,
            ..
        } => {
            let mut inner = stream(input)?;
            let column = column.clone();
            let func = func.clone();
            Ok(Box::new(move || {
                let Some(batch) = inner()? else {
                    return Ok(None);
                };
                let input_col = batch.column(&column)?;
                let out = func(input_col)?;
                if out.len() != input_col.len() {
                    return Err(Error::shape(format!(
                        "udf on column '{column}' returned {} rows for an input of {}",
                        out.len(),
                        input_col.len()
                    )));
                }
                Ok(Some(batch.with_column(&column, out)?))
            }))
        }
        LogicalPlan::Melt {
            input,
            id_vars,
            value_vars,
            var_name,
            value_name,
        } => {
            let mut inner = stream(input)?;
            let id_vars = id_vars.clone();
            let value_vars = value_vars.clone();
            let var_name = var_name.clone();
            let value_name = value_name.clone();
            Ok(Box::new(move || {
                let Some(batch) = inner()? else {
                    return Ok(None);
                };
                Ok(Some(reshape::melt(
                    &batch,
                    &id_vars,
                    &value_vars,
                    &var_name,
                    &value_name,
                )?))
            }))
        }
        // Pipeline breakers: materialize, emit once.
        breaker => {
            let frame = execute(breaker)?;
            once_stream(frame)
        }
    }
}

fn once_stream(frame: Frame) -> Result<BatchStream> {
    let mut slot = Some(frame);
    Ok(Box::new(move || Ok(slot.take())))
}

fn scan_stream(
    source: &ScanSource,
    projection: Option<Vec<String>>,
    predicate: Option<Expr>,
    limit: Option<usize>,
) -> Result<BatchStream> {
    let ctx = SourceCtx::default();
    let mut remaining = limit.unwrap_or(usize::MAX);
    match source {
        ScanSource::Frame(frame) => {
            let frame = frame.clone();
            let mut offset = 0usize;
            Ok(Box::new(move || loop {
                if remaining == 0 || offset >= frame.nrows() {
                    return Ok(None);
                }
                let len = ctx.target_rows.min(frame.nrows() - offset);
                let mut batch = frame.slice(offset, len);
                offset += len;
                if let Some(names) = &projection {
                    let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
                    batch = batch.select(&names)?;
                }
                if let Some(p) = &predicate {
                    let mask = eval::filter_mask(&batch, p)?;
                    batch = batch.filter_mask(&mask)?;
                }
                if batch.is_empty() {
                    continue;
                }
                let take = remaining.min(batch.nrows());
                remaining -= take;
                if take < batch.nrows() {
                    batch = batch.slice(0, take);
                }
                return Ok(Some(batch));
            }))
        }
        ScanSource::Source(shared) => {
            let shared = shared.clone();
            // Offer the predicate to the source once; keep a post-filter
            // when it declines.
            let pushed = {
                let mut guard = shared
                    .lock()
                    .map_err(|_| Error::internal("batch source lock poisoned"))?;
                match &predicate {
                    Some(p) if guard.supports_predicate_pushdown() => guard.push_predicate(p),
                    _ => false,
                }
            };
            let post_filter = if pushed { None } else { predicate };
            Ok(Box::new(move || loop {
                if remaining == 0 {
                    return Ok(None);
                }
                let mut guard = shared
                    .lock()
                    .map_err(|_| Error::internal("batch source lock poisoned"))?;
                let Some(mut batch) = guard.next_batch(&ctx)? else {
                    return Ok(None);
                };
                drop(guard);
                if let Some(names) = &projection {
                    let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
                    batch = batch.select(&names)?;
                }
                if let Some(p) = &post_filter {
                    let mask = eval::filter_mask(&batch, p)?;
                    batch = batch.filter_mask(&mask)?;
                }
                if batch.is_empty() {
                    continue;
                }
                let take = remaining.min(batch.nrows());
                remaining -= take;
                if take < batch.nrows() {
                    batch = batch.slice(0, take);
                }
                return Ok(Some(batch));
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate execution
// ---------------------------------------------------------------------------

/// Unwrap an aggregation expression into its input and kind.
fn extract_agg(expr: &Expr) -> Result<(String, Expr, AggKind)> {
    match expr {
        Expr::Alias(inner, name) => {
            let (_, input, kind) = extract_agg(inner)?;
            Ok((name.to_string(), input, kind))
        }
        Expr::Agg { input, kind } => Ok((
            expr.output_name()?.to_string(),
            input.as_ref().clone(),
            kind.clone(),
        )),
        other => Err(Error::type_err(format!(
            "group-by aggregation must be an aggregation expression, got {other}"
        ))),
    }
}

fn execute_aggregate(
    frame: &Frame,
    keys: &[Expr],
    aggs: &[Expr],
    sorted_keys: bool,
) -> Result<Frame> {
    let mut memo = eval::Memo::new();
    let mut key_cols = Vec::with_capacity(keys.len());
    let mut key_names = Vec::with_capacity(keys.len());
    for k in keys {
        key_names.push(k.output_name()?.to_string());
        key_cols.push(eval::eval_expr(frame, k, &mut memo)?);
    }

    let mut agg_inputs = Vec::with_capacity(aggs.len());
    let mut agg_names = Vec::with_capacity(aggs.len());
    let mut agg_kinds = Vec::with_capacity(aggs.len());
    for a in aggs {
        let (name, input, kind) = extract_agg(a)?;
        agg_names.push(name);
        agg_inputs.push(eval::eval_expr(frame, &input, &mut memo)?);
        agg_kinds.push(kind);
    }

    let key_refs: Vec<&Column> = key_cols.iter().collect();
    let agg_refs: Vec<(&Column, AggKind)> = agg_inputs
        .iter()
        .zip(&agg_kinds)
        .map(|(c, k)| (c, k.clone()))
        .collect();
    let result = groupby::group_by(&key_refs, &agg_refs)?;

    let mut cols = Vec::with_capacity(keys.len() + aggs.len());
    for (name, col) in key_names.iter().zip(result.keys) {
        cols.push((name.clone(), col));
    }
    for (name, col) in agg_names.iter().zip(result.aggs) {
        cols.push((name.clone(), col));
    }
    let out = Frame::new(cols)?;
    if sorted_keys {
        let by: Vec<&str> = key_names.iter().map(|s| s.as_str()).collect();
        let desc = vec![false; by.len()];
        out.sort(&by, &desc)
    } else {
        Ok(out)
    }
}
