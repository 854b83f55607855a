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

//! Logical plan rewrites, run to a fixpoint.
//!
//! Passes: predicate pushdown (filters sink toward scans and through the
//! permitted join side), projection pruning (scans and joins carry only the
//! columns someone reads), and limit pushdown (a limit over a sort becomes a
//! top-K; over streaming operators it bounds the scan). Duplicate
//! subexpressions share one evaluation in the executor, keyed by the same
//! structural hash the passes use; UDF and cache nodes are rewrite barriers.

use std::collections::HashSet;
use std::sync::Arc;

use hekla::join::JoinHow;

use crate::expr::{Expr, Operator};
use crate::plan::LogicalPlan;

const MAX_PASSES: usize = 8;

/// Run all passes until the plan stops changing.
pub fn optimize(plan: &LogicalPlan) -> LogicalPlan {
    let mut current = plan.clone();
    let mut hash = current.plan_hash();
    for _ in 0..MAX_PASSES {
        let mut next = push_predicates(&current, Vec::new());
        next = prune_projections(&next, None);
        next = push_limit(&next, None);
        let next_hash = next.plan_hash();
        if next_hash == hash {
            break;
        }
        hash = next_hash;
        current = next;
    }
    current
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn conjuncts(expr: &Expr, out: &mut Vec<Expr>) {
    if let Expr::Binary {
        left,
        op: Operator::And,
        right,
    } = expr
    {
        conjuncts(left, out);
        conjuncts(right, out);
    } else {
        out.push(expr.clone());
    }
}

fn and_fold(mut preds: Vec<Expr>) -> Option<Expr> {
    let first = if preds.is_empty() {
        return None;
    } else {
        preds.remove(0)
    };
    Some(preds.into_iter().fold(first, |acc, p| acc.and(p)))
}

fn expr_columns(expr: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    expr.collect_columns(&mut out);
    out
}

/// Rewrite column references through a rename map.
fn rename_columns(expr: &Expr, map: &std::collections::HashMap<String, String>) -> Expr {
    match expr {
        Expr::Column(name) => match map.get(name.as_ref()) {
            Some(new) => Expr::Column(Arc::from(new.as_str())),
            None => expr.clone(),
        },
        Expr::Literal(_) => expr.clone(),
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Arc::new(rename_columns(left, map)),
            op: *op,
            right: Arc::new(rename_columns(right, map)),
        },
        Expr::Not(e) => Expr::Not(Arc::new(rename_columns(e, map))),
        Expr::IsNull(e) => Expr::IsNull(Arc::new(rename_columns(e, map))),
        Expr::IsNotNull(e) => Expr::IsNotNull(Arc::new(rename_columns(e, map))),
        Expr::FillNull { expr, value } => Expr::FillNull {
            expr: Arc::new(rename_columns(expr, map)),
            value: Arc::new(rename_columns(value, map)),
        },
        Expr::Coalesce(exprs) => {
            Expr::Coalesce(exprs.iter().map(|e| rename_columns(e, map)).collect())
        }
        Expr::Cast {
            expr,
            dtype,
            allow_lossy,
        } => Expr::Cast {
            expr: Arc::new(rename_columns(expr, map)),
            dtype: dtype.clone(),
            allow_lossy: *allow_lossy,
        },
        Expr::Alias(e, name) => Expr::Alias(Arc::new(rename_columns(e, map)), name.clone()),
        Expr::Agg { input, kind } => Expr::Agg {
            input: Arc::new(rename_columns(input, map)),
            kind: kind.clone(),
        },
        Expr::Window { input, func } => Expr::Window {
            input: Arc::new(rename_columns(input, map)),
            func: func.clone(),
        },
        Expr::StrFn { input, func } => Expr::StrFn {
            input: Arc::new(rename_columns(input, map)),
            func: func.clone(),
        },
        Expr::ListFn { input, func } => Expr::ListFn {
            input: Arc::new(rename_columns(input, map)),
            func: func.clone(),
        },
        Expr::Field { input, name } => Expr::Field {
            input: Arc::new(rename_columns(input, map)),
            name: name.clone(),
        },
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => Expr::Ternary {
            cond: Arc::new(rename_columns(cond, map)),
            then: Arc::new(rename_columns(then, map)),
            otherwise: Arc::new(rename_columns(otherwise, map)),
        },
    }
}

fn schema_names(plan: &LogicalPlan) -> Option<HashSet<String>> {
    plan.schema()
        .ok()
        .map(|s| s.names().map(|n| n.to_string()).collect())
}

// ---------------------------------------------------------------------------
// Predicate pushdown
// ---------------------------------------------------------------------------

/// Sink `pending` predicates as deep as semantics allow.
fn push_predicates(plan: &LogicalPlan, mut pending: Vec<Expr>) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            conjuncts(predicate, &mut pending);
            push_predicates(input, pending)
        }
        LogicalPlan::Scan {
            source,
            projection,
            predicate,
            limit,
        } => {
            // A bounded scan must filter after the bound; keep new
            // predicates above it.
            if limit.is_some() && !pending.is_empty() {
                let inner = LogicalPlan::Scan {
                    source: source.clone(),
                    projection: projection.clone(),
                    predicate: predicate.clone(),
                    limit: *limit,
                };
                return wrap_filter(inner, pending);
            }
            let mut preds = Vec::new();
            if let Some(p) = predicate {
                conjuncts(p, &mut preds);
            }
            preds.extend(pending);
            LogicalPlan::Scan {
                source: source.clone(),
                projection: projection.clone(),
                predicate: and_fold(preds),
                limit: *limit,
            }
        }
        LogicalPlan::Project { input, exprs } => {
            // Predicates over pass-through columns migrate below, renamed
            // through aliases.
            let mut map = std::collections::HashMap::new();
            for e in exprs {
                match e {
                    Expr::Column(name) => {
                        map.insert(name.to_string(), name.to_string());
                    }
                    Expr::Alias(inner, new) => {
                        if let Expr::Column(old) = inner.as_ref() {
                            map.insert(new.to_string(), old.to_string());
                        }
                    }
                    _ => {}
                }
            }
            let (push, keep): (Vec<Expr>, Vec<Expr>) = pending
                .into_iter()
                .partition(|p| expr_columns(p).iter().all(|c| map.contains_key(c)));
            let pushed: Vec<Expr> = push.iter().map(|p| rename_columns(p, &map)).collect();
            let node = LogicalPlan::Project {
                input: Arc::new(push_predicates(input, pushed)),
                exprs: exprs.clone(),
            };
            wrap_filter(node, keep)
        }
        LogicalPlan::WithColumn { input, name, expr } => {
            let (push, keep): (Vec<Expr>, Vec<Expr>) = pending
                .into_iter()
                .partition(|p| !expr_columns(p).contains(name));
            let node = LogicalPlan::WithColumn {
                input: Arc::new(push_predicates(input, push)),
                name: name.clone(),
                expr: expr.clone(),
            };
            wrap_filter(node, keep)
        }
        LogicalPlan::Sort {
            input,
            by,
            descending,
            top_k,
        } => {
            // Filters commute with a full sort but not with a top-K bound.
            if top_k.is_some() {
                let node = LogicalPlan::Sort {
                    input: Arc::new(push_predicates(input, Vec::new())),
                    by: by.clone(),
                    descending: descending.clone(),
                    top_k: *top_k,
                };
                return wrap_filter(node, pending);
            }
            LogicalPlan::Sort {
                input: Arc::new(push_predicates(input, pending)),
                by: by.clone(),
                descending: descending.clone(),
                top_k: *top_k,
            }
        }
        LogicalPlan::Join {
            left,
            right,
            how,
            left_on,
            right_on,
            suffix,
        } => {
            let left_names = schema_names(left);
            let right_names = schema_names(right);
            let mut push_left = Vec::new();
            let mut push_right = Vec::new();
            let mut keep = Vec::new();
            for p in pending {
                let cols = expr_columns(&p);
                let all_left = left_names
                    .as_ref()
                    .is_some_and(|names| cols.iter().all(|c| names.contains(c)));
                let all_right = right_names
                    .as_ref()
                    .is_some_and(|names| cols.iter().all(|c| names.contains(c)));
                match how {
                    JoinHow::Inner if all_left => push_left.push(p),
                    JoinHow::Inner if all_right => push_right.push(p),
                    JoinHow::Left if all_left => push_left.push(p),
                    JoinHow::Right if all_right => push_right.push(p),
                    _ => keep.push(p),
                }
            }
            let node = LogicalPlan::Join {
                left: Arc::new(push_predicates(left, push_left)),
                right: Arc::new(push_predicates(right, push_right)),
                how: *how,
                left_on: left_on.clone(),
                right_on: right_on.clone(),
                suffix: suffix.clone(),
            };
            wrap_filter(node, keep)
        }
        // Barriers: rewrite children, keep predicates above.
        other => {
            let node = rebuild_children(other, &|child| push_predicates(child, Vec::new()));
            wrap_filter(node, pending)
        }
    }
}

fn wrap_filter(plan: LogicalPlan, preds: Vec<Expr>) -> LogicalPlan {
    match and_fold(preds) {
        Some(predicate) => LogicalPlan::Filter {
            input: Arc::new(plan),
            predicate,
        },
        None => plan,
    }
}

/// Rebuild a node with rewritten children, leaving its own parameters
/// untouched.
fn rebuild_children(
    plan: &LogicalPlan,
    rewrite: &dyn Fn(&LogicalPlan) -> LogicalPlan,
) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan { .. } => plan.clone(),
        LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
            input: Arc::new(rewrite(input)),
            predicate: predicate.clone(),
        },
        LogicalPlan::Project { input, exprs } => LogicalPlan::Project {
            input: Arc::new(rewrite(input)),
            exprs: exprs.clone(),
        },
        LogicalPlan::WithColumn { input, name, expr } => LogicalPlan::WithColumn {
            input: Arc::new(rewrite(input)),
            name: name.clone(),
            expr: expr.clone(),
        },
        LogicalPlan::Sort {
            input,
            by,
            descending,
            top_k,
        } => LogicalPlan::Sort {
            input: Arc::new(rewrite(input)),
            by: by.clone(),
            descending: descending.clone(),
            top_k: *top_k,
        },
        LogicalPlan::Limit { input, n } => LogicalPlan::Limit {
            input: Arc::new(rewrite(input)),
            n: *n,
        },
        LogicalPlan::Aggregate {
            input,
            keys,
            aggs,
            sorted_keys,
        } => LogicalPlan::Aggregate {
            input: Arc::new(rewrite(input)),
            keys: keys.clone(),
            aggs: aggs.clone(),
            sorted_keys: *sorted_keys,
        },
        LogicalPlan::Join {
            left,
            right,
            how,
            left_on,
            right_on,
            suffix,
        } => LogicalPlan::Join {
            left: Arc::new(rewrite(left)),
            right: Arc::new(rewrite(right)),
            how: *how,
            left_on: left_on.clone(),
            right_on: right_on.clone(),
            suffix: suffix.clone(),
        },
        LogicalPlan::Pivot {
            input,
            index,
            column,
            values,
            agg,
        } => LogicalPlan::Pivot {
            input: Arc::new(rewrite(input)),
            index: index.clone(),
            column: column.clone(),
            values: values.clone(),
            agg: agg.clone(),
        },
        LogicalPlan::Melt {
            input,
            id_vars,
            value_vars,
            var_name,
            value_name,
        } => LogicalPlan::Melt {
            input: Arc::new(rewrite(input)),
            id_vars: id_vars.clone(),
            value_vars: value_vars.clone(),
            var_name: var_name.clone(),
            value_name: value_name.clone(),
        },
        LogicalPlan::Cache { input } => LogicalPlan::Cache {
            input: Arc::new(rewrite(input)),
        },
        LogicalPlan::Udf {
            input,
            column,
            func,
            fn_id,
        } => LogicalPlan::Udf {
            input: Arc::new(rewrite(input)),
            column: column.clone(),
            func: func.clone(),
            fn_id: *fn_id,
        },
    }
}

// ---------------------------------------------------------------------------
// Projection pruning
// ---------------------------------------------------------------------------

/// Narrow scans and joins to the columns actually read. `required == None`
/// means the parent needs everything.
fn prune_projections(plan: &LogicalPlan, required: Option<&HashSet<String>>) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan {
            source,
            projection,
            predicate,
            limit,
        } => {
            let Some(req) = required else {
                return plan.clone();
            };
            let Ok(schema) = source.schema() else {
                return plan.clone();
            };
            // The scan's own predicate still needs its columns.
            let mut need: HashSet<String> = req.clone();
            if let Some(p) = predicate {
                need.extend(expr_columns(p));
            }
            let narrowed: Vec<String> = schema
                .names()
                .filter(|n| need.contains(*n))
                .map(|n| n.to_string())
                .collect();
            let narrowed = match projection {
                Some(existing) => existing
                    .iter()
                    .filter(|n| need.contains(*n))
                    .cloned()
                    .collect(),
                None => narrowed,
            };
            if narrowed.is_empty() {
                // Keep at least one column so the frame stays well-formed.
                return plan.clone();
            }
            LogicalPlan::Scan {
                source: source.clone(),
                projection: Some(narrowed),
                predicate: predicate.clone(),
                limit: *limit,
            }
        }
        LogicalPlan::Filter { input, predicate } => {
            let child_req = required.map(|req| {
                let mut r = req.clone();
                r.extend(expr_columns(predicate));
                r
            });
            LogicalPlan::Filter {
                input: Arc::new(prune_projections(input, child_req.as_ref())),
                predicate: predicate.clone(),
            }
        }
        LogicalPlan::Project { input, exprs } => {
            let kept: Vec<Expr> = match required {
                Some(req) => {
                    let kept: Vec<Expr> = exprs
                        .iter()
                        .filter(|e| {
                            e.output_name()
                                .map(|n| req.contains(n.as_ref()))
                                .unwrap_or(true)
                        })
                        .cloned()
                        .collect();
                    if kept.is_empty() {
                        exprs.clone()
                    } else {
                        kept
                    }
                }
                None => exprs.clone(),
            };
            let mut child_req = HashSet::new();
            for e in &kept {
                e.collect_columns(&mut child_req);
            }
            LogicalPlan::Project {
                input: Arc::new(prune_projections(input, Some(&child_req))),
                exprs: kept,
            }
        }
        LogicalPlan::WithColumn { input, name, expr } => {
            if let Some(req) = required {
                if !req.contains(name) {
                    // Nobody reads the derived column; drop the node.
                    return prune_projections(input, required);
                }
            }
            let child_req = required.map(|req| {
                let mut r = req.clone();
                r.remove(name);
                r.extend(expr_columns(expr));
                r
            });
            LogicalPlan::WithColumn {
                input: Arc::new(prune_projections(input, child_req.as_ref())),
                name: name.clone(),
                expr: expr.clone(),
            }
        }
        LogicalPlan::Sort {
            input,
            by,
            descending,
            top_k,
        } => {
            let child_req = required.map(|req| {
                let mut r = req.clone();
                r.extend(by.iter().cloned());
                r
            });
            LogicalPlan::Sort {
                input: Arc::new(prune_projections(input, child_req.as_ref())),
                by: by.clone(),
                descending: descending.clone(),
                top_k: *top_k,
            }
        }
        LogicalPlan::Limit { input, n } => LogicalPlan::Limit {
            input: Arc::new(prune_projections(input, required)),
            n: *n,
        },
        LogicalPlan::Aggregate {
            input,
            keys,
            aggs,
            sorted_keys,
        } => {
            let mut child_req = HashSet::new();
            for e in keys.iter().chain(aggs) {
                e.collect_columns(&mut child_req);
            }
            LogicalPlan::Aggregate {
                input: Arc::new(prune_projections(input, Some(&child_req))),
                keys: keys.clone(),
                aggs: aggs.clone(),
                sorted_keys: *sorted_keys,
            }
        }
        LogicalPlan::Join {
            left,
            right,
            how,
            left_on,
            right_on,
            suffix,
        } => {
            let (Some(left_schema), Some(right_schema)) = (schema_names(left), schema_names(right))
            else {
                return rebuild_children(plan, &|c| prune_projections(c, None));
            };
            let (left_req, right_req) = match required {
                None => (None, None),
                Some(req) => {
                    let mut lr: HashSet<String> =
                        left_on.iter().cloned().collect();
                    let mut rr: HashSet<String> =
                        right_on.iter().cloned().collect();
                    for name in req {
                        if left_schema.contains(name) {
                            lr.insert(name.clone());
                        }
                        // A required right column may appear suffixed.
                        let base = name.strip_suffix(suffix.as_str()).unwrap_or(name);
                        if right_schema.contains(name) {
                            rr.insert(name.clone());
                        } else if right_schema.contains(base) {
                            rr.insert(base.to_string());
                        }
                    }
                    (Some(lr), Some(rr))
                }
            };
            LogicalPlan::Join {
                left: Arc::new(prune_projections(left, left_req.as_ref())),
                right: Arc::new(prune_projections(right, right_req.as_ref())),
                how: *how,
                left_on: left_on.clone(),
                right_on: right_on.clone(),
                suffix: suffix.clone(),
            }
        }
        LogicalPlan::Melt {
            input,
            id_vars,
            value_vars,
            var_name,
            value_name,
        } => {
            let mut child_req: HashSet<String> = id_vars.iter().cloned().collect();
            child_req.extend(value_vars.iter().cloned());
            LogicalPlan::Melt {
                input: Arc::new(prune_projections(input, Some(&child_req))),
                id_vars: id_vars.clone(),
                value_vars: value_vars.clone(),
                var_name: var_name.clone(),
                value_name: value_name.clone(),
            }
        }
        LogicalPlan::Pivot {
            input,
            index,
            column,
            values,
            agg,
        } => {
            let child_req: HashSet<String> =
                [index.clone(), column.clone(), values.clone()].into();
            LogicalPlan::Pivot {
                input: Arc::new(prune_projections(input, Some(&child_req))),
                index: index.clone(),
                column: column.clone(),
                values: values.clone(),
                agg: agg.clone(),
            }
        }
        LogicalPlan::Udf {
            input,
            column,
            func,
            fn_id,
        } => {
            let child_req = required.map(|req| {
                let mut r = req.clone();
                r.insert(column.clone());
                r
            });
            LogicalPlan::Udf {
                input: Arc::new(prune_projections(input, child_req.as_ref())),
                column: column.clone(),
                func: func.clone(),
                fn_id: *fn_id,
            }
        }
        // Cached sub-plans are shared; never narrow them.
        LogicalPlan::Cache { input } => LogicalPlan::Cache {
            input: Arc::new(prune_projections(input, None)),
        },
    }
}

// ---------------------------------------------------------------------------
// Limit pushdown
// ---------------------------------------------------------------------------

fn push_limit(plan: &LogicalPlan, bound: Option<usize>) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit { input, n } => {
            let n = bound.map_or(*n, |b| b.min(*n));
            push_limit(input, Some(n))
        }
        LogicalPlan::Sort {
            input,
            by,
            descending,
            top_k,
        } => {
            // A limit above a sort becomes a partial top-K sort.
            let top_k = match (bound, top_k) {
                (Some(b), Some(k)) => Some(b.min(*k)),
                (Some(b), None) => Some(b),
                (None, k) => *k,
            };
            LogicalPlan::Sort {
                input: Arc::new(push_limit(input, None)),
                by: by.clone(),
                descending: descending.clone(),
                top_k,
            }
        }
        LogicalPlan::Scan {
            source,
            projection,
            predicate,
            limit,
        } => {
            let limit = match (bound, limit) {
                (Some(b), Some(l)) => Some(b.min(*l)),
                (Some(b), None) => Some(b),
                (None, l) => *l,
            };
            LogicalPlan::Scan {
                source: source.clone(),
                projection: projection.clone(),
                predicate: predicate.clone(),
                limit,
            }
        }
        // Row-wise operators commute with a limit.
        LogicalPlan::Project { input, exprs } if exprs.iter().all(|e| e.is_elementwise()) => {
            LogicalPlan::Project {
                input: Arc::new(push_limit(input, bound)),
                exprs: exprs.clone(),
            }
        }
        LogicalPlan::WithColumn { input, name, expr } if expr.is_elementwise() => {
            LogicalPlan::WithColumn {
                input: Arc::new(push_limit(input, bound)),
                name: name.clone(),
                expr: expr.clone(),
            }
        }
        // Everything else stops the limit here.
        other => {
            let node = rebuild_children(other, &|child| push_limit(child, None));
            match bound {
                Some(n) => LogicalPlan::Limit {
                    input: Arc::new(node),
                    n,
                },
                None => node,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit};
    use crate::lazy::LazyFrame;
    use hekla::{Column, Frame};

    fn frame() -> Frame {
        Frame::from_columns(vec![
            ("a", Column::from_vec(vec![1i64, 2, 3]).unwrap()),
            ("b", Column::from_vec(vec![10i64, 20, 30]).unwrap()),
            ("c", Column::from_vec(vec![100i64, 200, 300]).unwrap()),
        ])
        .unwrap()
    }

    #[test]
    fn filter_reaches_scan() {
        let lf = LazyFrame::scan_frame(frame())
            .select(vec![col("a"), col("b")])
            .filter(col("a").gt(lit(1)));
        let plan = optimize(lf.logical_plan());
        let rendered = plan.explain();
        assert!(rendered.contains("predicate="), "{rendered}");
        assert!(!rendered.contains("FILTER"), "{rendered}");
    }

    #[test]
    fn projection_narrows_scan() {
        let lf = LazyFrame::scan_frame(frame()).select(vec![col("a")]);
        let plan = optimize(lf.logical_plan());
        let rendered = plan.explain();
        assert!(rendered.contains("projection=[\"a\"]"), "{rendered}");
    }

    #[test]
    fn limit_over_sort_becomes_top_k() {
        let lf = LazyFrame::scan_frame(frame())
            .sort(&["a"], &[false])
            .limit(2);
        let plan = optimize(lf.logical_plan());
        let rendered = plan.explain();
        assert!(rendered.contains("top_k=2"), "{rendered}");
        assert!(!rendered.contains("LIMIT"), "{rendered}");
    }

    #[test]
    fn limit_bounds_scan() {
        let lf = LazyFrame::scan_frame(frame()).limit(2);
        let plan = optimize(lf.logical_plan());
        let rendered = plan.explain();
        assert!(rendered.contains("limit=2"), "{rendered}");
    }

    #[test]
    fn fixpoint_is_stable() {
        let lf = LazyFrame::scan_frame(frame())
            .filter(col("a").gt(lit(0)))
            .select(vec![col("a"), col("c")])
            .limit(10);
        let once = optimize(lf.logical_plan());
        let twice = optimize(&once);
        assert_eq!(once.plan_hash(), twice.plan_hash());
    }
}
