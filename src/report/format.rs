//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::aggregate::DayAccuracy;
use crate::app::pipeline::RunOutput;
use crate::domain::{BlockAccuracy, ModelFamily};
use crate::io::cache::ResultCache;
use crate::report::{failures_by_kind, summarize_by_day};

/// Full `dbm fit` summary: ingest counts, batch counts, strategy mix, failures.
pub fn format_run_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== dbm - decision-bound model fits ===\n");
    out.push_str(&format!(
        "Rows: {} read | {} without response | {} unreadable\n",
        run.rows_read,
        run.no_response,
        run.row_errors.len()
    ));
    out.push_str(&format!(
        "Groups: {} total | {} cached | {} fitted | {} failed\n",
        run.groups_total,
        run.cached,
        run.fitted.len(),
        run.failures.len()
    ));

    if !run.fitted.is_empty() {
        out.push_str("\nNew fits:\n");
        for (key, selection) in &run.fitted {
            out.push_str(&format!(
                "  {key}  {:<7} {:<11} BIC={:.3} params={}\n",
                selection.best.model.id(),
                selection.family.label(),
                selection.best.bic,
                fmt_vec(&selection.best.params),
            ));
            for (kind, reason) in &selection.skipped {
                out.push_str(&format!("    (skipped {kind}) {reason}\n"));
            }
        }
    }

    out.push('\n');
    out.push_str(&format_cache_summary(&run.cache));

    let failures = failures_by_kind(&run.failures);
    if !failures.is_empty() {
        out.push_str("\nFailed groups:\n");
        for (kind, keys) in &failures {
            let listed: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            out.push_str(&format!("  {kind} ({}): {}\n", keys.len(), listed.join(", ")));
        }
    }

    out
}

/// Per-day family proportions and mean BIC, over every cached group.
pub fn format_cache_summary(cache: &ResultCache) -> String {
    let mut out = String::new();
    if cache.is_empty() {
        out.push_str("No fitted groups.\n");
        return out;
    }

    out.push_str(&format!("Strategy by day ({} groups):\n", cache.len()));
    out.push_str(&format!(
        "{:>4} {:>6} {:>11} {:>11} {:>12} {:>12}\n",
        "day", "groups", "procedural", "rule-based", "bic(proc)", "bic(rule)"
    ));
    out.push_str(&format!(
        "{:->4} {:->6} {:->11} {:->11} {:->12} {:->12}\n",
        "", "", "", "", "", ""
    ));
    for d in summarize_by_day(cache) {
        out.push_str(&format!(
            "{:>4} {:>6} {:>11} {:>11} {:>12} {:>12}\n",
            d.day,
            d.n_groups,
            fmt_pct(d.proportion(ModelFamily::Procedural)),
            fmt_pct(d.proportion(ModelFamily::RuleBased)),
            fmt_opt(d.mean_bic_procedural),
            fmt_opt(d.mean_bic_rule_based),
        ));
    }
    out
}

/// Block accuracies followed by the per-day overall accuracy.
pub fn format_blocks(blocks: &[BlockAccuracy], days: &[DayAccuracy]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>7} {:>4} {:>5} {:>5} {:>8}\n",
        "subject", "day", "block", "n", "accuracy"
    ));
    out.push_str(&format!("{:->7} {:->4} {:->5} {:->5} {:->8}\n", "", "", "", "", ""));
    for b in blocks {
        out.push_str(&format!(
            "{:>7} {:>4} {:>5} {:>5} {:>8.3}\n",
            b.subject, b.day, b.block, b.n, b.accuracy
        ));
    }

    out.push_str("\nDay accuracy:\n");
    for d in days {
        out.push_str(&format!(
            "  sub {:03} day {:02}  {:>4}/{:<4} {:.3}\n",
            d.subject, d.day, d.n_correct, d.n, d.accuracy
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".to_string())
}
