//! Plain-text views of dashboard state for the terminal front-end.

use crate::dashboard::FailingObjectCursor;
use crate::models::{AppTree, FailingObject, ObjectCount, Validator};
use crate::utils::text::{first_line, fit, truncate};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const STATUS_WIDTH: usize = 13;
const METHOD_WIDTH: usize = 28;
const DESCRIPTION_WIDTH: usize = 40;
const COMMENT_WIDTH: usize = 48;

/// `last_run_time` in UTC as `YYYY-MM-DD HH:MM:SS`, or `N/A`.
pub fn format_last_run(validator: &Validator) -> String {
    validator
        .last_run_at()
        .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn unvalidated(validator: &Validator, total: ObjectCount) -> String {
    if validator.never_run() {
        return "-".to_string();
    }
    match total.known().and_then(|total| validator.unvalidated(total)) {
        Some(n) => n.to_string(),
        None => "?".to_string(),
    }
}

/// One line per validator with counts and last run time.
pub fn validator_row(validator: &Validator, total: ObjectCount) -> String {
    format!(
        "#{:<5} {} {} {} pass {:>6}  fail {:>6}  n/a {:>6}  allowed {:>6}  unvalidated {:>6}  last run {}",
        validator.id,
        fit(validator.status.as_str(), STATUS_WIDTH),
        fit(&validator.method_name, METHOD_WIDTH),
        fit(first_line(&validator.description), DESCRIPTION_WIDTH),
        count(validator.num_passing),
        count(validator.num_failing),
        count(validator.num_na),
        count(validator.displayed_allowed_to_fail()),
        unvalidated(validator, total),
        format_last_run(validator),
    )
}

/// Exception line and traceback of a raising validator; empty otherwise.
pub fn exception_detail(validator: &Validator) -> Vec<String> {
    let Some(summary) = validator.exception_summary() else {
        return Vec::new();
    };
    let mut lines = vec![summary];
    if let Some(traceback) = validator.exc_traceback.as_deref() {
        lines.extend(traceback.lines().map(|line| format!("  {line}")));
    }
    lines
}

/// The App → Model → Validator tree with roll-up statuses.
///
/// `counts` supplies each model's record count; pass a closure returning
/// [`ObjectCount::Unknown`] when counts have not been fetched.
pub fn render_tree(tree: &AppTree<'_>, counts: impl Fn(&str, &str) -> ObjectCount) -> String {
    let mut lines = Vec::new();
    for app in tree.values() {
        lines.push(format!(
            "{} [{}] {} validators",
            app.app_label,
            app.status,
            app.validator_count()
        ));
        for model in app.models.values() {
            let total = counts(model.app_label, model.model_name);
            lines.push(format!(
                "  {} [{}] {} records, {} failing",
                model.model_name,
                model.status,
                total,
                model.failing_total()
            ));
            for validator in &model.validators {
                lines.push(format!("    {}", validator_row(validator, total)));
                lines.extend(
                    exception_detail(validator)
                        .into_iter()
                        .map(|line| format!("      {line}")),
                );
            }
        }
    }
    lines.join("\n")
}

/// One line per failing object: checkbox, primary key, comment, justification.
pub fn failing_object_row(object: &FailingObject) -> String {
    let mut row = format!(
        "[{}] #{:<6} pk {:<8} {}",
        if object.allowed_to_fail { "x" } else { " " },
        object.id,
        object.object_pk,
        fit(first_line(&object.comment), COMMENT_WIDTH),
    );
    if !object.allowed_to_fail_justification.is_empty() {
        row.push_str(&format!(
            "  why: {}",
            truncate(first_line(&object.allowed_to_fail_justification), COMMENT_WIDTH)
        ));
    }
    if let Some(admin) = object.admin_page() {
        row.push_str(&format!("  {admin}"));
    }
    row
}

/// Accumulated failing objects of a drill-down, with a "more" footer.
pub fn render_failing_objects(cursor: &FailingObjectCursor) -> String {
    let mut lines: Vec<String> = cursor.results().iter().map(failing_object_row).collect();
    if cursor.results().is_empty() {
        lines.push("(no failing objects loaded)".to_string());
    }
    if cursor.is_loading() {
        lines.push("loading…".to_string());
    } else if cursor.can_load_more() {
        lines.push(format!(
            "… more available ({} loaded in {} pages)",
            cursor.results().len(),
            cursor.pages_loaded()
        ));
    }
    lines.join("\n")
}
