//! Console rendering of the study results

use colored::*;

use super::QuizPrediction;
use crate::data::FilteredTable;
use crate::stats::FeatureCorrelation;
use crate::training::{ConfusionMatrix, ModelComparison, TrainingRun};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

pub(crate) fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

pub(crate) fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

pub fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

pub fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── Report blocks ─────────────────────────────────────────────────────────────

/// Title box with the run settings
pub fn banner(training: &str, quiz: &str, seed: u64, workers: usize) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "liftsense".white().bold()));
    line_box_center(&format!("{}", dim("weight lifting exercise recognition")));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Training", &shorten(training, 46)));
    line_box(&kv("Quiz    ", &shorten(quiz, 46)));
    line_box(&kv("Seed    ", &seed.to_string()));
    line_box(&kv("Workers ", &workers.to_string()));
    line_box_empty();
    line_box_bottom();
}

fn shorten(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max - 1)).collect();
        format!("…{}", tail)
    }
}

pub fn table_summary(label: &str, rows: usize, cols: usize) {
    println!("  {:<16} {} rows × {} cols", muted(label), rows, cols);
}

pub fn filter_summary(table: &FilteredTable) {
    section("Column filter");
    table_summary("Kept", table.n_rows(), table.predictors.len() + 1);
    println!("  {:<16} {}", muted("Dropped"), table.dropped.len());
}

/// Correlation of each candidate with the outcome; selected rows are marked
pub fn selection_table(correlations: &[FeatureCorrelation], selected: &[String]) {
    section("Correlation with outcome");
    println!("  {:<24} {:>9} {:>11} {:>6}", muted("Feature"), muted("r"), muted("p-value"), "");
    println!("  {}", dim(&"─".repeat(56)));
    for c in correlations {
        let mark = if selected.contains(&c.name) { ok("✓") } else { dim("·") };
        println!("  {:<24} {:>9.4} {:>11.3e} {:>6}", c.name, c.r, c.p_value, mark);
    }
    println!();
    println!(
        "  {} {} of {} features selected",
        accent("›"),
        selected.len().to_string().white().bold(),
        correlations.len()
    );
}

/// Tuning grid and fold accuracies of one model
pub fn training_run(run: &TrainingRun) {
    let model_type = run.model_type();
    section(&format!("{} ({})", model_type.display_name(), model_type.method()));
    println!("  {:<44} {:>8} {:>8}", muted("Candidate"), muted("Acc"), muted("SD"));
    for c in &run.candidates {
        let line = format!("  {:<44} {:>8.4} {:>8.4}", c.params.to_string(), c.cv.mean_score, c.cv.std_score);
        if c.params == run.params {
            println!("{}", line.white().bold());
        } else {
            println!("{}", line);
        }
    }
    println!();
    println!("  {:<16} {}", muted("Selected"), run.params);
    println!(
        "  {:<16} {}",
        muted("Folds"),
        run.cv
            .scores
            .iter()
            .map(|s| format!("{:.3}", s))
            .collect::<Vec<_>>()
            .join(" ")
    );
    if let Some(oob) = run.model.oob_accuracy() {
        println!("  {:<16} {:.4}", muted("OOB accuracy"), oob);
    }
    println!("  {:<16} {:.2}s", muted("Time"), run.training_time_secs);
}

/// Confusion matrix and its statistics
pub fn confusion_matrix(title: &str, cm: &ConfusionMatrix) {
    section(&format!("Confusion matrix: {}", title));
    print!("  {:<12}", muted("Prediction"));
    for label in &cm.labels {
        print!("{:>8}", label);
    }
    println!();
    for (i, label) in cm.labels.iter().enumerate() {
        print!("  {:<12}", label);
        for j in 0..cm.labels.len() {
            print!("{:>8}", cm.counts[[i, j]]);
        }
        println!();
    }
    println!();
    println!("  {:<24} {:.4}", muted("Accuracy"), cm.accuracy);
    println!("  {:<24} ({:.4}, {:.4})", muted("95% CI"), cm.accuracy_ci.0, cm.accuracy_ci.1);
    println!("  {:<24} {:.4}", muted("No information rate"), cm.no_information_rate);
    println!("  {:<24} {:.3e}", muted("P-Value [Acc > NIR]"), cm.p_value_acc_gt_nir);
    println!("  {:<24} {:.4}", muted("Kappa"), cm.kappa);
    println!();
    println!(
        "  {:<8} {:>11} {:>11} {:>9} {:>11} {:>9}",
        muted("Class"),
        muted("Sensitivity"),
        muted("Specificity"),
        muted("Pos Pred"),
        muted("Prevalence"),
        muted("Bal Acc")
    );
    for s in &cm.by_class {
        println!(
            "  {:<8} {:>11.4} {:>11.4} {:>9.4} {:>11.4} {:>9.4}",
            s.label, s.sensitivity, s.specificity, s.pos_pred_value, s.prevalence, s.balanced_accuracy
        );
    }
}

pub fn comparison(cmp: &ModelComparison) {
    section("Model comparison");
    println!(
        "  {:<10} {:>9} {:>8} {:>9} {:>8} {:>8}",
        muted("Model"),
        muted("CV acc"),
        muted("CV sd"),
        muted("Test acc"),
        muted("Error"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(56)));
    for (idx, row) in cmp.rows.iter().enumerate() {
        let line = format!(
            "  {:<10} {:>9.4} {:>8.4} {:>9.4} {:>8.4} {:>7.1}s",
            row.model_type.method(),
            row.cv_mean_accuracy,
            row.cv_std_accuracy,
            row.test_accuracy,
            row.out_of_sample_error,
            row.training_time_secs
        );
        if idx == cmp.best_index() {
            println!("{}", line.white().bold());
        } else {
            println!("{}", line);
        }
    }
    println!("  {}", dim(&"─".repeat(56)));
    let best = cmp.best();
    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        best.model_type.display_name().white().bold(),
        muted("test accuracy:"),
        best.test_accuracy
    );
}

pub fn quiz_predictions(predictions: &[QuizPrediction]) {
    section("Quiz predictions");
    for p in predictions {
        println!("  {:>6}  {}", muted(&p.id), p.label.white().bold());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "abc".red());
        assert_eq!(strip_ansi(&colored), "abc");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_palette_keeps_text() {
        assert_eq!(strip_ansi(&muted("Rows").to_string()), "Rows");
        assert_eq!(strip_ansi(&dim("──").to_string()), "──");
    }

    #[test]
    fn test_shorten_keeps_tail() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("https://example.org/pml-training.csv", 10), "…ining.csv");
    }
}
