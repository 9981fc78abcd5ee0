use crate::operation::Operation;
use crate::storage::{ReconcileAction, ReconcileReport};
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::DATABASE, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn key(text: &str) -> String {
    text.style(theme().key.clone()).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    /// Some records failed, the rest were saved
    Partial,
    Failed,
}

fn classify(operation: &Operation) -> Outcome {
    let failed = operation.failures().len();
    if operation.is_successful() {
        Outcome::Succeeded
    } else if failed > 0 && failed < operation.records().len() {
        Outcome::Partial
    } else {
        Outcome::Failed
    }
}

/// Print how an operation ended, with one line per failed record
pub fn operation_outcome(operation: &Operation) {
    let kind = operation.kind();
    let total = operation.records().len();
    match classify(operation) {
        Outcome::Succeeded => {
            success(&format!("{} of {} record(s) succeeded", kind, total));
            return;
        }
        Outcome::Partial => warn(&format!(
            "{}: {} of {} record(s) failed, the others were saved",
            kind,
            operation.failures().len(),
            total
        )),
        Outcome::Failed => match operation.exception() {
            Some(e) => error(&format!("{} failed: {}", kind, e)),
            None => error(&format!("{} failed", kind)),
        },
    }

    for failure in operation.failures() {
        eprintln!("  {} {}", dim(&format!("record {}:", failure.index)), failure.error);
    }
}

pub fn reconcile_report(table: &str, report: &ReconcileReport) {
    let (icon, verb) = match report.action {
        ReconcileAction::Created => (Icons::NEW, "created"),
        ReconcileAction::Recreated => (Icons::WRENCH, "recreated"),
        ReconcileAction::Altered => (Icons::MOD, "altered"),
        ReconcileAction::Unchanged => (Icons::CHECK, "unchanged"),
    };
    status(icon, &format!("Table {}", key(table)), verb);

    for column in &report.added {
        let note = if report.backfilled.contains(column) { " (back-filled)" } else { "" };
        println!("  {} {}{}", Icons::NEW.style(theme().success.clone()), key(column), dim(note));
    }
    for (column, reason) in &report.failed {
        println!("  {} {} {}", Icons::CROSS.style(theme().error.clone()), key(column), dim(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use crate::Error;

    fn finished(records: usize, failed: &[usize]) -> Operation {
        let records = (1..=records as i64).map(|id| Record::with_id(id, Default::default())).collect();
        let mut operation = Operation::update(records);
        operation.start().unwrap();
        for &index in failed {
            operation.record_failure(index, Error::NotExecuted(index));
        }
        operation.complete().unwrap();
        operation
    }

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(classify(&finished(3, &[])), Outcome::Succeeded);
        assert_eq!(classify(&finished(3, &[1])), Outcome::Partial);
        assert_eq!(classify(&finished(2, &[0, 1])), Outcome::Failed);

        let mut rolled_back = Operation::create(vec![Record::default()]);
        rolled_back.start().unwrap();
        rolled_back.fail(Error::ConnectionClosed).unwrap();
        assert_eq!(classify(&rolled_back), Outcome::Failed);
    }
}
