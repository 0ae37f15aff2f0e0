//! The replay planner.
//!
//! `plan` is a pure function of `(input, history)` — no I/O, no clock, no
//! randomness. Every turn re-evaluates it from scratch; recorded outcomes
//! substitute for work already done, so a crashed instance resumes exactly
//! where its history says it stopped. Any contradiction between history and
//! input is a replay divergence, never silently reconciled.

use photoflow_core::types::{
    ActivityRecord, ResizeRequest, ResultLocator, TaskFailure, TaskState,
};

/// One task the runtime must dispatch this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDispatch {
    pub task_index: usize,
    pub request: ResizeRequest,
    /// False when a Scheduled record already exists (re-dispatch after a
    /// lost completion) — the runtime must not append a second record.
    pub needs_record: bool,
}

/// Terminal result of an orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every task completed; locators are index-aligned with the input.
    Completed(Vec<ResultLocator>),
    /// At least one task failed. Successful siblings stay in history; the
    /// failures are sorted by task index.
    Failed(Vec<TaskFailure>),
}

/// What the current `(input, history)` state demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Dispatch these tasks, then re-plan.
    Dispatch(Vec<TaskDispatch>),
    /// All tasks terminal; finalize the instance.
    Finished(Outcome),
}

/// History contradicts the input it claims to derive from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence(pub String);

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Decide the next turn for an instance.
///
/// Dispatch set: every index in `[0, N)` whose record is missing (first
/// dispatch) or still Scheduled (the previous dispatch's completion was
/// never durably recorded — re-execute under at-least-once). A fan-in over
/// all N tasks: nothing finishes until every record is terminal, and one
/// failure never cancels siblings.
pub fn plan(input: &[ResizeRequest], history: &[ActivityRecord]) -> Result<Turn, Divergence> {
    let n = input.len();
    let mut by_index: Vec<Option<&ActivityRecord>> = vec![None; n];

    for record in history {
        if record.task_index >= n {
            return Err(Divergence(format!(
                "history has task index {} but input holds {} requests",
                record.task_index, n
            )));
        }
        if record.request != input[record.task_index] {
            return Err(Divergence(format!(
                "recorded request for task {} does not match input",
                record.task_index
            )));
        }
        if by_index[record.task_index].replace(record).is_some() {
            return Err(Divergence(format!(
                "duplicate history records for task {}",
                record.task_index
            )));
        }
    }

    let mut dispatches = Vec::new();
    for (task_index, slot) in by_index.iter().enumerate() {
        match slot {
            None => dispatches.push(TaskDispatch {
                task_index,
                request: input[task_index].clone(),
                needs_record: true,
            }),
            Some(record) if record.state == TaskState::Scheduled => dispatches.push(TaskDispatch {
                task_index,
                request: input[task_index].clone(),
                needs_record: false,
            }),
            Some(_) => {}
        }
    }

    if !dispatches.is_empty() {
        return Ok(Turn::Dispatch(dispatches));
    }

    // All N records terminal. Aggregate in input order, never completion
    // order.
    let mut failures = Vec::new();
    let mut locators = Vec::with_capacity(n);
    for record in by_index.iter().flatten() {
        match record.state {
            TaskState::Completed => match &record.result {
                Some(locator) => locators.push(locator.clone()),
                None => {
                    return Err(Divergence(format!(
                        "task {} is Completed but has no result",
                        record.task_index
                    )))
                }
            },
            TaskState::Failed => {
                let error = record.error.clone().ok_or_else(|| {
                    Divergence(format!(
                        "task {} is Failed but has no error",
                        record.task_index
                    ))
                })?;
                failures.push(TaskFailure {
                    task_index: record.task_index,
                    error,
                });
            }
            TaskState::Scheduled => unreachable!("scheduled records were dispatched above"),
        }
    }

    if failures.is_empty() {
        Ok(Turn::Finished(Outcome::Completed(locators)))
    } else {
        Ok(Turn::Finished(Outcome::Failed(failures)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photoflow_core::types::{TaskError, TaskErrorKind};

    fn req(name: &str) -> ResizeRequest {
        ResizeRequest::new(name, 64, 64)
    }

    fn locator(name: &str) -> ResultLocator {
        ResultLocator {
            name: name.to_string(),
            content_disposition: "attachment; filename=64x64.jpeg".into(),
        }
    }

    fn completed_record(task_index: usize, request: ResizeRequest, name: &str) -> ActivityRecord {
        let mut record = ActivityRecord::scheduled(task_index, request);
        record.state = TaskState::Completed;
        record.result = Some(locator(name));
        record
    }

    fn failed_record(task_index: usize, request: ResizeRequest) -> ActivityRecord {
        let mut record = ActivityRecord::scheduled(task_index, request);
        record.state = TaskState::Failed;
        record.error = Some(TaskError {
            kind: TaskErrorKind::SourceNotFound,
            message: "missing".into(),
        });
        record
    }

    #[test]
    fn empty_input_finishes_immediately_with_empty_output() {
        let turn = plan(&[], &[]).unwrap();
        assert_eq!(turn, Turn::Finished(Outcome::Completed(vec![])));
    }

    #[test]
    fn fresh_instance_dispatches_every_index() {
        let input = vec![req("a.jpg"), req("b.jpg"), req("c.jpg")];
        let Turn::Dispatch(dispatches) = plan(&input, &[]).unwrap() else {
            panic!("expected dispatch turn");
        };
        assert_eq!(dispatches.len(), 3);
        assert!(dispatches.iter().all(|d| d.needs_record));
        assert_eq!(
            dispatches.iter().map(|d| d.task_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn replay_skips_terminal_records() {
        let input = vec![req("a.jpg"), req("b.jpg"), req("c.jpg")];
        let history = vec![
            completed_record(0, req("a.jpg"), "out-a.jpeg"),
            completed_record(2, req("c.jpg"), "out-c.jpeg"),
        ];
        let Turn::Dispatch(dispatches) = plan(&input, &history).unwrap() else {
            panic!("expected dispatch turn");
        };
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].task_index, 1);
        assert!(dispatches[0].needs_record);
    }

    #[test]
    fn stale_scheduled_record_is_redispatched_without_new_record() {
        let input = vec![req("a.jpg")];
        let history = vec![ActivityRecord::scheduled(0, req("a.jpg"))];
        let Turn::Dispatch(dispatches) = plan(&input, &history).unwrap() else {
            panic!("expected dispatch turn");
        };
        assert_eq!(dispatches[0].task_index, 0);
        assert!(!dispatches[0].needs_record);
    }

    #[test]
    fn aggregation_preserves_input_order() {
        let input = vec![req("a.jpg"), req("b.jpg"), req("c.jpg")];
        // History in completion order, not input order.
        let history = vec![
            completed_record(2, req("c.jpg"), "out-c.jpeg"),
            completed_record(0, req("a.jpg"), "out-a.jpeg"),
            completed_record(1, req("b.jpg"), "out-b.jpeg"),
        ];
        let Turn::Finished(Outcome::Completed(locators)) = plan(&input, &history).unwrap() else {
            panic!("expected completed outcome");
        };
        assert_eq!(
            locators.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
            vec!["out-a.jpeg", "out-b.jpeg", "out-c.jpeg"]
        );
    }

    #[test]
    fn one_failure_fails_the_batch_but_keeps_sibling_results() {
        let input = vec![req("a.jpg"), req("b.jpg"), req("c.jpg")];
        let history = vec![
            completed_record(0, req("a.jpg"), "out-a.jpeg"),
            failed_record(1, req("b.jpg")),
            completed_record(2, req("c.jpg"), "out-c.jpeg"),
        ];
        let Turn::Finished(Outcome::Failed(failures)) = plan(&input, &history).unwrap() else {
            panic!("expected failed outcome");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task_index, 1);
        assert_eq!(failures[0].error.kind, TaskErrorKind::SourceNotFound);
    }

    #[test]
    fn out_of_range_index_is_divergence() {
        let input = vec![req("a.jpg")];
        let history = vec![completed_record(5, req("x.jpg"), "out.jpeg")];
        assert!(plan(&input, &history).is_err());
    }

    #[test]
    fn mismatched_request_payload_is_divergence() {
        let input = vec![req("a.jpg")];
        let history = vec![completed_record(0, req("other.jpg"), "out.jpeg")];
        assert!(plan(&input, &history).is_err());
    }

    #[test]
    fn duplicate_records_for_one_index_is_divergence() {
        let input = vec![req("a.jpg")];
        let history = vec![
            completed_record(0, req("a.jpg"), "out-1.jpeg"),
            completed_record(0, req("a.jpg"), "out-2.jpeg"),
        ];
        assert!(plan(&input, &history).is_err());
    }
}
