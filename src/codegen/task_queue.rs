//! Generation task scheduling.
//!
//! Generation is embarrassingly parallel across top-level IDL constructs.
//! Each task carries a workload hint (roughly, the member count of the
//! construct); workers pull the largest remaining task first so one huge
//! interface does not dominate the tail of the run. With one worker the
//! queue degenerates to ordered in-thread execution, which is the debugging
//! mode.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use tracing::debug;

use crate::codegen::error::GenerationError;

type TaskFn<'a> = Box<dyn FnOnce() -> Result<(), GenerationError> + Send + 'a>;

struct Task<'a> {
    name: String,
    workload: u64,
    seq: usize,
    run: TaskFn<'a>,
}

/// A failed task with the error it produced.
#[derive(Debug)]
pub struct TaskFailure {
    pub task_name: String,
    pub error: GenerationError,
}

#[derive(Default)]
pub struct TaskQueue<'a> {
    tasks: Vec<Task<'a>>,
}

impl<'a> TaskQueue<'a> {
    pub fn new() -> TaskQueue<'a> {
        TaskQueue { tasks: Vec::new() }
    }

    /// Queue a task with a workload hint. Larger workloads run earlier.
    pub fn post_task_with_workload<F>(&mut self, name: impl Into<String>, workload: u64, run: F)
    where
        F: FnOnce() -> Result<(), GenerationError> + Send + 'a,
    {
        let seq = self.tasks.len();
        self.tasks.push(Task { name: name.into(), workload, seq, run: Box::new(run) });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every queued task, returning the failures in completion order.
    ///
    /// All tasks run even when some fail; the driver reports every failure
    /// at once instead of stopping at the first bad construct.
    pub fn run_all(mut self, workers: NonZeroUsize) -> Vec<TaskFailure> {
        // Largest first, insertion order among equals.
        self.tasks
            .sort_by(|a, b| b.workload.cmp(&a.workload).then(a.seq.cmp(&b.seq)));
        let total = self.tasks.len();
        debug!(tasks = total, workers = workers.get(), "running generation tasks");

        let pending = Mutex::new(self.tasks.into_iter());
        let failures = Mutex::new(Vec::new());
        let worker_loop = || loop {
            let task = match pending.lock() {
                Ok(mut iter) => iter.next(),
                Err(_) => None,
            };
            let Some(task) = task else { break };
            debug!(task = %task.name, workload = task.workload, "task start");
            if let Err(error) = (task.run)() {
                if let Ok(mut failed) = failures.lock() {
                    failed.push(TaskFailure { task_name: task.name, error });
                }
            }
        };

        if workers.get() == 1 {
            worker_loop();
        } else {
            std::thread::scope(|scope| {
                for _ in 0..workers.get().min(total.max(1)) {
                    scope.spawn(worker_loop);
                }
            });
        }
        failures.into_inner().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_worker_runs_largest_first() {
        let order = Mutex::new(Vec::new());
        let mut queue = TaskQueue::new();
        for (name, workload) in [("small", 1u64), ("large", 10), ("medium", 5)] {
            let order = &order;
            queue.post_task_with_workload(name, workload, move || {
                order.lock().unwrap().push(name);
                Ok(())
            });
        }
        let failures = queue.run_all(NonZeroUsize::new(1).unwrap());
        assert!(failures.is_empty());
        assert_eq!(*order.lock().unwrap(), ["large", "medium", "small"]);
    }

    #[test]
    fn equal_workloads_keep_insertion_order() {
        let order = Mutex::new(Vec::new());
        let mut queue = TaskQueue::new();
        for name in ["a", "b", "c"] {
            let order = &order;
            queue.post_task_with_workload(name, 1, move || {
                order.lock().unwrap().push(name);
                Ok(())
            });
        }
        queue.run_all(NonZeroUsize::new(1).unwrap());
        assert_eq!(*order.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn failures_do_not_stop_other_tasks() {
        let mut queue = TaskQueue::new();
        queue.post_task_with_workload("bad", 10, || {
            Err(GenerationError::invariant("boom", "test.idl:1"))
        });
        let ran = Mutex::new(false);
        let ran_ref = &ran;
        queue.post_task_with_workload("good", 1, move || {
            *ran_ref.lock().unwrap() = true;
            Ok(())
        });
        let failures = queue.run_all(NonZeroUsize::new(1).unwrap());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task_name, "bad");
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn parallel_run_completes_every_task() {
        let count = std::sync::atomic::AtomicUsize::new(0);
        let mut queue = TaskQueue::new();
        for i in 0..32u64 {
            let count = &count;
            queue.post_task_with_workload(format!("task{i}"), i, move || {
                count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            });
        }
        let failures = queue.run_all(NonZeroUsize::new(4).unwrap());
        assert!(failures.is_empty());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 32);
    }
}
