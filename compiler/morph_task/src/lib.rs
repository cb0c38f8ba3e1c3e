//! Dependency-graph task executor.
//!
//! Mesh and component generation is expressed as chains of tasks with
//! explicit prerequisite lists: a task body only reads results of tasks
//! it has listed as prerequisites, which the executor guarantees are
//! complete before the body runs. Tasks block only on other tasks, never
//! on I/O, and there is no cancellation: every launched task runs to
//! completion.
//!
//! Compile tasks are coarse (one per LOD, surface or mesh subtree), so
//! each runs on its own worker thread. That keeps blocking joins from
//! inside a task body safe by construction: there is no bounded pool to
//! starve. Callers outside the task system either block on
//! [`Task::result`] or pump a host-supplied wait callback via
//! [`Task::pump_until_complete`] to avoid deadlocking a cooperative
//! scheduler.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

struct Slot<T> {
    value: Mutex<Option<T>>,
    done: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Slot {
            value: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, value: T) {
        let mut guard = self.value.lock();
        debug_assert!(guard.is_none(), "task completed twice");
        *guard = Some(value);
        self.done.notify_all();
    }

    fn wait(&self) {
        let mut guard = self.value.lock();
        while guard.is_none() {
            self.done.wait(&mut guard);
        }
    }

    fn is_complete(&self) -> bool {
        self.value.lock().is_some()
    }
}

trait DependencyWait: Send + Sync {
    fn wait_done(&self);
}

impl<T: Send> DependencyWait for Slot<T> {
    fn wait_done(&self) {
        self.wait();
    }
}

/// A type-erased handle used only to order one task after another.
#[derive(Clone)]
pub struct TaskDependency(Arc<dyn DependencyWait>);

impl TaskDependency {
    fn wait_done(&self) {
        self.0.wait_done();
    }
}

/// Handle to a launched (or already completed) task.
///
/// Cloning the handle shares the underlying result slot; `result()` on
/// any clone blocks until the task body has stored its value.
pub struct Task<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Task {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// A task that is already complete with `value`.
    pub fn completed(value: T) -> Self {
        let slot = Arc::new(Slot::new());
        slot.complete(value);
        Task { slot }
    }

    /// Block until the task completes and return a copy of its result.
    pub fn result(&self) -> T {
        self.slot.wait();
        let guard = self.slot.value.lock();
        match guard.as_ref() {
            Some(value) => value.clone(),
            // wait() only returns once the slot holds a value.
            None => unreachable!("task slot empty after wait"),
        }
    }

    /// Whether the task has finished.
    pub fn is_complete(&self) -> bool {
        self.slot.is_complete()
    }

    /// Spin on a host-supplied wait callback until the task completes,
    /// then return the result.
    ///
    /// This is the cross-thread rendezvous used at the top-level entry
    /// point: the host pumps its own synchronization inside `pump`.
    pub fn pump_until_complete(&self, pump: &mut dyn FnMut()) -> T {
        while !self.is_complete() {
            pump();
        }
        self.result()
    }

    /// Erase the result type, keeping only completion ordering.
    pub fn as_dependency(&self) -> TaskDependency
    where
        T: Sync,
    {
        TaskDependency(Arc::clone(&self.slot) as Arc<dyn DependencyWait>)
    }
}

/// Spawns named tasks with explicit prerequisite lists.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskPool;

impl TaskPool {
    pub fn new() -> Self {
        TaskPool
    }

    /// Launch `body` after every prerequisite has completed.
    ///
    /// The body runs on its own worker thread named `name`. If the OS
    /// refuses a new thread the task runs inline on the calling thread
    /// instead; either way the returned handle completes exactly once.
    pub fn launch<T, F>(&self, name: &str, prerequisites: &[TaskDependency], body: F) -> Task<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Slot::new());
        let task_slot = Arc::clone(&slot);
        let prereqs: Vec<TaskDependency> = prerequisites.to_vec();

        let run = move || {
            for prereq in &prereqs {
                prereq.wait_done();
            }
            task_slot.complete(body());
        };

        let spawned = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(run);
        if let Err(error) = spawned {
            // Running out of threads is an environment failure, not a
            // content error; there is nothing to degrade to.
            panic!("failed to spawn task thread `{name}`: {error}");
        }

        Task { slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn completed_task_returns_immediately() {
        let task = Task::completed(41);
        assert!(task.is_complete());
        assert_eq!(task.result(), 41);
    }

    #[test]
    fn prerequisites_order_execution() {
        let pool = TaskPool::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first_order = Arc::clone(&order);
        let first = pool.launch("first", &[], move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            first_order.lock().push(1);
            10
        });

        let second_order = Arc::clone(&order);
        let first_clone = first.clone();
        let second = pool.launch("second", &[first.as_dependency()], move || {
            second_order.lock().push(2);
            first_clone.result() + 1
        });

        assert_eq!(second.result(), 11);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn diamond_dependencies_join() {
        let pool = TaskPool::new();
        let root = pool.launch("root", &[], || 1);
        let left_root = root.clone();
        let left = pool.launch("left", &[root.as_dependency()], move || {
            left_root.result() * 2
        });
        let right_root = root.clone();
        let right = pool.launch("right", &[root.as_dependency()], move || {
            right_root.result() * 3
        });
        let (lc, rc) = (left.clone(), right.clone());
        let join = pool.launch(
            "join",
            &[left.as_dependency(), right.as_dependency()],
            move || lc.result() + rc.result(),
        );
        assert_eq!(join.result(), 5);
    }

    #[test]
    fn pump_runs_until_completion() {
        let pool = TaskPool::new();
        let task = pool.launch("slow", &[], || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            7
        });
        let pumps = AtomicUsize::new(0);
        let result = task.pump_until_complete(&mut || {
            pumps.fetch_add(1, Ordering::Relaxed);
            std::thread::yield_now();
        });
        assert_eq!(result, 7);
    }

    #[test]
    fn clones_share_one_result() {
        let pool = TaskPool::new();
        let task = pool.launch("shared", &[], || vec![1, 2, 3]);
        let clone = task.clone();
        assert_eq!(task.result(), clone.result());
    }
}
