//! Executor tests: queue, dispatch loop, lifecycle and catalog refresh.

mod catalog;
mod lifecycle;
