//! The pluggable function surface: trait, capability flags and the pending
//! handle returned by suspending executors.

use std::sync::mpsc::{Receiver, channel};
use std::thread;

use bitflags::bitflags;

use cellform_common::{CellValue, FormulaError, FormulaErrorKind};

use crate::reference::CellAddr;
use crate::resolver::ReferenceResolver;

bitflags! {
    /// Capability flags a [`Function`] declares at registration time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FnCaps: u8 {
        /// Same arguments always produce the same value.
        const PURE        = 0b0000_0001;
        /// Must be recomputed on every pass regardless of inputs.
        const VOLATILE    = 0b0000_0010;
        /// May return [`FnResult::Pending`]; the node carrying the call is
        /// flagged async at build time.
        const ASYNC       = 0b0000_0100;
        /// Wants the evaluation origin (the cell the formula lives in).
        const ADDRESS     = 0b0000_1000;
        /// Receives error-valued arguments instead of short-circuiting them.
        const ERROR_AWARE = 0b0001_0000;
    }
}

/// What a function call produced: a settled value or a suspension handle.
#[derive(Debug)]
pub enum FnResult {
    Value(CellValue),
    Pending(PendingValue),
}

impl From<CellValue> for FnResult {
    fn from(v: CellValue) -> Self {
        FnResult::Value(v)
    }
}

impl From<FormulaError> for FnResult {
    fn from(e: FormulaError) -> Self {
        FnResult::Value(CellValue::Error(e))
    }
}

/// A value still being computed on another thread.
///
/// Produced by [`PendingValue::spawn`]; the evaluator surfaces it unchanged
/// through `EvalState::Suspended` so the host decides when to block.
#[derive(Debug)]
pub struct PendingValue {
    rx: Receiver<CellValue>,
}

impl PendingValue {
    /// Run `work` on a background thread and hand back the pending handle.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> CellValue + Send + 'static,
    {
        let (tx, rx) = channel();
        thread::spawn(move || {
            // A closed receiver just means the caller gave up waiting.
            let _ = tx.send(work());
        });
        PendingValue { rx }
    }

    /// Wrap an externally driven channel.
    pub fn from_receiver(rx: Receiver<CellValue>) -> Self {
        PendingValue { rx }
    }

    /// Block until the value settles. A dropped producer yields the
    /// `#CANCELLED!` error value rather than a fault.
    pub fn wait(self) -> CellValue {
        match self.rx.recv() {
            Ok(v) => v,
            Err(_) => CellValue::Error(
                FormulaError::new(FormulaErrorKind::Cancelled)
                    .with_message("async producer dropped before settling"),
            ),
        }
    }

    /// Non-blocking poll; `None` while still in flight.
    pub fn try_take(&self) -> Option<CellValue> {
        match self.rx.try_recv() {
            Ok(v) => Some(v),
            Err(std::sync::mpsc::TryRecvError::Empty) => None,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => Some(CellValue::Error(
                FormulaError::new(FormulaErrorKind::Cancelled)
                    .with_message("async producer dropped before settling"),
            )),
        }
    }
}

/// Per-call evaluation context handed to every executor.
pub struct FunctionContext<'a> {
    pub resolver: &'a dyn ReferenceResolver,
    /// Sheet the formula is evaluated in; unqualified references resolve here.
    pub current_sheet: &'a str,
    /// Cell the formula lives in, when the host knows it.
    pub origin: Option<CellAddr>,
}

/// A formula function executor.
///
/// Implementations are registered by name in a `FunctionRegistry` and invoked
/// with already-evaluated arguments. Errors are returned as values, not
/// `Err`.
pub trait Function: Send + Sync {
    /// Canonical uppercase name.
    fn name(&self) -> &'static str;

    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    fn min_args(&self) -> usize {
        0
    }

    /// `None` means variadic.
    fn max_args(&self) -> Option<usize> {
        None
    }

    fn call(&self, args: &[CellValue], ctx: &FunctionContext<'_>) -> FnResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn spawned_value_settles() {
        let pending = PendingValue::spawn(|| {
            thread::sleep(Duration::from_millis(10));
            CellValue::Int(99)
        });
        assert_eq!(pending.wait(), CellValue::Int(99));
    }

    #[test]
    fn dropped_sender_is_cancelled() {
        let (_tx, rx) = channel::<CellValue>();
        drop(_tx);
        let pending = PendingValue::from_receiver(rx);
        let CellValue::Error(e) = pending.wait() else {
            panic!("expected error value");
        };
        assert_eq!(e.kind, FormulaErrorKind::Cancelled);
    }

    #[test]
    fn try_take_polls() {
        let (tx, rx) = channel::<CellValue>();
        let pending = PendingValue::from_receiver(rx);
        assert_eq!(pending.try_take(), None);
        tx.send(CellValue::Boolean(true)).unwrap();
        assert_eq!(pending.try_take(), Some(CellValue::Boolean(true)));
    }
}
