//! FILENAME: core/pivot-loader/src/deferred.rs
//! PURPOSE: Caller-visible handle for a request settled by a later stream event.
//! CONTEXT: A `Deferred` is a shared, single-threaded cell holding the
//! request status, its outcome and the continuations waiting for it. All
//! settlement goes through `settle`, which is a no-op after the first call,
//! so a request can never be resolved twice or resolved after rejection.
//! Handles can also be awaited as futures.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{PivotError, PivotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredStatus {
    Pending,
    Resolved,
    Rejected,
}

type Continuation<T> = Box<dyn FnOnce(&PivotResult<T>)>;

struct DeferredState<T> {
    status: DeferredStatus,
    result: Option<Rc<PivotResult<T>>>,
    continuations: Vec<Continuation<T>>,
    wakers: Vec<Waker>,
}

/// Shared handle to one outstanding request.
pub struct Deferred<T> {
    inner: Rc<RefCell<DeferredState<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Deferred {
            inner: Rc::new(RefCell::new(DeferredState {
                status: DeferredStatus::Pending,
                result: None,
                continuations: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// A handle that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// A handle that is already rejected with `error`.
    pub fn rejected(error: PivotError) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    pub fn status(&self) -> DeferredStatus {
        self.inner.borrow().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == DeferredStatus::Pending
    }

    /// True if both handles refer to the same request.
    pub fn ptr_eq(&self, other: &Deferred<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: PivotError) -> bool {
        self.settle(Err(error))
    }

    /// Settles the request. Returns false if it was already settled.
    pub fn settle(&self, result: PivotResult<T>) -> bool {
        let (outcome, continuations, wakers) = {
            let mut state = self.inner.borrow_mut();
            if state.status != DeferredStatus::Pending {
                return false;
            }
            state.status = if result.is_ok() {
                DeferredStatus::Resolved
            } else {
                DeferredStatus::Rejected
            };
            let result = Rc::new(result);
            state.result = Some(Rc::clone(&result));
            (
                result,
                std::mem::take(&mut state.continuations),
                std::mem::take(&mut state.wakers),
            )
        };

        // Continuations may call back into this handle.
        for continuation in continuations {
            continuation(&*outcome);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Runs `f` once the request settles, or right away if it already has.
    pub fn on_settled(&self, f: impl FnOnce(&PivotResult<T>) + 'static) {
        let settled = {
            let mut state = self.inner.borrow_mut();
            match state.result.clone() {
                Some(result) => result,
                None => {
                    state.continuations.push(Box::new(f));
                    return;
                }
            }
        };
        f(&*settled);
    }
}

impl<T: Clone> Deferred<T> {
    /// The outcome, if settled.
    pub fn result(&self) -> Option<PivotResult<T>> {
        self.inner.borrow().result.as_deref().cloned()
    }
}

impl<T: Clone> Future for Deferred<T> {
    type Output = PivotResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.borrow_mut();
        match state.result.as_ref() {
            Some(result) => Poll::Ready((**result).clone()),
            None => {
                state.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
