use std::cell::Cell;
use std::rc::Rc;

/// Shared flag tying spawned work to the lifetime of the controller that
/// started it.
///
/// Tasks hold a clone and check [`is_cancelled`](Self::is_cancelled) after
/// every await; the controller cancels on dispose or when a newer request
/// supersedes the task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let token = CancelToken::new();
        let task_side = token.clone();
        assert!(!task_side.is_cancelled());
        token.cancel();
        assert!(task_side.is_cancelled());
    }
}
