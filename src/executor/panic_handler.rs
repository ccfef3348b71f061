use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a platform thread does when dispatched work panics.
///
/// The strategy is the only public knob; the handler applying it is internal
/// to the platform threads.
///
/// ```compile_fail
/// use strand_rs::executor::panic_handler::PanicHandler;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    Abort,
    Isolate,
    #[default]
    LogAndContinue,
}

#[derive(Debug)]
pub(crate) struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Runs `f` on behalf of the queue labelled `origin`.
    pub(crate) fn execute<F, R>(&self, origin: &str, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(panic_payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic_info = PanicInfo::from_payload(panic_payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(
                            queue = origin,
                            message = %panic_info.message,
                            "dispatched work panicked, aborting"
                        );
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(
                            queue = origin,
                            message = %panic_info.message,
                            "dispatched work panicked"
                        );
                    }
                }

                Err(panic_info)
            }
        }
    }

    #[cfg(test)]
    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_handler_isolate() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute("test", || {
            panic!("test panic");
        });

        let info = result.unwrap_err();
        assert_eq!(info.message, "test panic");
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_panic_handler_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute("test", || 42);

        assert_eq!(result.unwrap(), 42);
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_formatted_panic_message() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for i in 0..3 {
            let result = handler.execute("test", move || {
                panic!("failure {}", i);
            });
            assert_eq!(result.unwrap_err().message, format!("failure {}", i));
        }

        assert_eq!(handler.panic_count(), 3);
    }
}
