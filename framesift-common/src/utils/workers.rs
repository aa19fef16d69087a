use std::{any::Any, fmt, io, panic, thread};

pub struct CaughtPanic(pub Box<dyn Any + Send + 'static>);

/// Spawn a thread with a name, so it is recognizable in the logs.
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new().name(name.into()).spawn(f)
}

/// Runs `f`, catching a panic if it happens.
pub fn catch_panic<F, T>(f: F) -> Result<T, CaughtPanic>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(panic::AssertUnwindSafe(f)).map_err(CaughtPanic)
}

impl fmt::Display for CaughtPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let panic = &self.0;
        let string = panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                format!("non-string panic message: {:?}", (**panic).type_id())
            });
        write!(f, "{string}")
    }
}

impl fmt::Debug for CaughtPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaughtPanic({self})")
    }
}
