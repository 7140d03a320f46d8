use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

/// Cloneable handle to one piece of cross-task state behind its own mutex.
///
/// Access goes through closures so a guard can never be held across an `.await` or leak
/// out of a short critical section. Each shared structure gets exactly one `Shared`; tasks
/// never nest `with` calls on different handles.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // Every critical section leaves the value consistent, so a panic elsewhere does not
        // invalidate it.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }
}

impl<T: Clone> Shared<T> {
    pub fn snapshot(&self) -> T {
        self.read(T::clone)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|value| f.debug_tuple("Shared").field(value).finish())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn read_modify_write_is_not_torn_across_threads() {
        let counter = Shared::new((0_u64, 0_u64));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.with(|(a, b)| {
                            *a += 1;
                            *b += 1;
                        });
                    }
                })
            })
            .collect();

        for _ in 0..1_000 {
            counter.read(|(a, b)| assert_eq!(a, b));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(counter.snapshot(), (40_000, 40_000));
    }

    #[test]
    fn survives_a_poisoned_lock() {
        let value = Shared::new(7);
        let poisoner = value.clone();
        let _ = thread::spawn(move || {
            poisoner.with(|_| panic!("poison"));
        })
        .join();

        assert_eq!(value.with(|v| *v + 1), 8);
    }
}
