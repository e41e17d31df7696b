pub trait PersistentModifiable<T> {
    type Error;
    type Modification;

    fn load() -> Result<T, Self::Error>;
    fn save(&self) -> Result<(), Self::Error>;
    fn modify(&mut self, modification: Self::Modification) -> Result<(), Self::Error>;
}

/// Loads `T` on first access and saves it after every modification.
pub struct AutoPersisting<T: PersistentModifiable<T>> {
    value: Option<T>,
}

impl<T: PersistentModifiable<T>> AutoPersisting<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    fn loaded(&mut self) -> Result<&mut T, T::Error> {
        let value = match self.value.take() {
            Some(value) => value,
            None => T::load()?,
        };
        Ok(self.value.insert(value))
    }

    pub fn read(&mut self) -> Result<&T, T::Error> {
        self.loaded().map(|value| &*value)
    }

    pub fn modify(&mut self, modification: T::Modification) -> Result<(), T::Error> {
        self.loaded()?.modify(modification)
    }
}

impl<T: PersistentModifiable<T>> Default for AutoPersisting<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static LOADS: AtomicUsize = AtomicUsize::new(0);
    static SAVES: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Default)]
    struct Counter {
        value: u32,
    }

    impl PersistentModifiable<Counter> for Counter {
        type Error = String;
        type Modification = u32;

        fn load() -> Result<Counter, String> {
            LOADS.fetch_add(1, Ordering::SeqCst);
            Ok(Counter { value: 1 })
        }

        fn save(&self) -> Result<(), String> {
            SAVES.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn modify(&mut self, modification: u32) -> Result<(), String> {
            self.value += modification;
            self.save()
        }
    }

    #[test]
    fn test_loads_once_and_saves_on_modify() {
        let mut persisting: AutoPersisting<Counter> = AutoPersisting::new();
        assert_eq!(persisting.read().unwrap().value, 1);
        assert_eq!(persisting.read().unwrap().value, 1);
        assert_eq!(LOADS.load(Ordering::SeqCst), 1);

        persisting.modify(4).unwrap();
        assert_eq!(persisting.read().unwrap().value, 5);
        assert_eq!(SAVES.load(Ordering::SeqCst), 1);
    }
}
