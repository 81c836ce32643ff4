//! Behavior hooks, one optional slot per registered type.

use crate::error::SchemaError;
use crate::peer::{Envelope, Origin};
use crate::protocol::{NetMessage, Record};

type RawHook = Box<dyn FnMut(Origin, &Record) -> Result<(), SchemaError>>;

/// Hooks indexed by registry entry.
pub struct HookTable {
    hooks: Vec<Option<RawHook>>,
}

impl HookTable {
    /// Creates a table with `len` empty slots.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            hooks: (0..len).map(|_| None).collect(),
        }
    }

    /// Installs the hook for the type at `index`, replacing any previous one.
    pub fn set<M, F>(&mut self, index: usize, mut hook: F)
    where
        M: NetMessage,
        F: FnMut(Envelope<M>) + 'static,
    {
        if let Some(slot) = self.hooks.get_mut(index) {
            *slot = Some(Box::new(move |origin, record| {
                let message = M::from_record(record)?;
                hook(Envelope { origin, message });
                Ok(())
            }));
        }
    }

    /// Returns true if a hook is installed at `index`.
    #[must_use]
    pub fn is_set(&self, index: usize) -> bool {
        self.hooks.get(index).is_some_and(Option::is_some)
    }

    /// Runs the hook at `index`. Returns false if none is installed.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] if the record does not convert to the hook's type.
    pub fn dispatch(&mut self, index: usize, origin: Origin, record: &Record) -> Result<bool, SchemaError> {
        match self.hooks.get_mut(index).and_then(Option::as_mut) {
            Some(hook) => hook(origin, record).map(|()| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::peer::PeerId;
    use crate::protocol::{FieldDef, FieldKind, MessageDescriptor, Schema, Value};

    #[derive(Debug, PartialEq)]
    struct Score(u32);

    impl NetMessage for Score {
        fn descriptor() -> MessageDescriptor {
            MessageDescriptor::new(Schema::new("Score").field(FieldDef::new("points", FieldKind::U32)))
        }
        fn to_record(&self) -> Record {
            Record::new(vec![Value::U32(self.0)])
        }
        fn from_record(record: &Record) -> Result<Self, SchemaError> {
            Ok(Self(record.read(0)?))
        }
    }

    #[test]
    fn test_dispatch_typed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut table = HookTable::new(2);
        table.set::<Score, _>(1, move |env| sink.borrow_mut().push((env.origin, env.message)));

        assert!(!table.dispatch(0, Origin::Server, &Score(1).to_record()).unwrap());
        assert!(table.dispatch(1, Origin::Peer(PeerId(2)), &Score(9).to_record()).unwrap());
        assert_eq!(*seen.borrow(), vec![(Origin::Peer(PeerId(2)), Score(9))]);
        assert!(table.is_set(1));
    }

    #[test]
    fn test_dispatch_mismatch() {
        let mut table = HookTable::new(1);
        table.set::<Score, _>(0, |_| {});
        let bad = Record::new(vec![Value::Bool(true)]);
        assert!(table.dispatch(0, Origin::Server, &bad).is_err());
    }
}
