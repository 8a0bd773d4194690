//! Operation bitmask carried by low-level events.

use bitflags::bitflags;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

bitflags! {
    /// Kinds of change reported for a single path.
    ///
    /// One event may carry more than one kind; every matching subscriber
    /// capability fires once per kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Op: u8 {
        const CREATE = 1 << 0;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
    }
}

impl Op {
    /// Map a `notify` event kind onto the operations we route.
    ///
    /// Returns an empty set for kinds that are not routed (access,
    /// metadata-only changes, paired rename events).
    pub fn from_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Remove(_) => Op::REMOVE,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::empty(),
            // The new name shows up as a creation; `Both` repeats a From/To pair.
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Op::CREATE,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Op::empty(),
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn test_create_and_remove_kinds() {
        assert_eq!(Op::from_kind(&EventKind::Create(CreateKind::File)), Op::CREATE);
        assert_eq!(Op::from_kind(&EventKind::Create(CreateKind::Folder)), Op::CREATE);
        assert_eq!(Op::from_kind(&EventKind::Remove(RemoveKind::Any)), Op::REMOVE);
    }

    #[test]
    fn test_modify_kinds() {
        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert_eq!(Op::from_kind(&data), Op::WRITE);
        assert_eq!(Op::from_kind(&EventKind::Modify(ModifyKind::Any)), Op::WRITE);

        let meta = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions));
        assert!(Op::from_kind(&meta).is_empty());
    }

    #[test]
    fn test_rename_sides() {
        let from = EventKind::Modify(ModifyKind::Name(RenameMode::From));
        let to = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        let both = EventKind::Modify(ModifyKind::Name(RenameMode::Both));

        assert_eq!(Op::from_kind(&from), Op::RENAME);
        assert_eq!(Op::from_kind(&to), Op::CREATE);
        assert!(Op::from_kind(&both).is_empty());
    }

    #[test]
    fn test_unrouted_kinds() {
        assert!(Op::from_kind(&EventKind::Access(AccessKind::Any)).is_empty());
        assert!(Op::from_kind(&EventKind::Any).is_empty());
        assert!(Op::from_kind(&EventKind::Other).is_empty());
    }
}
