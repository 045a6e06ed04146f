use collection_editor::{HistoryManager, OrderedItemStore};
use proptest::prelude::*;
use shared::models::{Item, ItemFields, ItemId};

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Remove(u8),
    Reorder(u8, usize),
    Undo,
    Redo,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(|n| Op::Add(n % 16)),
        2 => any::<u8>().prop_map(|n| Op::Remove(n % 16)),
        4 => (any::<u8>(), 0usize..20).prop_map(|(n, to)| Op::Reorder(n % 16, to)),
        1 => Just(Op::Undo),
        1 => Just(Op::Redo),
    ]
}

fn id(n: u8) -> ItemId {
    ItemId::new(format!("item-{n}"))
}

proptest! {
    /// Ranks stay a contiguous 0..N permutation under any operation sequence.
    #[test]
    fn prop_ranks_stay_contiguous(ops in prop::collection::vec(arb_op(), 0..64)) {
        let mut store = OrderedItemStore::detached();
        let mut history = HistoryManager::new(8);

        for op in ops {
            match op {
                Op::Add(n) => {
                    let item = Item::new(id(n), ItemFields::new("Title", "https://x"));
                    if store.validate_new(&item).is_ok() {
                        history.record_before_change(&store);
                        store.add(item).unwrap();
                    }
                }
                Op::Remove(n) => {
                    if store.contains(&id(n)) {
                        history.record_before_change(&store);
                        store.remove(&id(n)).unwrap();
                    }
                }
                Op::Reorder(n, to) => {
                    if store.contains(&id(n)) {
                        history.record_before_change(&store);
                        store.reorder(&id(n), to).unwrap();
                    }
                }
                Op::Undo => {
                    history.undo(&mut store);
                }
                Op::Redo => {
                    history.redo(&mut store);
                }
            }
            prop_assert!(store.ranks_are_contiguous(), "ranks broken: {:?}", store.items());
        }
    }

    /// Undo immediately followed by redo restores the exact order.
    #[test]
    fn prop_undo_redo_restores_order(
        count in 2usize..10,
        moves in prop::collection::vec((0usize..10, 0usize..10), 1..8),
    ) {
        let mut store = OrderedItemStore::detached();
        for n in 0..count {
            store.add(Item::new(id(n as u8), ItemFields::new("Title", "https://x"))).unwrap();
        }
        let mut history = HistoryManager::new(32);

        let mut moved = false;
        for (from, to) in moves {
            let source = store.items()[from % count].id.clone();
            if store.position_of(&source) == Some(to % count) {
                continue;
            }
            history.record_before_change(&store);
            moved |= store.reorder(&source, to % count).unwrap();
        }

        let before = store.ordered_ids();
        if moved {
            prop_assert!(history.undo(&mut store));
            prop_assert!(history.redo(&mut store));
        } else {
            prop_assert!(!history.undo(&mut store));
        }
        prop_assert_eq!(store.ordered_ids(), before);
    }
}
