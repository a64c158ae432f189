use std::collections::{HashMap, HashSet};

use erased_containers::{Arena, Array, Map, Value, ValueKind};
use proptest::prelude::*;

fn filled<'a>(arena: &'a Arena, values: &[i64]) -> Array<'a> {
    let mut arr = Array::new(arena, ValueKind::Int64).unwrap();
    for &v in values {
        arr.append(Value::Int64(v), arena).unwrap();
    }
    arr
}

proptest! {
    #[test]
    fn set_then_get_returns_value(
        values in proptest::collection::vec(any::<i64>(), 1..64),
        index in any::<prop::sample::Index>(),
        replacement in any::<i64>(),
    ) {
        let arena = Arena::new();
        let mut arr = filled(&arena, &values);
        let i = index.index(values.len());
        arr.set(i, Value::Int64(replacement));
        prop_assert_eq!(arr.get(i), Value::Int64(replacement));
        prop_assert_eq!(arr.len(), values.len());
    }

    #[test]
    fn insert_then_delete_restores_bytes(
        values in proptest::collection::vec(any::<i64>(), 0..64),
        position in any::<prop::sample::Index>(),
        count in 0usize..16,
    ) {
        let arena = Arena::new();
        let mut arr = filled(&arena, &values);
        let before = arr.as_raw_bytes().to_vec();
        let i = position.index(values.len() + 1);

        arr.insert(i, count, &arena).unwrap();
        prop_assert_eq!(arr.len(), values.len() + count);
        arr.delete(i, count);
        prop_assert_eq!(arr.as_raw_bytes(), &before[..]);
    }

    #[test]
    fn delete_then_reinsert_reproduces_contents(
        values in proptest::collection::vec(any::<i64>(), 1..64),
        start in any::<prop::sample::Index>(),
        span in any::<prop::sample::Index>(),
    ) {
        let arena = Arena::new();
        let mut arr = filled(&arena, &values);
        let i = start.index(values.len());
        let count = span.index(values.len() - i + 1);

        arr.delete(i, count);
        arr.insert(i, count, &arena).unwrap();
        for k in i..i + count {
            arr.set(k, Value::Int64(values[k]));
        }
        let back: Vec<i64> = arr.iter().map(|v| v.as_i64().unwrap()).collect();
        prop_assert_eq!(back, values);
    }

    #[test]
    fn distinct_keys_never_bleed(
        entries in proptest::collection::vec((any::<u64>(), any::<u32>()), 0..128),
    ) {
        let arena = Arena::new();
        let mut map = Map::new(&arena, ValueKind::UInt64, ValueKind::UInt32);
        let mut model = HashMap::new();
        for &(k, v) in &entries {
            map.set(Value::UInt64(k), Value::UInt32(v), &arena).unwrap();
            model.insert(k, v);
        }
        prop_assert_eq!(map.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(map.get(Value::UInt64(*k)), Some(Value::UInt32(*v)));
        }
    }

    #[test]
    fn iteration_visits_each_entry_once(
        keys in proptest::collection::hash_set("[a-z]{0,12}", 0..64),
    ) {
        let arena = Arena::new();
        let mut map = Map::new(&arena, ValueKind::String, ValueKind::Int32);
        for (i, key) in keys.iter().enumerate() {
            map.set(Value::String(key), Value::Int32(i as i32), &arena).unwrap();
        }

        let mut seen = HashSet::new();
        let mut cursor = map.begin();
        while cursor.next() {
            let key = cursor.key().as_str().unwrap().to_owned();
            prop_assert!(keys.contains(&key));
            prop_assert!(seen.insert(key));
        }
        prop_assert!(cursor.done());
        prop_assert_eq!(seen.len(), keys.len());
    }

    #[test]
    fn delete_of_absent_key_keeps_len(
        keys in proptest::collection::hash_set(any::<i32>(), 1..32),
        probe in any::<i32>(),
    ) {
        prop_assume!(!keys.contains(&probe));
        let arena = Arena::new();
        let mut map = Map::new(&arena, ValueKind::Int32, ValueKind::Bool);
        for &k in &keys {
            map.set(Value::Int32(k), Value::Bool(true), &arena).unwrap();
        }
        prop_assert!(!map.delete(Value::Int32(probe)));
        prop_assert_eq!(map.len(), keys.len());
    }
}
