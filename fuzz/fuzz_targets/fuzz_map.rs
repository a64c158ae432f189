#![no_main]

use std::collections::HashMap;

use erased_containers::{Arena, ArenaConfig, Map, Value, ValueKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = ArenaConfig::new().with_max_bytes(64 * 1024);
    let arena = match Arena::with_config(config) {
        Ok(arena) => arena,
        Err(_) => return,
    };
    let mut map = Map::new(&arena, ValueKind::Bytes, ValueKind::Int64);
    let mut model: HashMap<Vec<u8>, i64> = HashMap::new();

    // Each record: an opcode, a key length and that many key bytes
    let mut rest = data;
    while let [op, len, tail @ ..] = rest {
        let len = usize::from(*len % 8).min(tail.len());
        let (key, tail) = tail.split_at(len);
        rest = tail;
        match op % 4 {
            0 | 1 => {
                let value = i64::from(*op) * 31 - len as i64;
                if map.set(Value::Bytes(key), Value::Int64(value), &arena).is_ok() {
                    model.insert(key.to_vec(), value);
                }
            }
            2 => {
                assert_eq!(map.delete(Value::Bytes(key)), model.remove(key).is_some());
            }
            _ => {
                let expected = model.get(key).map(|v| Value::Int64(*v));
                assert_eq!(map.get(Value::Bytes(key)), expected);
            }
        }
        assert_eq!(map.len(), model.len());
    }

    let mut visited = 0;
    let mut cursor = map.begin();
    while cursor.next() {
        let key = cursor.key().as_bytes().unwrap();
        let expected = model.get(key).map(|v| Value::Int64(*v));
        assert_eq!(Some(cursor.value()), expected);
        visited += 1;
    }
    assert_eq!(visited, model.len());
});
