#![no_main]

use erased_containers::{Arena, ArenaConfig, Array, Value, ValueKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = ArenaConfig::new()
        .with_initial_block_size(64)
        .with_max_block_size(1024)
        .with_max_bytes(16 * 1024);
    let arena = match Arena::with_config(config) {
        Ok(arena) => arena,
        Err(_) => return,
    };
    let mut arr = match Array::new(&arena, ValueKind::UInt32) {
        Ok(arr) => arr,
        Err(_) => return,
    };
    let mut model: Vec<u32> = Vec::new();

    for chunk in data.chunks_exact(3) {
        let (op, a, b) = (chunk[0] % 5, usize::from(chunk[1]), usize::from(chunk[2]));
        match op {
            0 => {
                let v = u32::from(chunk[1]) << 8 | u32::from(chunk[2]);
                if arr.append(Value::UInt32(v), &arena).is_ok() {
                    model.push(v);
                }
            }
            1 if !model.is_empty() => {
                let i = a % model.len();
                arr.set(i, Value::UInt32(b as u32));
                model[i] = b as u32;
            }
            2 => {
                let i = a % (model.len() + 1);
                let count = b % 8;
                if arr.insert(i, count, &arena).is_ok() {
                    for k in i..i + count {
                        arr.set(k, Value::UInt32(0));
                    }
                    model.splice(i..i, std::iter::repeat(0).take(count));
                }
            }
            3 if !model.is_empty() => {
                let i = a % model.len();
                let count = b % (model.len() - i + 1);
                arr.delete(i, count);
                model.drain(i..i + count);
            }
            4 => {
                let len = b % (model.len() + 4);
                if arr.resize(len, &arena).is_ok() {
                    if len > model.len() {
                        // New slots are zeroed
                        model.resize(len, 0);
                    } else {
                        model.truncate(len);
                    }
                }
            }
            _ => {}
        }
        assert_eq!(arr.len(), model.len());
    }

    let contents: Vec<u32> = arr.iter().map(|v| v.as_u32().unwrap()).collect();
    assert_eq!(contents, model);
});
