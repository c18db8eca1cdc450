#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&cut, rest)) = data.split_first() else {
        return;
    };
    let cut = usize::from(cut).min(rest.len());
    let mut hasher = cubehash::CubeHash::new();
    hasher.update(&rest[..cut]);
    hasher.update(&rest[cut..]);
    assert_eq!(hasher.finalize(), cubehash::hash(rest));
});
