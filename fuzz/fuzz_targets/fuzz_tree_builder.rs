#![no_main]

use libfuzzer_sys::fuzz_target;
use qtree::query::{canonicalize, encode, ItemSpec};

fuzz_target!(|data: &str| {
    // Any tree the builder accepts must canonicalize and encode without panicking
    let Ok(spec) = ItemSpec::from_json(data) else {
        return;
    };
    let Ok(mut tree) = spec.build() else {
        return;
    };
    let _ = tree.to_string();
    if canonicalize(&mut tree, Some(10_000)).is_ok() {
        let mut buf = Vec::new();
        let _ = encode(&tree, &mut buf);
    }
});
