#![no_main]

use libfuzzer_sys::fuzz_target;
use qtree::query::IntTerm;

fuzz_target!(|data: &str| {
    // A parsed range must print to an expression that parses to the same term
    if let Ok(term) = IntTerm::parse("f", data) {
        let printed = term.expression();
        let reparsed = IntTerm::parse("f", &printed).unwrap();
        assert_eq!(reparsed.expression(), printed);
    }
});
