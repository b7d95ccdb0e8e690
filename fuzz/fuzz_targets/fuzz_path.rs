// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for OnePath parsing and manipulation

#![no_main]

use libfuzzer_sys::fuzz_target;
use onefs_core::OnePath;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = OnePath::parse(input) else {
        return;
    };

    // Canonical form is stable once reparsed
    let rendered = path.render();
    if let Ok(again) = OnePath::parse(&rendered) {
        assert_eq!(again.render(), rendered);
    }

    let _ = path.literal();
    let _ = path.name();
    let _ = path.root();
    assert!(path.ancestors().count() <= path.segments().len() + 3);

    if let Some(parent) = path.parent() {
        assert!(parent.segments().len() <= path.segments().len());
    }

    let head: String = input.chars().take(10).collect();
    let _ = path.join(&head);
    let _ = path.child(&head);
});
