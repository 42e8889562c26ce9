// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dependency scanning
//!
//! A textual scan for `require("...")` call sites with a single string
//! literal argument. This is deliberately not a parse: specifiers built at
//! runtime are invisible to it, and matches inside strings or comments are
//! reported like real calls.

use regex::Regex;
use std::sync::LazyLock;

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^\w$.])require\s*\(\s*["']([^"']*)["']\s*\)"#)
        .expect("require pattern is valid")
});

/// Specifiers referenced by `source`, in order of appearance.
///
/// Duplicates are kept; the load queue and registry absorb them.
pub fn scan(source: &str) -> Vec<String> {
    REQUIRE_CALL
        .captures_iter(source)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
