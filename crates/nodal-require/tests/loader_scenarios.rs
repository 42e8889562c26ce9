// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end loader sessions over an in-memory transport

use nodal_require::{
    factory, LinkedHost, LoaderConfig, LoaderContext, LoaderError, MemoryFetcher, ModuleError,
    ModuleKind, RequireRequest, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

fn context(fetcher: &Arc<MemoryFetcher>, host: LinkedHost) -> LoaderContext {
    LoaderContext::new(LoaderConfig::default(), fetcher.clone()).with_host(host)
}

fn set(exports: &Value, key: &str, value: impl Into<Value>) {
    exports.as_object().unwrap().set(key, value);
}

#[tokio::test]
async fn test_app_scenario_fetches_dependencies_before_callback() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/app.js", "var u = require(\"./util\"); var l = require(\"lib\");")
            .with("http://h/util.js", "exports.name = 'util';")
            .with("http://h/node_modules/lib.js", "exports.name = 'lib';"),
    );

    let mut host = LinkedHost::new();
    host.link("http://h/app.js", |require, exports, _, _, _| {
        set(exports, "util", require.call("./util")?.get("name"));
        set(exports, "lib", require.call("lib")?.get("name"));
        Ok(())
    });
    host.link("http://h/util.js", |_, exports, _, _, _| {
        set(exports, "name", "util");
        Ok(())
    });
    host.link("http://h/node_modules/lib.js", |_, exports, _, _, _| {
        set(exports, "name", "lib");
        Ok(())
    });

    let mut loader = context(&fetcher, host);
    let seen = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&seen);

    let app = loader
        .require_async(
            RequireRequest::new("./app")
                .origin("http://h")
                .on_ready(move |module, id| {
                    *slot.borrow_mut() = Some((id.to_string(), module.exports()));
                }),
        )
        .await
        .unwrap();

    let requests = fetcher.requests();
    assert_eq!(requests[0], "http://h/app.js");
    assert!(requests.contains(&"http://h/util.js".to_string()));
    assert!(requests.contains(&"http://h/node_modules/lib.js".to_string()));
    assert_eq!(requests.len(), 3);

    let (id, exports) = seen.borrow_mut().take().unwrap();
    assert_eq!(id, "./app");
    assert!(exports.same_value(&app.exports()));
    assert_eq!(exports.get("util").as_str(), Some("util"));
    assert_eq!(exports.get("lib").as_str(), Some("lib"));
}

#[tokio::test]
async fn test_drain_waits_for_transitive_dependencies() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/a.js", "require('./b'); require('./c');")
            .with("http://h/b.js", "require('./d');")
            .with("http://h/c.js", "")
            .with("http://h/d.js", ""),
    );
    let mut loader = context(&fetcher, LinkedHost::new());

    let drains = Rc::new(Cell::new(0));
    let counter = Rc::clone(&drains);
    loader.on_drain(move |_| counter.set(counter.get() + 1));

    let root = loader.preload("./a", "http://h").await.unwrap();

    assert_eq!(drains.get(), 1);
    for address in ["http://h/b.js", "http://h/c.js", "http://h/d.js"] {
        let module = loader.registry().get(address).unwrap();
        assert!(module.borrow().is_loaded(), "{} not loaded", address);
    }
    assert!(!root.is_initialized());
}

#[tokio::test]
async fn test_duplicate_requests_fetch_once() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/app.js", "require('./x'); require('./x'); require('./a');")
            .with("http://h/a.js", "require('./x');")
            .with("http://h/x.js", ""),
    );
    let mut loader = context(&fetcher, LinkedHost::new());
    loader.preload("./app", "http://h").await.unwrap();

    assert_eq!(fetcher.request_count("http://h/x.js"), 1);
    assert_eq!(fetcher.requests().len(), 3);
}

#[tokio::test]
async fn test_shared_dependency_runs_once() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/app.js", "require('./a'); require('./b'); require('./c');")
            .with("http://h/a.js", "require('./shared');")
            .with("http://h/b.js", "require('./shared');")
            .with("http://h/c.js", "require('./shared');")
            .with("http://h/shared.js", ""),
    );

    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let mut host = LinkedHost::new();
    host.link("http://h/shared.js", move |_, exports, _, _, _| {
        counter.set(counter.get() + 1);
        set(exports, "ready", true);
        Ok(())
    });
    for name in ["a", "b", "c"] {
        host.link(format!("http://h/{}.js", name), |require, exports, _, _, _| {
            set(exports, "shared", require.call("./shared")?);
            Ok(())
        });
    }
    host.link("http://h/app.js", |require, exports, _, _, _| {
        for name in ["a", "b", "c"] {
            set(exports, name, require.call(&format!("./{}", name))?);
        }
        Ok(())
    });

    let mut loader = context(&fetcher, host);
    let app = loader
        .require_async(RequireRequest::new("./app").origin("http://h"))
        .await
        .unwrap();

    assert_eq!(runs.get(), 1);
    let exports = app.exports();
    let from_a = exports.get("a").get("shared");
    assert!(from_a.same_value(&exports.get("b").get("shared")));
    assert!(from_a.same_value(&exports.get("c").get("shared")));
    assert!(matches!(from_a.get("ready"), Value::Boolean(true)));
}

#[tokio::test]
async fn test_missing_local_module_does_not_ascend() {
    let fetcher = Arc::new(
        MemoryFetcher::new().with("http://h/dir/app.js", "require('./missing');"),
    );
    let mut loader = context(&fetcher, LinkedHost::new());

    let err = loader
        .require_async(RequireRequest::new("./app").origin("http://h/dir"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoaderError::Module(ModuleError::FetchFailure { ref address, status: Some(404), .. })
            if address == "http://h/dir/missing.js"
    ));
    assert_eq!(
        fetcher.requests(),
        vec!["http://h/dir/app.js", "http://h/dir/missing.js"]
    );
}

#[tokio::test]
async fn test_missing_root_is_terminal() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let mut loader = context(&fetcher, LinkedHost::new());
    let called = Rc::new(Cell::new(false));
    let flag = Rc::clone(&called);

    let err = loader
        .require_async(
            RequireRequest::new("./app")
                .origin("http://h")
                .on_ready(move |_, _| flag.set(true)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Module(ModuleError::FetchFailure { .. })));
    assert!(!called.get());
    assert!(loader.registry().get("http://h/app.js").unwrap().error().is_some());
}

#[tokio::test]
async fn test_nodal_ascent_converges_three_aliases() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/a/b/app.js", "require('bar');")
            .with("http://h/node_modules/bar.js", ""),
    );

    let mut host = LinkedHost::new();
    host.link("http://h/node_modules/bar.js", |_, exports, _, _, _| {
        set(exports, "bar", true);
        Ok(())
    });
    host.link("http://h/a/b/app.js", |require, exports, _, _, _| {
        set(exports, "bar", require.call("bar")?);
        Ok(())
    });

    let mut loader = context(&fetcher, host);
    let app = loader
        .require_async(RequireRequest::new("./app").origin("http://h/a/b"))
        .await
        .unwrap();

    let registry = loader.registry();
    let winner = registry.get("http://h/node_modules/bar.js").unwrap();
    for alias in [
        "http://h/a/b/node_modules/bar.js",
        "http://h/a/node_modules/bar.js",
    ] {
        assert!(registry.get(alias).unwrap().ptr_eq(&winner), "{} diverged", alias);
    }
    assert_eq!(winner.address(), "http://h/node_modules/bar.js");
    assert_eq!(winner.kind(), ModuleKind::Nodal);
    assert_eq!(registry.aliases_of(&winner).len(), 3);
    assert!(app.exports().get("bar").same_value(&winner.exports()));
    assert!(winner.error().is_none());
}

#[tokio::test]
async fn test_second_search_converges_on_first() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/a/app.js", "require('lib'); require('./sub/s');")
            .with("http://h/a/sub/s.js", "require('lib');")
            .with("http://h/node_modules/lib.js", ""),
    );
    let mut loader = context(&fetcher, LinkedHost::new());
    loader.preload("./app", "http://h/a").await.unwrap();

    assert_eq!(fetcher.request_count("http://h/node_modules/lib.js"), 1);
    assert_eq!(fetcher.request_count("http://h/a/node_modules/lib.js"), 1);

    let registry = loader.registry();
    let lib = registry.get("http://h/node_modules/lib.js").unwrap();
    assert!(registry.get("http://h/a/sub/node_modules/lib.js").unwrap().ptr_eq(&lib));
    assert!(registry.get("http://h/a/node_modules/lib.js").unwrap().ptr_eq(&lib));
}

#[tokio::test]
async fn test_lineage_exhausted() {
    let fetcher = Arc::new(MemoryFetcher::new().with("http://h/a/app.js", "require('nope');"));
    let mut loader = context(&fetcher, LinkedHost::new());

    let err = loader.preload("./app", "http://h/a").await.unwrap_err();
    match err {
        LoaderError::Module(ModuleError::LineageExhausted { specifier, tried }) => {
            assert_eq!(specifier, "nope");
            assert_eq!(
                tried,
                vec!["http://h/a/node_modules/nope.js", "http://h/node_modules/nope.js"]
            );
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_callback_fires_after_initialization() {
    let fetcher = Arc::new(MemoryFetcher::new().with("http://h/app.js", ""));
    let mut host = LinkedHost::new();
    host.link("http://h/app.js", |_, exports, _, _, _| {
        set(exports, "done", true);
        Ok(())
    });
    let mut loader = context(&fetcher, host);

    let observed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&observed);
    loader
        .require_async(RequireRequest::new("./app").origin("http://h").on_ready(
            move |module, _| {
                flag.set(module.is_initialized() && !module.exports().get("done").is_undefined());
            },
        ))
        .await
        .unwrap();

    assert!(observed.get());
}

#[tokio::test]
async fn test_execution_failure_does_not_stop_siblings() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/app.js", "require('./bad'); require('./good');")
            .with("http://h/bad.js", "")
            .with("http://h/good.js", ""),
    );
    let mut host = LinkedHost::new();
    host.link("http://h/bad.js", |_, _, _, _, _| anyhow::bail!("boom"));
    host.link("http://h/good.js", |_, exports, _, _, _| {
        set(exports, "ok", true);
        Ok(())
    });
    host.link("http://h/app.js", |require, exports, _, _, _| {
        require.call("./bad")?;
        set(exports, "good", require.call("./good")?);
        Ok(())
    });

    let mut loader = context(&fetcher, host);
    let app = loader
        .require_async(RequireRequest::new("./app").origin("http://h"))
        .await
        .unwrap();

    assert!(app.error().is_none());
    assert!(matches!(app.exports().get("good").get("ok"), Value::Boolean(true)));
    let bad = loader.registry().get("http://h/bad.js").unwrap();
    assert!(matches!(bad.error(), Some(ModuleError::ExecutionFailure { .. })));
}

#[tokio::test]
async fn test_cycle_loads_and_initializes() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/a.js", "require('./b');")
            .with("http://h/b.js", "require('./a');"),
    );
    let mut host = LinkedHost::new();
    host.link("http://h/a.js", |require, exports, _, _, _| {
        set(exports, "early", 1.0);
        set(exports, "b", require.call("./b")?);
        Ok(())
    });
    host.link("http://h/b.js", |require, exports, _, _, _| {
        set(exports, "a_early", require.call("./a")?.get("early"));
        Ok(())
    });

    let mut loader = context(&fetcher, host);
    let a = loader
        .require_async(RequireRequest::new("./a").origin("http://h"))
        .await
        .unwrap();
    assert_eq!(a.exports().get("b").get("a_early").as_number(), Some(1.0));
}

#[tokio::test]
async fn test_second_session_reuses_registry() {
    let fetcher = Arc::new(MemoryFetcher::new().with("http://h/app.js", ""));
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let mut host = LinkedHost::new();
    host.link("http://h/app.js", move |_, _, _, _, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    let mut loader = context(&fetcher, host);

    let first = loader
        .require_async(RequireRequest::new("./app").origin("http://h"))
        .await
        .unwrap();
    let fired = Rc::new(Cell::new(false));
    let flag = Rc::clone(&fired);
    let second = loader
        .require_async(
            RequireRequest::new("./APP")
                .origin("http://h")
                .on_ready(move |_, id| flag.set(id == "./APP")),
        )
        .await
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(runs.get(), 1);
    assert_eq!(fetcher.requests().len(), 1);
    assert!(fired.get());
}

#[tokio::test]
async fn test_functional_overwrite_leaves_stale_exports() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let mut loader = context(&fetcher, LinkedHost::new());

    let first = loader
        .require_from_factory(
            "./svc",
            "http://h",
            factory(|_, exports, _, _, _| {
                set(exports, "version", 1.0);
                Ok(())
            }),
        )
        .unwrap();
    let held = loader.require("./svc", "http://h").unwrap();

    loader
        .require_from_factory(
            "./svc",
            "http://h",
            factory(|_, _, module, _, _| {
                module.set_exports(Value::from("v2"));
                Ok(())
            }),
        )
        .unwrap();

    assert!(held.same_value(&first.exports()));
    assert_eq!(held.get("version").as_number(), Some(1.0));
    assert_eq!(loader.require("./svc", "http://h").unwrap().as_str(), Some("v2"));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_base_address_resolves_empty_origin() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/static/app.js", "require('/lib/x');")
            .with("http://h/static/lib/x.js", ""),
    );
    let mut config = LoaderConfig::default();
    config.set("base-address", "http://h/static/").unwrap();
    let mut loader = LoaderContext::new(config, fetcher.clone());

    loader.preload("./app", "").await.unwrap();
    assert!(loader.registry().contains("http://h/static/lib/x.js"));
}

#[tokio::test]
async fn test_failed_dependency_is_reported_by_later_sessions() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with("http://h/a.js", "require('./gone');")
            .with("http://h/b.js", "require('./gone');"),
    );
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let mut host = LinkedHost::new();
    host.link("http://h/b.js", move |require, _, _, _, _| {
        counter.set(counter.get() + 1);
        require.call("./gone")?;
        Ok(())
    });
    let mut loader = context(&fetcher, host);

    let is_gone = |err: &LoaderError| {
        matches!(
            err,
            LoaderError::Module(ModuleError::FetchFailure { address, .. })
                if address == "http://h/gone.js"
        )
    };

    let first = loader.preload("./a", "http://h").await.unwrap_err();
    assert!(is_gone(&first));

    // b is fetched fresh, but gone.js is already known to be missing
    let second = loader.preload("./b", "http://h").await.unwrap_err();
    assert!(is_gone(&second));

    // b is now registered and loaded; the failure below it still surfaces
    let called = Rc::new(Cell::new(false));
    let flag = Rc::clone(&called);
    let third = loader
        .require_async(
            RequireRequest::new("./b")
                .origin("http://h")
                .on_ready(move |_, _| flag.set(true)),
        )
        .await
        .unwrap_err();
    assert!(is_gone(&third));

    assert_eq!(fetcher.request_count("http://h/gone.js"), 1);
    assert_eq!(runs.get(), 0);
    assert!(!called.get());
}
