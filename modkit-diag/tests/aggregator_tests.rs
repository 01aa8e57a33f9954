//! 诊断聚合器行为测试

mod common;
use common::{collect_events, messages, unlimited, with_rate};
use modkit_diag::{Diagnostics, ErrorEntry, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ===== mod id 规范化与过滤 =====

#[test]
fn test_absent_mod_id_becomes_unknown() {
    let diag = Diagnostics::with_defaults();
    diag.report(None, "no owner");
    diag.report(Some(""), "empty owner");

    let entries = diag.errors(Some("unknown"));
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.mod_id == "unknown"));
}

#[test]
fn test_errors_filters_by_mod() {
    let diag = Diagnostics::with_defaults();
    diag.report(Some("a"), "from a");
    diag.warn(Some("b"), "from b");
    diag.info(Some("a"), "again a");

    let a = diag.errors(Some("a"));
    assert_eq!(messages(&a), vec!["from a", "again a"]);
    assert!(a.iter().all(|e| e.mod_id == "a"));

    let all = diag.errors(None);
    assert_eq!(messages(&all), vec!["from a", "from b", "again a"]);
    assert!(diag.errors(Some("missing")).is_empty());
}

// ===== 容量 =====

#[test]
fn test_per_mod_cap_evicts_oldest() {
    let diag = unlimited(200, 1000);
    for i in 0..250 {
        diag.report(Some("busy"), format!("msg {i}"));
    }

    let entries = diag.errors(Some("busy"));
    assert_eq!(entries.len(), 200);
    assert_eq!(entries[0].message, "msg 50");
    assert_eq!(entries[199].message, "msg 249");
}

#[test]
fn test_global_cap_evicts_oldest() {
    let diag = unlimited(200, 1000);
    for m in 0..6 {
        for i in 0..200 {
            diag.report(Some(&format!("mod{m}")), format!("{m}-{i}"));
        }
    }

    let recent = diag.recent_errors();
    assert_eq!(recent.len(), 1000);
    assert_eq!(recent[0].message, "1-0");
    assert_eq!(recent[999].message, "5-199");
    // 全局淘汰不影响 mod 视图
    assert_eq!(diag.errors(Some("mod0")).len(), 200);
    assert_eq!(diag.stats().evicted_from_global, 200);
}

// ===== 去重 =====

#[test]
fn test_consecutive_duplicates_collapse() {
    let diag = Diagnostics::with_defaults();
    for _ in 0..3 {
        diag.report(Some("m"), "same");
    }

    let entries = diag.errors(Some("m"));
    assert_eq!(entries.len(), 1);
    assert!(entries[0].occurrence_count >= 3);
}

#[test]
fn test_distinct_messages_never_collapse() {
    let diag = Diagnostics::with_defaults();
    diag.report(Some("m"), "first");
    diag.report(Some("m"), "second");

    let entries = diag.errors(Some("m"));
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.occurrence_count == 1));
}

#[test]
fn test_same_message_from_other_mod_is_separate() {
    let diag = Diagnostics::with_defaults();
    diag.report(Some("a"), "shared");
    diag.report(Some("b"), "shared");
    assert_eq!(diag.recent_errors().len(), 2);
}

// ===== 限速 =====

#[test]
fn test_eleventh_distinct_message_is_dropped() {
    let diag = Diagnostics::with_defaults();
    for i in 0..10 {
        diag.report(Some("fresh"), format!("distinct {i}"));
    }
    diag.report(Some("fresh"), "distinct 10");

    let entries = diag.errors(Some("fresh"));
    assert_eq!(entries.len(), 10);
    assert!(!messages(&entries).contains(&"distinct 10".to_string()));
    assert_eq!(diag.stats().dropped_by_rate_limit, 1);
}

#[test]
fn test_duplicate_does_not_consume_token() {
    let diag = Diagnostics::with_defaults();
    for i in 0..10 {
        diag.report(Some("m"), format!("distinct {i}"));
    }
    diag.report(Some("m"), "distinct 9");

    let entries = diag.errors(Some("m"));
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[9].occurrence_count, 2);
}

#[test]
fn test_rate_limit_is_per_mod() {
    let diag = with_rate(2, 60_000);
    for i in 0..3 {
        diag.report(Some("a"), format!("a{i}"));
        diag.report(Some("b"), format!("b{i}"));
    }
    assert_eq!(diag.errors(Some("a")).len(), 2);
    assert_eq!(diag.errors(Some("b")).len(), 2);
}

#[test]
fn test_bucket_refills_after_interval() {
    let diag = with_rate(1, 20);
    diag.report(Some("m"), "one");
    diag.report(Some("m"), "two");
    assert_eq!(diag.errors(Some("m")).len(), 1);

    thread::sleep(Duration::from_millis(40));
    diag.report(Some("m"), "three");
    assert_eq!(messages(&diag.errors(Some("m"))), vec!["one", "three"]);
}

// ===== 清空 =====

#[test]
fn test_clear_empties_every_view() {
    let diag = Diagnostics::with_defaults();
    diag.report(Some("a"), "x");
    diag.warn(None, "y");

    diag.clear();
    assert!(diag.errors(None).is_empty());
    assert!(diag.errors(Some("a")).is_empty());
    assert!(diag.recent_errors().is_empty());
    assert!(diag.mods().is_empty());
}

// ===== OnError =====

#[test]
fn test_on_error_fires_once_per_accepted_entry() {
    let diag = with_rate(2, 60_000);
    let events = collect_events(&diag);

    diag.report(Some("m"), "a");
    diag.report(Some("m"), "a");
    diag.report(Some("m"), "b");
    diag.report(Some("m"), "c"); // 被限速

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].occurrence_count, 1);
    assert_eq!(events[1].message, "a");
    assert_eq!(events[1].occurrence_count, 2);
    assert_eq!(events[2].message, "b");
    assert_eq!(events[2].severity, Severity::Error);
}

#[test]
fn test_on_error_is_synchronous() {
    let diag = Diagnostics::with_defaults();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    diag.subscribe(move |_: &ErrorEntry| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    diag.info(Some("m"), "x");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscriber_may_report_reentrantly() {
    let diag = Diagnostics::with_defaults();
    let inner = Arc::clone(&diag);
    diag.subscribe(move |entry: &ErrorEntry| {
        if entry.mod_id != "watcher" {
            inner.info(Some("watcher"), format!("saw {}", entry.message));
        }
    });

    diag.report(Some("m"), "boom");
    assert_eq!(messages(&diag.errors(Some("watcher"))), vec!["saw boom"]);
}

#[test]
fn test_panicking_subscriber_does_not_break_report() {
    let diag = Diagnostics::with_defaults();
    diag.subscribe(|_: &ErrorEntry| panic!("subscriber failure"));
    let events = collect_events(&diag);

    diag.report(Some("m"), "still recorded");
    assert_eq!(diag.errors(Some("m")).len(), 1);
    assert_eq!(events.lock().unwrap().len(), 1);
}

// ===== 并发 =====

#[test]
fn test_concurrent_reports() {
    let diag = unlimited(200, 1000);
    let events = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&events);
    diag.subscribe(move |_: &ErrorEntry| {
        *counter.lock().unwrap() += 1;
    });

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let diag = Arc::clone(&diag);
            thread::spawn(move || {
                for i in 0..50 {
                    diag.report(Some(&format!("thread{t}")), format!("msg {i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(diag.recent_errors().len(), 400);
    assert_eq!(diag.mods().len(), 8);
    assert_eq!(*events.lock().unwrap(), 400);
    for t in 0..8 {
        let entries = diag.errors(Some(&format!("thread{t}")));
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[49].message, "msg 49");
    }
}
