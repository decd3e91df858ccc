//! Integration tests for process lifetimes, images, threads and stacks
//! rebuilt from synthetic event streams.

mod common;

use common::{
    TraceBuilder, KERNEL_PROCESS, KERNEL_THREAD, PERF_FREQ, PERF_INFO, START_UNIX_MS, USER_PROVIDER,
};
use pretty_assertions::assert_eq;
use trace_info_dumper::aggregator::{Process, ProcessLifetimeInfo};
use trace_info_dumper::parser::{EventKey, RawEvent};

#[test]
fn test_live_process_lifetime() {
    let mut builder = TraceBuilder::new();
    builder
        .advance(PERF_FREQ) // 1s after the header
        .process_start(1234, "tool.exe")
        .advance(PERF_FREQ / 2)
        .process_end(1234, 42);

    let data = builder.gather();
    assert_eq!(
        data.lifetimes[&Process::new(1234, "tool.exe")],
        ProcessLifetimeInfo {
            start_time_ms: Some(START_UNIX_MS + 1_000),
            end_time_ms: Some(START_UNIX_MS + 1_500),
            exit_code: Some(42),
        }
    );
}

#[test]
fn test_rundown_process_has_no_lifetime() {
    let mut builder = TraceBuilder::new();
    builder.advance(100).process_rundown(4, "System");

    let data = builder.gather();
    assert_eq!(data.processes, vec![Process::new(4, "System")]);
    assert_eq!(
        data.lifetimes[&Process::new(4, "System")],
        ProcessLifetimeInfo::default()
    );
}

#[test]
fn test_rundown_end_changes_nothing() {
    let mut builder = TraceBuilder::new();
    builder
        .advance(PERF_FREQ)
        .process_start(900, "long.exe")
        .advance(PERF_FREQ)
        .process_end_rundown(900);

    let data = builder.gather();
    assert_eq!(
        data.lifetimes[&Process::new(900, "long.exe")],
        ProcessLifetimeInfo {
            start_time_ms: Some(START_UNIX_MS + 1_000),
            end_time_ms: None,
            exit_code: None,
        }
    );
}

#[test]
fn test_process_before_header_has_no_start_time() {
    let mut builder = TraceBuilder::without_header();
    builder.advance(500).process_start(60, "early.exe");

    let data = builder.gather();
    assert_eq!(
        data.lifetimes[&Process::new(60, "early.exe")],
        ProcessLifetimeInfo::default()
    );
}

#[test]
fn test_pid_reuse_enumerates_both_processes() {
    let mut builder = TraceBuilder::new();
    builder
        .process_start(700, "old.exe")
        .advance(10)
        .process_end(700, 0)
        .advance(10)
        .process_start(700, "new.exe")
        .image_load(700, r"\Device\HarddiskVolume2\Windows\System32\ntdll.dll");

    let data = builder.gather();
    let old = Process::new(700, "old.exe");
    let new = Process::new(700, "new.exe");

    assert_eq!(data.processes, vec![old.clone(), new.clone()]);
    assert_eq!(data.lifetimes[&old].exit_code, Some(0));
    assert_eq!(data.lifetimes[&new].end_time_ms, None);
    assert_eq!(data.images[&new], vec!["ntdll.dll".to_string()]);
    assert!(!data.images.contains_key(&old));
}

#[test]
fn test_threads_of_unknown_processes_are_skipped() {
    let mut builder = TraceBuilder::new();
    builder
        .process_rundown(10, "known.exe")
        .thread_start(10, 11)
        .thread_start(99, 12);

    let data = builder.gather();
    assert_eq!(data.threads.len(), 1);
    assert_eq!(data.threads[&Process::new(10, "known.exe")], vec![11]);
    assert!(!data.threads.contains_key(&Process::unknown()));
}

#[test]
fn test_sentinel_only_in_event_and_stack_counts() {
    let mut builder = TraceBuilder::new();
    builder
        .process_rundown(10, "known.exe")
        .thread_start(10, 11)
        .user_event(Some(55), Some(56), 1);
    let origin = builder.now();
    builder.stack(55, 56, origin);

    let data = builder.gather();
    assert!(data.event_counts.contains_key(&Process::unknown()));
    assert!(data.stack_counts.contains_key(&Process::unknown()));

    assert!(!data.lifetimes.contains_key(&Process::unknown()));
    assert!(!data.images.contains_key(&Process::unknown()));
    assert!(!data.threads.contains_key(&Process::unknown()));
    assert!(!data.processes.iter().any(Process::is_unknown));
}

#[test]
fn test_stacks_are_counted_by_origin_event() {
    let mut builder = TraceBuilder::new();
    builder.process_rundown(300, "app.exe").thread_start(300, 301);

    builder.advance(5).user_event(Some(300), Some(301), 9);
    let user_event_time = builder.now();
    builder.advance(1).stack(300, 301, user_event_time);

    builder.advance(5).sample(301);
    let sample_time = builder.now();
    builder.stack(300, 301, sample_time);

    // no event happened on this thread at this time
    builder.advance(5).stack(300, 301, 12_345_678);

    let data = builder.gather();
    let counts = &data.stack_counts[&Process::new(300, "app.exe")];

    assert_eq!(counts[&EventKey::new(USER_PROVIDER, 9)], 1);
    assert_eq!(counts[&EventKey::new(PERF_INFO, 46)], 1);
    assert_eq!(counts.values().sum::<u64>(), 2);
}

#[test]
fn test_kernel_events_are_keyed_by_opcode() {
    let mut builder = TraceBuilder::new();
    builder
        .process_rundown(300, "app.exe")
        .thread_start(300, 301)
        .thread_start(300, 302);

    builder.advance(10).context_switch(301, 302);
    let switch_time = builder.now();
    builder.stack(300, 302, switch_time);

    builder.advance(10).ready_thread(301);
    let ready_time = builder.now();
    builder.stack(300, 301, ready_time);

    builder.advance(10).sample(302);
    let sample_time = builder.now();
    builder.stack(300, 302, sample_time);

    let data = builder.gather();
    let stacks = &data.stack_counts[&Process::new(300, "app.exe")];
    assert_eq!(stacks[&EventKey::new(KERNEL_THREAD, 36)], 1);
    assert_eq!(stacks[&EventKey::new(KERNEL_THREAD, 50)], 1);
    assert_eq!(stacks[&EventKey::new(PERF_INFO, 46)], 1);
    assert!(!stacks.contains_key(&EventKey::new(KERNEL_THREAD, 0)));

    // kernel events carry no header pid
    let events = &data.event_counts[&Process::unknown()];
    assert_eq!(events[&EventKey::new(KERNEL_PROCESS, 3)], 1);
    assert_eq!(events[&EventKey::new(KERNEL_THREAD, 1)], 2);
    assert_eq!(events[&EventKey::new(KERNEL_THREAD, 36)], 1);
    assert_eq!(events[&EventKey::new(KERNEL_THREAD, 50)], 1);
    assert!(!events.contains_key(&EventKey::new(KERNEL_THREAD, 0)));
}

#[test]
fn test_trace_logging_stack_origin_keeps_raw_id() {
    let mut builder = TraceBuilder::new();
    builder.process_rundown(300, "app.exe").advance(3);
    let time = builder.now();
    builder.raw(RawEvent {
        timestamp_raw: time,
        process_id: Some(300),
        thread_id: Some(301),
        provider_id: USER_PROVIDER,
        id: 0,
        opcode: 17,
        is_trace_logging: true,
        is_classic: false,
    });
    builder.advance(1).stack(300, 301, time);

    let data = builder.gather();
    let counts = &data.stack_counts[&Process::new(300, "app.exe")];
    assert_eq!(counts[&EventKey::new(USER_PROVIDER, 0)], 1);

    let events = &data.event_counts[&Process::new(300, "app.exe")];
    assert_eq!(events[&EventKey::new(USER_PROVIDER, 17)], 1);
}
