//! End-to-end pipeline runs with fake scan / lookup / notify collaborators.

use docnag::engine::{Lookup, Notify, Scan};
use docnag::pipeline::{Collaborators, DISCOVERY, DISPATCH, ENRICHMENT, PipelineDriver};
use docnag::{
    CancelToken, DispatchError, DrainTimeoutError, FileTask, LookupError, NagOpts, RunSummary,
    StageWorkers,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Call = (String, PathBuf, usize);

/// Records every notify call, counts releases and detects overlapping invocations.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    releases: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    delay: Option<Duration>,
    fail_for: Option<String>,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl Notify for Recorder {
    fn notify(&mut self, identity: &str, file: &Path, line: usize) -> Result<(), DispatchError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(d) = self.delay {
            thread::sleep(d);
        }
        let result = if self.fail_for.as_deref() == Some(identity) {
            Err(DispatchError {
                identity: identity.to_string(),
                file: file.to_path_buf(),
                line,
                reason: "connection reset".to_string(),
            })
        } else {
            self.calls
                .lock()
                .unwrap()
                .push((identity.to_string(), file.to_path_buf(), line));
            Ok(())
        };
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fake_scan(found: Vec<(&str, Vec<usize>)>) -> impl Scan + 'static {
    let map: HashMap<PathBuf, Vec<usize>> = found
        .into_iter()
        .map(|(f, lines)| (PathBuf::from(f), lines))
        .collect();
    move |file: &Path| -> io::Result<Vec<(usize, String)>> {
        Ok(map
            .get(file)
            .map(|lines| lines.iter().map(|&l| (l, "public foo".to_string())).collect())
            .unwrap_or_default())
    }
}

/// Identity is `<stem>-author`; `failing` lines raise LookupError.
fn fake_lookup(failing: &[(&str, usize)]) -> impl Lookup + 'static {
    let failing: Vec<(PathBuf, usize)> = failing
        .iter()
        .map(|(f, l)| (PathBuf::from(f), *l))
        .collect();
    move |file: &Path, line: usize| -> Result<String, LookupError> {
        if failing.iter().any(|(f, l)| f == file && *l == line) {
            return Err(LookupError {
                file: file.to_path_buf(),
                line,
                reason: "git blame exited with 128".to_string(),
            });
        }
        let stem = file.file_stem().unwrap().to_string_lossy();
        Ok(format!("{stem}-author"))
    }
}

fn opts(workers: StageWorkers) -> NagOpts {
    NagOpts {
        workers,
        ..Default::default()
    }
}

fn tasks(files: &[&str]) -> Vec<FileTask> {
    files.iter().map(|f| FileTask::from(PathBuf::from(f))).collect()
}

fn run(
    files: &[&str],
    collaborators: Collaborators,
    notifier: Recorder,
    workers: StageWorkers,
) -> anyhow::Result<RunSummary> {
    let files = tasks(files);
    PipelineDriver::new(collaborators, notifier, &opts(workers)).run(move || Ok(files))
}

const WORKER_CONFIGS: [StageWorkers; 4] = [
    StageWorkers {
        discovery: 1,
        enrichment: 1,
        dispatch: 1,
    },
    StageWorkers {
        discovery: 2,
        enrichment: 3,
        dispatch: 1,
    },
    StageWorkers {
        discovery: 4,
        enrichment: 8,
        dispatch: 2,
    },
    StageWorkers {
        discovery: 1,
        enrichment: 16,
        dispatch: 8,
    },
];

#[test]
fn test_single_declaration_notifies_once() {
    let recorder = Recorder::default();
    let scan = fake_scan(vec![("a.src", vec![3]), ("b.src", vec![])]);
    let lookup = |_: &Path, _: usize| -> Result<String, LookupError> { Ok("alice".to_string()) };
    let summary = run(
        &["a.src", "b.src"],
        Collaborators::new(scan, lookup),
        recorder.clone(),
        StageWorkers::default(),
    )
    .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![("alice".to_string(), PathBuf::from("a.src"), 3)]
    );
    assert_eq!(summary.files, 2);
    assert_eq!(summary.line_tasks, 1);
    assert_eq!(summary.annotated, 1);
    assert_eq!(summary.notified, 1);
    assert!(summary.failures.is_empty());
    assert!(!summary.cancelled);
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fan_out_reaches_dispatch_for_any_worker_count() {
    for workers in WORKER_CONFIGS {
        let recorder = Recorder::default();
        let summary = run(
            &["c.src"],
            Collaborators::new(fake_scan(vec![("c.src", vec![1, 10, 20])]), fake_lookup(&[])),
            recorder.clone(),
            workers,
        )
        .unwrap();
        let lines: Vec<usize> = recorder.calls().into_iter().map(|(_, _, l)| l).collect();
        assert_eq!(lines, vec![1, 10, 20], "workers: {:?}", workers);
        assert_eq!(summary.discovery.completed, 1);
        assert_eq!(summary.line_tasks, 3);
    }
}

#[test]
fn test_no_task_lost_or_duplicated() {
    let names: Vec<String> = (0..30).map(|i| format!("f{i}.src")).collect();
    let found: Vec<(&str, Vec<usize>)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), (1..=(i % 6)).map(|l| l * 7).collect()))
        .collect();
    let mut expected: Vec<Call> = found
        .iter()
        .flat_map(|(n, ls)| {
            let stem = n.trim_end_matches(".src").to_string();
            ls.iter()
                .map(move |&l| (format!("{stem}-author"), PathBuf::from(*n), l))
        })
        .collect();
    expected.sort();
    let file_names: Vec<&str> = names.iter().map(String::as_str).collect();

    for workers in WORKER_CONFIGS {
        let recorder = Recorder::default();
        let summary = run(
            &file_names,
            Collaborators::new(fake_scan(found.clone()), fake_lookup(&[])),
            recorder.clone(),
            workers,
        )
        .unwrap();
        assert_eq!(recorder.calls(), expected, "workers: {:?}", workers);
        assert_eq!(summary.annotated, expected.len());
        assert_eq!(summary.notified, expected.len());
        assert_eq!(summary.dispatch.total(), summary.annotated);
        assert_eq!(summary.enrichment.total(), summary.line_tasks);
    }
}

#[test]
fn test_notify_never_overlaps() {
    let names: Vec<String> = (0..10).map(|i| format!("m{i}.src")).collect();
    let found: Vec<(&str, Vec<usize>)> = names.iter().map(|n| (n.as_str(), vec![1, 2, 3])).collect();
    let file_names: Vec<&str> = names.iter().map(String::as_str).collect();
    let recorder = Recorder {
        delay: Some(Duration::from_millis(2)),
        ..Default::default()
    };
    let summary = run(
        &file_names,
        Collaborators::new(fake_scan(found), fake_lookup(&[])),
        recorder.clone(),
        StageWorkers {
            discovery: 4,
            enrichment: 8,
            dispatch: 8,
        },
    )
    .unwrap();
    assert_eq!(summary.notified, 30);
    assert_eq!(recorder.overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn test_lookup_failure_drops_only_that_task() {
    for workers in WORKER_CONFIGS {
        let recorder = Recorder::default();
        let summary = run(
            &["d.src", "e.src"],
            Collaborators::new(
                fake_scan(vec![("d.src", vec![5, 6]), ("e.src", vec![1])]),
                fake_lookup(&[("d.src", 5)]),
            ),
            recorder.clone(),
            workers,
        )
        .unwrap();
        let got: Vec<(PathBuf, usize)> = recorder
            .calls()
            .into_iter()
            .map(|(_, f, l)| (f, l))
            .collect();
        assert_eq!(
            got,
            vec![(PathBuf::from("d.src"), 6), (PathBuf::from("e.src"), 1)]
        );
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].stage, ENRICHMENT);
        assert_eq!(summary.failures[0].task, "d.src:5");
        assert_eq!(summary.enrichment.failed, 1);
        assert_eq!(summary.annotated, 2);
    }
}

#[test]
fn test_dispatch_failure_does_not_stop_others() {
    let recorder = Recorder {
        fail_for: Some("bad-author".to_string()),
        ..Default::default()
    };
    let summary = run(
        &["bad.src", "good.src"],
        Collaborators::new(
            fake_scan(vec![("bad.src", vec![1, 2]), ("good.src", vec![3])]),
            fake_lookup(&[]),
        ),
        recorder.clone(),
        StageWorkers::uniform(2),
    )
    .unwrap();
    assert_eq!(
        recorder.calls(),
        vec![("good-author".to_string(), PathBuf::from("good.src"), 3)]
    );
    assert_eq!(summary.dispatch.failed, 2);
    assert_eq!(summary.notified, 1);
    assert!(summary.failures.iter().all(|f| f.stage == DISPATCH));
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scan_error_is_a_discovery_failure() {
    let scan = |file: &Path| -> io::Result<Vec<(usize, String)>> {
        if file == Path::new("unreadable.src") {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        Ok(vec![(4, "public x".to_string())])
    };
    let recorder = Recorder::default();
    let summary = run(
        &["unreadable.src", "ok.src"],
        Collaborators::new(scan, fake_lookup(&[])),
        recorder.clone(),
        StageWorkers::uniform(2),
    )
    .unwrap();
    assert_eq!(summary.notified, 1);
    assert_eq!(summary.discovery.failed, 1);
    assert_eq!(summary.failures[0].stage, DISCOVERY);
}

#[test]
fn test_enumerator_failure_is_fatal_and_releases_channel() {
    let recorder = Recorder::default();
    let driver = PipelineDriver::new(
        Collaborators::new(fake_scan(vec![]), fake_lookup(&[])),
        recorder.clone(),
        &opts(StageWorkers::uniform(2)),
    );
    let result = driver.run(|| anyhow::bail!("walk failed"));
    assert!(result.is_err());
    assert!(recorder.calls().is_empty());
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drain_timeout_errors_and_releases_channel() {
    let slow_lookup = |_: &Path, _: usize| -> Result<String, LookupError> {
        thread::sleep(Duration::from_millis(500));
        Ok("slow".to_string())
    };
    let recorder = Recorder::default();
    let driver = PipelineDriver::new(
        Collaborators::new(fake_scan(vec![("s.src", vec![1])]), slow_lookup),
        recorder.clone(),
        &NagOpts {
            workers: StageWorkers::uniform(1),
            drain_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );
    let files = tasks(&["s.src"]);
    let err = driver.run(move || Ok(files)).unwrap_err();
    let timeout = err.downcast_ref::<DrainTimeoutError>().unwrap();
    assert_eq!(timeout.queue, ENRICHMENT);
    assert_eq!(timeout.pending, 1);
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drain_timeout_returns_while_notify_is_stuck() {
    let recorder = Recorder {
        delay: Some(Duration::from_millis(1500)),
        ..Default::default()
    };
    let driver = PipelineDriver::new(
        Collaborators::new(fake_scan(vec![("s.src", vec![1, 2, 3])]), fake_lookup(&[])),
        recorder.clone(),
        &NagOpts {
            workers: StageWorkers::uniform(1),
            drain_timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        },
    );
    let files = tasks(&["s.src"]);
    let started = Instant::now();
    let err = driver.run(move || Ok(files)).unwrap_err();
    let elapsed = started.elapsed();

    let timeout = err.downcast_ref::<DrainTimeoutError>().unwrap();
    assert_eq!(timeout.queue, DISPATCH);
    assert!(elapsed < Duration::from_millis(1000), "run took {elapsed:?}");
    // the channel was held by the stuck call, so release was skipped rather than awaited
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 0);

    // once the stuck call returns, the remaining tasks never reach the channel
    thread::sleep(Duration::from_millis(2500));
    assert_eq!(recorder.calls().len(), 1);
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 0);
}

#[test]
fn test_drain_timeout_cancels_remaining_work() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&lookups);
    let slow_lookup = move |_: &Path, _: usize| -> Result<String, LookupError> {
        counted.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(300));
        Ok("slow".to_string())
    };
    let recorder = Recorder::default();
    let driver = PipelineDriver::new(
        Collaborators::new(fake_scan(vec![("s.src", vec![1, 2, 3, 4])]), slow_lookup),
        recorder.clone(),
        &NagOpts {
            workers: StageWorkers::uniform(1),
            drain_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        },
    );
    let files = tasks(&["s.src"]);
    let err = driver.run(move || Ok(files)).unwrap_err();
    assert!(err.downcast_ref::<DrainTimeoutError>().is_some());
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(800));
    // only the lookup in flight at the timeout ran; nothing was sent after release
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
    assert!(recorder.calls().is_empty());
}

#[test]
fn test_cancelled_run_still_drains() {
    let recorder = Recorder::default();
    let cancel = CancelToken::new();
    cancel.cancel();
    let files = tasks(&["a.src", "b.src", "c.src"]);
    let summary = PipelineDriver::new(
        Collaborators::new(fake_scan(vec![("a.src", vec![1]), ("b.src", vec![2])]), fake_lookup(&[])),
        recorder.clone(),
        &opts(StageWorkers::uniform(2)),
    )
    .with_cancel(cancel)
    .run(move || Ok(files))
    .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.discovery.skipped, 3);
    assert_eq!(summary.notified, 0);
    assert!(recorder.calls().is_empty());
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_run_completes() {
    let recorder = Recorder::default();
    let summary = run(
        &[],
        Collaborators::new(fake_scan(vec![]), fake_lookup(&[])),
        recorder.clone(),
        StageWorkers::uniform(3),
    )
    .unwrap();
    assert_eq!(summary.files, 0);
    assert_eq!(summary.notified, 0);
    assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_independent_runs_in_one_process() {
    let handles: Vec<_> = (0..3)
        .map(|i| {
            thread::spawn(move || {
                let recorder = Recorder::default();
                let name = format!("r{i}.src");
                let summary = run(
                    &[name.as_str()],
                    Collaborators::new(fake_scan(vec![(name.as_str(), vec![1, 2])]), fake_lookup(&[])),
                    recorder.clone(),
                    StageWorkers::uniform(2),
                )
                .unwrap();
                (summary.notified, recorder.calls().len())
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (2, 2));
    }
}
