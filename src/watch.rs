//! Watch mode: rebuild whenever a source changes.
//!
//! Watched, via the platform's recommended `notify` backend:
//!
//! - the input directory (recursive)
//! - the partials directory (recursive)
//! - every values file
//!
//! Changes inside the output directory or any `.git` directory are dropped,
//! so the generator's own writes never trigger a rebuild.
//!
//! Events are coalesced in [`WINDOW`]-long windows: the first relevant event
//! opens a window, later events inside it are folded in, and when it closes
//! exactly one rebuild runs on the loop thread. Rebuilds therefore never
//! overlap.
//!
//! A failed rebuild is logged and the loop keeps watching; the previous
//! output stays in place. A watcher error ends the loop with an error.

use crate::config::SiteConfig;
use crate::rebuild::{BuildError, rebuild};
use crate::types::BuildReport;
use log::{debug, error, info};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Coalescing window; at most one rebuild per window.
pub const WINDOW: Duration = Duration::from_millis(100);

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("cannot resolve watched path {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn canonical(path: &Path) -> Result<PathBuf, WatchError> {
    fs::canonicalize(path).map_err(|source| WatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether a change at `path` should trigger a rebuild.
fn is_relevant_path(path: &Path, output_dir: &Path) -> bool {
    !path.starts_with(output_dir)
        && !path
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
}

/// The first path of `event` that should trigger a rebuild, if any.
fn trigger_path(event: &Event, output_dir: &Path) -> Option<PathBuf> {
    if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
        return None;
    }
    event
        .paths
        .iter()
        .find(|p| is_relevant_path(p, output_dir))
        .cloned()
}

/// Folds the events of one window into a single rebuild trigger.
#[derive(Debug, Default)]
struct Coalescer {
    pending: Option<PathBuf>,
    opened: Option<Instant>,
    folded: usize,
}

impl Coalescer {
    fn add(&mut self, path: PathBuf) {
        if self.pending.is_none() {
            self.pending = Some(path);
            self.opened = Some(Instant::now());
        } else {
            self.folded += 1;
        }
    }

    fn ready(&self) -> bool {
        self.opened.is_some_and(|t| t.elapsed() >= WINDOW)
    }

    fn take(&mut self) -> Option<(PathBuf, usize)> {
        self.opened = None;
        let folded = std::mem::take(&mut self.folded);
        self.pending.take().map(|path| (path, folded))
    }

    /// How long to wait for the next event.
    fn timeout(&self) -> Duration {
        match self.opened {
            Some(t) => WINDOW.saturating_sub(t.elapsed()),
            None => IDLE_TIMEOUT,
        }
    }
}

fn report_cycle(
    result: Result<BuildReport, BuildError>,
    on_build: &mut impl FnMut(&BuildReport),
) {
    match result {
        Ok(report) => on_build(&report),
        Err(e) => error!("Build failed, previous output kept: {e}"),
    }
}

/// Build once, then rebuild on every change until the watcher shuts down.
///
/// `on_build` is called after every successful cycle.
pub fn watch(
    root: &Path,
    config: &SiteConfig,
    mut on_build: impl FnMut(&BuildReport),
) -> Result<(), WatchError> {
    report_cycle(rebuild(root, config), &mut on_build);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    for dir in [&config.input_dir, &config.partials_dir] {
        watcher.watch(&canonical(&root.join(dir))?, RecursiveMode::Recursive)?;
    }
    for values_file in &config.values_files {
        watcher.watch(&canonical(&root.join(values_file))?, RecursiveMode::NonRecursive)?;
    }
    let output_dir = canonical(&root.join(&config.output_dir))?;
    info!("*** Starting to watch for file changes ... ***");

    event_loop(&rx, &output_dir, || rebuild(root, config), &mut on_build)
}

/// Drain watcher events, running `cycle` once per closed window.
///
/// Returns `Ok` when the sending side hangs up and the first watcher error
/// otherwise. A failed cycle is only logged.
fn event_loop(
    rx: &Receiver<notify::Result<Event>>,
    output_dir: &Path,
    mut cycle: impl FnMut() -> Result<BuildReport, BuildError>,
    on_build: &mut impl FnMut(&BuildReport),
) -> Result<(), WatchError> {
    let mut coalescer = Coalescer::default();
    loop {
        match rx.recv_timeout(coalescer.timeout()) {
            Ok(Ok(event)) => {
                if let Some(path) = trigger_path(&event, output_dir) {
                    coalescer.add(path);
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(RecvTimeoutError::Timeout) if coalescer.ready() => {
                if let Some((path, folded)) = coalescer.take() {
                    info!("Rebuilding because of a change in '{}' ...", path.display());
                    if folded > 0 {
                        debug!("{folded} further change(s) folded into this rebuild.");
                    }
                    report_cycle(cycle(), on_build);
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn output_and_git_paths_ignored() {
        let out = Path::new("/site/output");
        assert!(!is_relevant_path(Path::new("/site/output/index.html"), out));
        assert!(!is_relevant_path(Path::new("/site/.git/index"), out));
        assert!(!is_relevant_path(Path::new("/site/blog/.git/HEAD"), out));
        assert!(is_relevant_path(Path::new("/site/index.html.template"), out));
        assert!(is_relevant_path(Path::new("/site/output-old/x"), out));
    }

    #[test]
    fn trigger_skips_irrelevant_paths() {
        let out = Path::new("/site/output");
        let e = event(
            EventKind::Modify(ModifyKind::Any),
            &["/site/output/a.html", "/site/values.yaml"],
        );
        assert_eq!(trigger_path(&e, out), Some(PathBuf::from("/site/values.yaml")));
    }

    #[test]
    fn access_events_ignored() {
        let out = Path::new("/site/output");
        let e = event(EventKind::Access(AccessKind::Any), &["/site/values.yaml"]);
        assert_eq!(trigger_path(&e, out), None);
    }

    #[test]
    fn create_and_remove_trigger() {
        let out = Path::new("/site/output");
        let created = event(EventKind::Create(CreateKind::File), &["/site/a.template"]);
        let removed = event(EventKind::Remove(RemoveKind::File), &["/site/a.template"]);
        assert!(trigger_path(&created, out).is_some());
        assert!(trigger_path(&removed, out).is_some());
    }

    #[test]
    fn coalescer_folds_window_into_one_trigger() {
        let mut c = Coalescer::default();
        assert!(!c.ready());
        assert_eq!(c.timeout(), IDLE_TIMEOUT);

        c.add(PathBuf::from("a"));
        c.add(PathBuf::from("b"));
        c.add(PathBuf::from("c"));
        assert!(c.timeout() <= WINDOW);

        std::thread::sleep(WINDOW);
        assert!(c.ready());
        assert_eq!(c.take(), Some((PathBuf::from("a"), 2)));
        assert_eq!(c.take(), None);
        assert!(!c.ready());
    }

    #[test]
    fn coalescer_not_ready_inside_window() {
        let mut c = Coalescer::default();
        c.add(PathBuf::from("a"));
        assert!(!c.ready());
    }

    fn change(path: &str) -> notify::Result<Event> {
        Ok(event(EventKind::Modify(ModifyKind::Any), &[path]))
    }

    fn failed_build() -> BuildError {
        BuildError::Io {
            path: PathBuf::from("output"),
            source: std::io::Error::other("disk full"),
        }
    }

    #[test]
    fn failed_cycle_keeps_watching() {
        let (tx, rx) = mpsc::channel();
        let sender = std::thread::spawn(move || {
            tx.send(change("/site/index.html.template")).unwrap();
            std::thread::sleep(WINDOW * 4);
            tx.send(change("/site/index.html.template")).unwrap();
            std::thread::sleep(WINDOW * 4);
        });

        let mut cycles = 0;
        let mut built = 0;
        let result = event_loop(
            &rx,
            Path::new("/site/output"),
            || {
                cycles += 1;
                if cycles == 1 { Err(failed_build()) } else { Ok(BuildReport::default()) }
            },
            &mut |_: &BuildReport| built += 1,
        );
        sender.join().unwrap();

        assert!(result.is_ok());
        assert_eq!(cycles, 2);
        assert_eq!(built, 1);
    }

    #[test]
    fn watcher_error_ends_loop() {
        let (tx, rx) = mpsc::channel();
        tx.send(Err(notify::Error::generic("watch limit reached"))).unwrap();

        let mut cycles = 0;
        let result = event_loop(
            &rx,
            Path::new("/site/output"),
            || {
                cycles += 1;
                Ok(BuildReport::default())
            },
            &mut |_: &BuildReport| {},
        );
        assert!(matches!(result, Err(WatchError::Notify(_))));
        assert_eq!(cycles, 0);
    }

    #[test]
    fn closed_channel_ends_loop() {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        drop(tx);

        let mut cycles = 0;
        let result = event_loop(
            &rx,
            Path::new("/site/output"),
            || {
                cycles += 1;
                Ok(BuildReport::default())
            },
            &mut |_: &BuildReport| {},
        );
        assert!(result.is_ok());
        assert_eq!(cycles, 0);
    }

    #[test]
    fn output_changes_never_trigger_cycle() {
        let (tx, rx) = mpsc::channel();
        let sender = std::thread::spawn(move || {
            tx.send(change("/site/output/index.html")).unwrap();
            std::thread::sleep(WINDOW * 3);
        });

        let mut cycles = 0;
        event_loop(
            &rx,
            Path::new("/site/output"),
            || {
                cycles += 1;
                Ok(BuildReport::default())
            },
            &mut |_: &BuildReport| {},
        )
        .unwrap();
        sender.join().unwrap();
        assert_eq!(cycles, 0);
    }
}
