//! Build the static site

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::Path;
use std::time::Duration;

use crate::cache::{self, CacheDb, Fingerprint, Snapshot};
use crate::content::loader::{ContentLoader, Corpus};
use crate::generator::{self, Generator};
use crate::Site;

/// Options for a build
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Render drafts too
    pub drafts: bool,
    /// Ignore the cache and render everything
    pub force: bool,
}

/// Build the site (with incremental support)
pub fn run(site: &Site, options: &BuildOptions) -> Result<()> {
    let start = std::time::Instant::now();

    let corpus = ContentLoader::new(site)?.load(options.drafts)?;
    for failure in &corpus.failures {
        tracing::warn!("Skipping {}: {}", failure.source, failure.error);
    }
    tracing::info!(
        "Loaded {} documents ({} skipped)",
        corpus.documents.len(),
        corpus.failures.len() + corpus.skipped_drafts
    );

    let snapshots = snapshots(site, &corpus)?;
    let fingerprint = Fingerprint::compute(site, &snapshots)?;
    let cache = CacheDb::load(&site.base_dir);

    let mut changeset = cache::detect_changes(&cache, &fingerprint, &snapshots);
    if options.force || cache.is_empty() {
        tracing::info!(
            "Full generation (force={}, cache_empty={})",
            options.force,
            cache.is_empty()
        );
        changeset.full_rebuild = true;
        changeset.rebuild_index = true;
    }

    if !changeset.has_changes() && site.output_dir.join("index.html").exists() {
        tracing::info!(
            "No changes detected, completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        return Ok(());
    }

    tracing::info!("Changes detected: {}", changeset.summary());

    let generator = Generator::new(site)?;
    if changeset.has_changes() {
        generator.generate_incremental(&corpus, &changeset)?;
    } else {
        // Output was removed behind the cache's back
        generator.generate(&corpus)?;
    }

    cache::snapshot_cache(&fingerprint, &snapshots).save(&site.base_dir)?;

    tracing::info!("Built in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Cache view of every loaded document
fn snapshots(site: &Site, corpus: &Corpus) -> Result<Vec<Snapshot>> {
    corpus
        .documents
        .iter()
        .map(|doc| {
            Ok(Snapshot {
                source: doc.source.clone(),
                slug: doc.slug.clone(),
                content_hash: cache::hash_file(&site.content_dir.join(&doc.source))?,
                output_path: generator::output_path(doc),
            })
        })
        .collect()
}

/// Quiet period before a burst of file events triggers a rebuild
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Watch for file changes and rebuild (with incremental support)
pub async fn watch(site: &Site, options: &BuildOptions) -> Result<()> {
    tracing::info!("Watching for changes (incremental mode). Press Ctrl+C to stop.");

    let site = site.clone();
    let options = *options;
    tokio::task::spawn_blocking(move || watch_changes(&site, &options, WATCH_DEBOUNCE, |_| true))
        .await?
}

/// Rebuild whenever the site's inputs change, until `on_rebuild` returns false
///
/// Blocks the calling thread. Events are debounced, so every burst ends in a
/// rebuild that sees its final write.
pub fn watch_changes<F>(
    site: &Site,
    options: &BuildOptions,
    debounce: Duration,
    mut on_rebuild: F,
) -> Result<()>
where
    F: FnMut(&Result<()>) -> bool,
{
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(debounce, tx)?;

    for dir in [&site.content_dir, &site.static_dir, &site.templates_dir] {
        if dir.exists() {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
            tracing::debug!("Watching: {:?}", dir);
        }
    }

    let config_path = site.config_path();
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    // The cache is the only state carried between rebuilds
    let rebuild_options = BuildOptions {
        force: false,
        ..*options
    };

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<_> = events.iter().filter(|e| is_relevant(&e.path)).collect();
                if changed.is_empty() {
                    continue;
                }
                for event in &changed {
                    tracing::info!("File changed: {}", event.path.display());
                }

                let result = rebuild(site, &rebuild_options);
                match &result {
                    Ok(()) => tracing::info!("Rebuilt successfully"),
                    Err(e) => tracing::error!("Build failed: {:#}", e),
                }
                if !on_rebuild(&result) {
                    break;
                }
            }
            Ok(Err(e)) => tracing::error!("Watch error: {:?}", e),
            Err(_) => break,
        }
    }

    Ok(())
}

/// Skip editor swap files and VCS noise
fn is_relevant(path: &Path) -> bool {
    let path = path.to_string_lossy();
    !path.contains(".git")
        && !path.contains(".DS_Store")
        && !path.ends_with('~')
        && !path.ends_with(".swp")
}

/// Rebuild after a change, picking up an edited config file
pub fn rebuild(site: &Site, options: &BuildOptions) -> Result<()> {
    let site = Site::new(&site.base_dir)?;
    run(&site, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(tmp: &TempDir, rel: &str, content: &str) {
        let path = tmp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn post(title: &str, date: &str) -> String {
        format!(
            "+++\ntitle = \"{}\"\ndate = {}\n\n[extra]\nauthor = \"Andy Day\"\n+++\n\nBody of {}.\n",
            title, date, title
        )
    }

    #[test]
    fn test_build_writes_pages_and_cache() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "content/first.md", &post("First", "2023-01-28"));
        write(&tmp, "content/broken.md", "+++\ntitle = \"Broken\"\n");
        let site = Site::new(tmp.path()).unwrap();

        run(&site, &BuildOptions::default()).unwrap();

        assert!(site.output_dir.join("first/index.html").is_file());
        assert!(!site.output_dir.join("broken").exists());
        let cache = CacheDb::load(tmp.path());
        assert_eq!(cache.documents.len(), 1);
        assert_eq!(cache.documents["first.md"].output_path, "first/index.html");
    }

    #[test]
    fn test_incremental_build_picks_up_changes() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "content/first.md", &post("First", "2023-01-28"));
        write(&tmp, "content/second.md", &post("Second", "2023-02-01"));
        let site = Site::new(tmp.path()).unwrap();
        run(&site, &BuildOptions::default()).unwrap();

        write(&tmp, "content/first.md", &post("First, revised", "2023-01-28"));
        fs::remove_file(tmp.path().join("content/second.md")).unwrap();
        run(&site, &BuildOptions::default()).unwrap();

        let first = fs::read_to_string(site.output_dir.join("first/index.html")).unwrap();
        assert!(first.contains("First, revised"));
        assert!(!site.output_dir.join("second").exists());
        let index = fs::read_to_string(site.output_dir.join("index.html")).unwrap();
        assert!(!index.contains("Second"));
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(Path::new("content/numba.md")));
        assert!(!is_relevant(Path::new("content/.git/index")));
        assert!(!is_relevant(Path::new("content/numba.md~")));
        assert!(!is_relevant(Path::new("content/.numba.md.swp")));
    }

    #[test]
    fn test_watch_rebuilds_after_each_burst() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "content/first.md", &post("First", "2023-01-28"));
        let site = Site::new(tmp.path()).unwrap();
        run(&site, &BuildOptions::default()).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let watched = site.clone();
        let handle = std::thread::spawn(move || {
            let mut rebuilds = 0;
            watch_changes(
                &watched,
                &BuildOptions::default(),
                Duration::from_millis(50),
                |result| {
                    rebuilds += 1;
                    let _ = done_tx.send(result.is_ok());
                    rebuilds < 2
                },
            )
        });

        // Give the watcher time to register
        std::thread::sleep(Duration::from_millis(200));
        let page = site.output_dir.join("first/index.html");
        let wait = Duration::from_secs(10);

        write(&tmp, "content/first.md", &post("Draft two", "2023-01-28"));
        assert!(done_rx.recv_timeout(wait).unwrap());

        // A write right after a rebuild still lands
        write(&tmp, "content/first.md", &post("Final words", "2023-01-28"));
        assert!(done_rx.recv_timeout(wait).unwrap());

        handle.join().unwrap().unwrap();
        assert!(fs::read_to_string(page).unwrap().contains("Final words"));
    }

    #[test]
    fn test_drafts_only_when_requested() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp,
            "content/wip.md",
            "+++\ntitle = \"WIP\"\ndate = 2023-05-01\ndraft = true\n+++\n",
        );
        let site = Site::new(tmp.path()).unwrap();

        run(&site, &BuildOptions::default()).unwrap();
        assert!(!site.output_dir.join("wip").exists());

        let options = BuildOptions {
            drafts: true,
            ..Default::default()
        };
        run(&site, &options).unwrap();
        assert!(site.output_dir.join("wip/index.html").is_file());
    }
}
