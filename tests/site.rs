use std::fs;
use std::path::Path;

use plume::check::check_site;
use plume::content::loader::ContentLoader;
use plume::content::FrontMatter;
use plume::Site;
use tempfile::TempDir;

const CONFIG: &str = r#"title = "Andy's notebook"
base_url = "https://example.org"

[markdown]
external_links_target_blank = true
"#;

const NUMBA: &str = r#"+++
title = "Speeding up ODE solvers with Numba"
date = 2023-01-28

[extra]
author = "Andy Day"
+++

SciPy's `solve_ivp` calls back into Python on every step.

<!-- more -->

## Compiling the right-hand side

```python
@njit
def lorenz(t, y, sigma, rho, beta):
    return np.array([sigma * (y[1] - y[0]), y[0] * (rho - y[2]) - y[1], y[0] * y[1] - beta * y[2]])
```

Compare with [the Julia version](@/julia/index.md) or read the
[Numba docs](https://numba.pydata.org).
"#;

const JULIA: &str = r#"+++
title = "Julia for circadian modeling"
date = "2023-03-02"
tags = ["julia", "ode"]

[extra]
author = "Andy Day"
+++

![Phase response curve](prc.svg)

## Results
"#;

const UNITY: &str = r#"+++
title = "Decoupling with ScriptableObject events"
date = 2022-07-03
draft = true

[extra]
author = "Andy Day"
+++

```csharp
public class GameEvent : ScriptableObject { }
```
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn blog() -> (TempDir, Site) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "config.toml", CONFIG);
    write(root, "content/numba-odes.md", NUMBA);
    write(root, "content/julia/index.md", JULIA);
    write(root, "content/julia/prc.svg", "<svg/>");
    write(root, "content/unity-events.md", UNITY);
    write(root, "static/style.css", "body { margin: 0 }");
    let site = Site::new(root).unwrap();
    (tmp, site)
}

#[test]
fn test_corpus_is_clean() {
    let (_tmp, site) = blog();
    let report = check_site(&site, true).unwrap();
    assert_eq!(report.files, 3);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
}

#[test]
fn test_listing_order_and_metadata() {
    let (_tmp, site) = blog();
    let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
    assert_eq!(corpus.skipped_drafts, 1);

    let titles: Vec<_> = corpus.documents.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Julia for circadian modeling",
            "Speeding up ODE solvers with Numba"
        ]
    );

    let numba = corpus.by_source("numba-odes.md").unwrap().metadata();
    assert_eq!(numba.date.to_string(), "2023-01-28");
    assert_eq!(numba.author.as_deref(), Some("Andy Day"));
}

#[test]
fn test_front_matter_round_trips() {
    for source in [NUMBA, JULIA, UNITY] {
        let first = FrontMatter::parse(source).unwrap().front_matter;
        let block = first.to_block().unwrap();
        let second = FrontMatter::parse(&block).unwrap().front_matter;
        assert_eq!(first, second);
    }
}

#[test]
fn test_build_and_clean() {
    let (tmp, site) = blog();
    site.build().unwrap();

    let numba = fs::read_to_string(site.output_dir.join("numba-odes/index.html")).unwrap();
    assert!(numba.contains(r#"<a href="/julia/">the Julia version</a>"#));
    assert!(numba.contains(r#"href="https://numba.pydata.org" target="_blank""#));
    assert!(numba.contains(r#"id="compiling-the-right-hand-side""#));

    let julia = fs::read_to_string(site.output_dir.join("julia/index.html")).unwrap();
    assert!(julia.contains(r#"src="/julia/prc.svg""#));
    assert!(site.output_dir.join("julia/prc.svg").is_file());
    assert!(site.output_dir.join("style.css").is_file());
    assert!(!site.output_dir.join("unity-events").exists());

    // A second build renders the same bytes
    site.build().unwrap();
    let again = fs::read_to_string(site.output_dir.join("numba-odes/index.html")).unwrap();
    assert_eq!(numba, again);

    site.clean().unwrap();
    assert!(!site.output_dir.exists());
    assert!(!tmp.path().join(plume::cache::CACHE_DIR).exists());
}
