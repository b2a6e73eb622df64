//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"# Site
title = "My Blog"
description = ""
author = ""
language = "en"

# URL
base_url = "http://example.com"
root = "/"

# Directories
content_dir = "content"
output_dir = "public"
static_dir = "static"
templates_dir = "templates"
ignored_content = []

# Writing
date_format = "%B %d, %Y"
render_drafts = false

[markdown]
highlight_code = true
highlight_theme = "base16-ocean.dark"
line_numbers = false
smart_punctuation = true
external_links_target_blank = false

[check]
require_author = false
local_links = true

[extra]
"#;

const SAMPLE_POST: &str = r#"
Welcome! This is your very first post. Every document starts with a front-matter
block between `+++` lines, written in TOML.

<!-- more -->

## Quick Start

### Create a new post

```bash
$ plume new "My New Post"
```

### Check your content

```bash
$ plume check
```

### Run server

```bash
$ plume serve
```

### Build static files

```bash
$ plume build
```
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("content"))?;
    fs::create_dir_all(target_dir.join("static"))?;
    fs::create_dir_all(target_dir.join("templates"))?;

    fs::write(&config_path, DEFAULT_CONFIG)?;

    let sample_post = format!(
        "+++\ntitle = \"Hello World\"\ndate = {}\n\n[extra]\nauthor = \"Your Name\"\n+++\n{}",
        chrono::Local::now().format("%Y-%m-%d"),
        SAMPLE_POST
    );
    fs::write(target_dir.join("content/hello-world.md"), sample_post)?;

    Ok(())
}
