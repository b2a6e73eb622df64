//! Create a new document

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::content::{Extra, FrontMatter};
use crate::Site;

/// Options for a new document
#[derive(Debug, Clone, Default)]
pub struct NewOptions {
    /// File name stem, defaults to the slugified title
    pub slug: Option<String>,
    /// Defaults to the site author
    pub author: Option<String>,
    pub draft: bool,
}

/// Create `content/<slug>.md` with a front-matter block dated today
pub fn create_document(site: &Site, title: &str, options: &NewOptions) -> Result<PathBuf> {
    let slug = match &options.slug {
        Some(slug) => slug::slugify(slug),
        None => slug::slugify(title),
    };
    if slug.is_empty() {
        anyhow::bail!("Cannot derive a file name from title {:?}", title);
    }

    let file_path = site.content_dir.join(format!("{}.md", slug));
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    let author = options.author.clone().or_else(|| {
        let author = site.config.author.trim();
        (!author.is_empty()).then(|| author.to_string())
    });

    let front_matter = FrontMatter {
        title: Some(title.to_string()),
        date: Some(chrono::Local::now().format("%Y-%m-%d").to_string()),
        draft: options.draft,
        extra: Extra {
            author,
            ..Default::default()
        },
        ..Default::default()
    };

    fs::create_dir_all(&site.content_dir)?;
    fs::write(&file_path, format!("{}\n", front_matter.to_block()?))?;
    tracing::debug!("Created {:?}", file_path);

    Ok(file_path)
}

/// Run the new command
pub fn run(site: &Site, title: &str, options: &NewOptions) -> Result<()> {
    let path = create_document(site, title, options)?;
    println!("Created: {:?}", path);
    Ok(())
}
