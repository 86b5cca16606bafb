use crate::display::{self, SortKey, Stats};
use crate::report;
use dialoguer::Confirm;
use futures::TryStreamExt;
use miette::{IntoDiagnostic, Result, WrapErr};
use revisit_config::Config;
use revisit_library::{Library, Upload};
use revisit_priority::models::{MaterialId, Score};
use std::path::{Path, PathBuf};
use time::{Duration, UtcDateTime};

/// Orphans younger than this may belong to an upload still in progress.
const ORPHAN_GRACE_PERIOD: Duration = Duration::hours(1);

pub async fn list(library: &Library, sort: SortKey, ascending: bool) -> Result<()> {
    let now = UtcDateTime::now();
    let mut materials = library.load(now).await.map_err(report).wrap_err("could not load materials")?;
    if materials.is_empty() {
        println!("No materials yet. Add one with `revisit upload <file.pdf>`.");
        return Ok(());
    }
    display::sort(&mut materials, sort, ascending, now);
    println!("{}", display::table(&materials, now));
    println!("{}", Stats::of(&materials));
    Ok(())
}

/// Upload every file, reporting each failure and carrying on with the rest.
pub async fn upload(library: &Library, files: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for path in files {
        match upload_one(library, path).await {
            Ok(id) => println!("Uploaded {} as {id}", path.display()),
            Err(err) => {
                eprintln!("{err:?}");
                failed += 1;
            },
        }
    }
    if failed > 0 {
        miette::bail!("{failed} of {} uploads failed", files.len());
    }
    Ok(())
}

async fn upload_one(library: &Library, path: &Path) -> Result<MaterialId> {
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    let data = tokio::fs::read(path).await.into_diagnostic().wrap_err_with(|| format!("could not read {}", path.display()))?;
    let upload = Upload {
        filename: path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        content_type: content_type.essence_str().to_string(),
        data,
    };
    let material =
        library.upload(upload).await.map_err(report).wrap_err_with(|| format!("could not upload {}", path.display()))?;
    Ok(material.id)
}

pub async fn rate(library: &Library, id: MaterialId, score: Score) -> Result<()> {
    let material = library.rate(&id, score).await.map_err(report).wrap_err("could not record revision")?;
    println!(
        "Rated {} as {} ({} revision{})",
        material.filename,
        score.label(),
        material.revision_count,
        if material.revision_count == 1 { "" } else { "s" }
    );
    Ok(())
}

pub async fn delete(library: &Library, id: MaterialId, yes: bool) -> Result<()> {
    let material = library.get(&id).await.map_err(report).wrap_err("could not delete material")?;
    if !yes && !confirm(format!("Delete {}?", material.filename)).await? {
        println!("Cancelled.");
        return Ok(());
    }
    library.delete(&id).await.map_err(report).wrap_err("could not delete material")?;
    println!("Deleted {}", material.filename);
    Ok(())
}

pub async fn url(library: &Library, id: MaterialId) -> Result<()> {
    let material = library.get(&id).await.map_err(report).wrap_err("could not look up material")?;
    println!("{}", library.public_url(&material));
    Ok(())
}

pub async fn orphans(library: &Library, prune: bool) -> Result<()> {
    if prune {
        let pruned =
            library.prune_orphans(ORPHAN_GRACE_PERIOD).await.map_err(report).wrap_err("could not prune orphans")?;
        println!("Deleted {} orphaned file(s)", pruned.len());
        return Ok(());
    }
    let orphans: Vec<_> =
        library.orphaned_blobs().try_collect().await.map_err(report).wrap_err("could not list orphans")?;
    for orphan in &orphans {
        println!("{}\t{} bytes", orphan.path.display(), orphan.size);
    }
    println!("{} orphaned file(s)", orphans.len());
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", config.to_redacted_toml().map_err(report)?);
    Ok(())
}

/// Ask a yes/no question on the terminal, defaulting to no.
async fn confirm(prompt: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || Confirm::new().with_prompt(prompt).default(false).interact())
        .await
        .into_diagnostic()?
        .into_diagnostic()
}
