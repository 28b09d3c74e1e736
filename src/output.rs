use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

/// Refuses to clobber an existing file unless `force` is set; creates parent dirs.
pub fn prepare_output(out: &str, force: bool) -> anyhow::Result<()> {
    if Path::new(out).exists() && !force {
        anyhow::bail!("output already exists: {out} (pass --force to overwrite)");
    }
    if let Some(parent) = Path::new(out).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    Ok(())
}

pub fn write_bytes(out: &str, contents: &[u8], force: bool) -> anyhow::Result<()> {
    prepare_output(out, force)?;
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(out)
        .with_context(|| format!("open output: {out}"))?;
    file.write_all(contents)
        .with_context(|| format!("write output: {out}"))?;
    file.flush()
        .with_context(|| format!("flush output: {out}"))?;
    Ok(())
}

/// Writes to `out`, or to stdout when no path is given.
pub fn write_text(out: Option<&str>, contents: &str, force: bool) -> anyhow::Result<()> {
    match out {
        Some(out) => write_bytes(out, contents.as_bytes(), force),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(contents.as_bytes())
                .context("write stdout")?;
            if !contents.ends_with('\n') {
                stdout.write_all(b"\n").context("write stdout")?;
            }
            stdout.flush().context("flush stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        let out = path.to_str().unwrap();

        write_bytes(out, b"one", false).unwrap();
        let err = write_bytes(out, b"two", false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        write_bytes(out, b"three", true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "three");
    }
}
