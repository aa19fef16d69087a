use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// Creates the directory, and all its parents, unless it already exists. It is an error
/// if something other than a directory is in the way.
pub fn ensure_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "exists but is not a directory",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir),
        Err(e) => Err(e),
    }
}

/// Collects all files in the given directories, does not walk them recursively.
pub fn all_files<R>(folders: impl IntoIterator<Item = impl AsRef<Path>>) -> io::Result<R>
where
    R: FromIterator<PathBuf>,
{
    let iters: Result<Vec<_>, _> =
        folders.into_iter().map(|path| fs::read_dir(path)).collect();

    iters?
        .into_iter()
        .flatten()
        .filter_map(|entry| match entry {
            Ok(entry) => match entry.file_type() {
                Ok(ft) if ft.is_dir() => None,
                Ok(_) => Some(Ok(entry.path())),
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// When the file was created, or last modified on platforms or file systems that don't
/// keep track of the creation time.
pub fn created_time(path: impl AsRef<Path>) -> io::Result<SystemTime> {
    let meta = fs::metadata(path)?;
    match meta.created() {
        Ok(time) => Ok(time),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => meta.modified(),
        Err(e) => Err(e),
    }
}

/// Where a file is written to before it is renamed into place at `path`. The path must
/// refer to something that has a filename.
pub fn partial_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();
    let mut new_file_name = path
        .file_name()
        .ok_or(io::ErrorKind::InvalidInput)?
        .to_owned();
    new_file_name.push(".part");
    Ok(path.with_file_name(new_file_name))
}

/// Writes all of `contents` next to `path` first and then renames it into place, so
/// `path` is never observed half written.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let partial = partial_path(path)?;
    if let Err(e) = fs::write(&partial, contents) {
        fs::remove_file(&partial).ok();
        return Err(e);
    }
    fs::rename(&partial, path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ensure_dir_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_dir(&dir).unwrap();
    }

    #[test]
    fn ensure_dir_on_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"hej").unwrap();
        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn all_files_skips_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("one"), b"1").unwrap();
        fs::write(tmp.path().join("two"), b"2").unwrap();

        let mut files: Vec<PathBuf> = all_files([tmp.path()]).unwrap();
        files.sort();
        assert_eq!(vec![tmp.path().join("one"), tmp.path().join("two")], files);
    }

    #[test]
    fn write_atomic_leaves_no_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("frame.png");
        write_atomic(&file, b"data").unwrap();
        assert_eq!(b"data".as_slice(), fs::read(&file).unwrap());
        assert!(!partial_path(&file).unwrap().exists());
    }
}
