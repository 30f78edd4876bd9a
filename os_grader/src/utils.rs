use std::io::Write;
use std::path::PathBuf;

/// Writes `content` to a fresh executable file and returns its path. Used to stand in for
/// graded programs and memcheck wrappers.
pub fn create_script(content: &str) -> PathBuf {
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::with_suffix(".sh").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.as_file().sync_all().unwrap();
    file.disable_cleanup(true);
    let path = file.path().to_path_buf();
    drop(file);

    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(&path, perms).unwrap();
    }
    path
}
