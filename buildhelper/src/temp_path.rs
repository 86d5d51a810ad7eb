use std::path::PathBuf;

/// Returns a path with a random name and the given extension inside the system temp directory. The
/// file is not created.
pub fn tmp_path(ext: &str) -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    const PREFIX: &str = "buildhelper-";
    const LEN: usize = 16;

    let mut name = String::with_capacity(PREFIX.len() + LEN + 1 + ext.len());
    name.push_str(PREFIX);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, LEN);
    name.push('.');
    name.push_str(ext);
    std::env::temp_dir().join(name)
}
