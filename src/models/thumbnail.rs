use rand::Rng;

pub const BUCKET: &str = "case-studies";
const FOLDER: &str = "thumbnails";
const SUFFIX_LENGTH: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Object key of an uploaded thumbnail
///
/// `thumbnails/{unix_millis}-{random base36 suffix}.{extension}`. The extension of the
/// original file name is kept when it is a plain alphanumeric one, and left out otherwise.
pub fn object_key(file_name: &str, unix_millis: i64, rng: &mut impl Rng) -> String {
    let suffix: String = (0..SUFFIX_LENGTH)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    match extension(file_name) {
        Some(extension) => format!("{FOLDER}/{unix_millis}-{suffix}.{extension}"),
        None => format!("{FOLDER}/{unix_millis}-{suffix}"),
    }
}

fn extension(file_name: &str) -> Option<&str> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !extension.is_empty()
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(extension)
}
