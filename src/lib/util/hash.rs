//! Hex-encoding helper shared by the cache directory naming scheme and the
//! Integrity Verifier. Grounded on the teacher's `util::hexify_hash`, used
//! throughout `retrieve::cache::Cache::get_src_dir`/`get_index_dir`.

pub fn hexify_hash(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
