//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random byte payload of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random alphanumeric name of the specified length.
pub fn random_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate `count` distinct variable names.
pub fn generate_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("var_{i:05}")).collect()
}

/// Generate named text values of the specified length.
pub fn generate_vars(count: usize, payload_size: usize) -> Vec<(String, String)> {
    generate_names(count)
        .into_iter()
        .map(|name| (name, random_name(payload_size)))
        .collect()
}

/// Segment size that fits `count` variables of `payload_size` bytes.
///
/// Text values encode as a CBOR text string with at most a 9 byte prefix.
pub fn segment_size_for(count: usize, payload_size: usize, name_len: usize) -> usize {
    let per_entry = shmkv_segment::ENTRY_HEADER_LEN + name_len + payload_size + 9;
    shmkv_segment::HEADER_LEN + count * per_entry
}
