//! Logical id generation.
//!
//! A logical id is derived from the construct path inside its stack: the
//! alphanumeric characters of every path component followed by the first
//! eight hex digits of the md5 of the full path. Ids are therefore stable
//! across syntheses and unique as long as construct paths are unique.

const PATH_SEP: &str = "/";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;
const MAX_ID_LEN: usize = 255;

/// Path component dropped from both the hash and the human part.
const HIDDEN_ID: &str = "Default";
/// Path component dropped from the human part only.
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";

/// Builds the logical id for a construct path.
///
/// A single-component path maps to its alphanumeric characters without a
/// hash suffix, which keeps top-level ids readable (`Role`, `SecretName`).
pub fn logical_id(path: &[&str]) -> String {
    let components: Vec<&str> = path.iter().copied().filter(|c| *c != HIDDEN_ID).collect();

    if components.len() == 1 {
        let candidate = remove_non_alphanumeric(components[0]);
        if !candidate.is_empty() && candidate.len() <= MAX_ID_LEN {
            return candidate;
        }
    }

    let hash = path_hash(&components);
    let mut human: String = remove_dupes(&components)
        .into_iter()
        .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
        .map(remove_non_alphanumeric)
        .collect();
    human.truncate(MAX_HUMAN_LEN);

    human + &hash
}

/// Uppercase hex prefix of the md5 of the joined path.
pub fn path_hash(components: &[&str]) -> String {
    let digest = md5::compute(components.join(PATH_SEP).as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex.to_uppercase()
}

/// Keeps ASCII letters and digits only.
pub fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::with_capacity(components.len());
    for c in components {
        if out.last() != Some(c) {
            out.push(c);
        }
    }
    out
}
