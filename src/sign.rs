//! Request signing.
//!
//! The gateway authenticates requests with an MD5 digest over parameter
//! values. For outbound requests the preimage is built by sorting the
//! parameters by key (byte order), taking the values only, appending the
//! shop secret key and joining everything with `:`. Callbacks use a fixed
//! field order instead of sorting; [`sign_values`] covers that side.
//!
//! MD5 here is a legacy checksum dictated by the remote protocol, not a
//! security choice this crate gets to make.

use crate::models::Params;
use md5::{Digest, Md5};

/// Reserved parameter name carrying the digest itself.
pub const SIGN_FIELD: &str = "sign";

fn md5_hex(preimage: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(preimage.as_bytes());
    hex::encode(hasher.finalize())
}

/// Preimage for a parameter mapping: any `sign` entry is dropped, the rest
/// is sorted by key and reduced to values, with the secret key appended.
/// The sort is stable, so duplicate keys (if a caller ever produced them)
/// keep their relative order.
pub(crate) fn canonical_preimage(params: &Params, secret_key: &str) -> String {
    let mut entries: Vec<(&str, String)> = params
        .iter()
        .filter(|(key, _)| *key != SIGN_FIELD)
        .map(|(key, value)| (key, value.to_string()))
        .collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut values: Vec<String> = entries.into_iter().map(|(_, value)| value).collect();
    values.push(secret_key.to_string());
    values.join(":")
}

/// Computes the `sign` value for a request parameter set.
///
/// The input mapping is not modified; callers attach the returned digest
/// under [`SIGN_FIELD`] themselves, keeping their original parameter order.
pub fn sign_params(params: &Params, secret_key: &str) -> String {
    md5_hex(&canonical_preimage(params, secret_key))
}

/// Digest over an explicit value sequence: the values are joined with `:`
/// in the order given, the secret key is appended last. Empty values stay
/// in place as empty segments.
pub fn sign_values<S: AsRef<str>>(values: &[S], secret_key: &str) -> String {
    let mut preimage = values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":");
    preimage.push(':');
    preimage.push_str(secret_key);
    md5_hex(&preimage)
}
