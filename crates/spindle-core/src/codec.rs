//! Binary codec for job messages and artifact lists.
//!
//! Everything that crosses the broker or lands in the results store goes
//! through this pair. The encoding is MessagePack with field names
//! preserved, so records stay self-describing and readers skip fields they
//! do not know.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(rmp_serde::from_slice(bytes)?)
}
