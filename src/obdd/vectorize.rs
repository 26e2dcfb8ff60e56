//! (De)serialisation of maps whose keys serde cannot use as object keys.
//! The map is written as a sequence of entry pairs and rebuilt on read.
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialises any map-like iterator as a sequence of `(key, value)` pairs.
pub fn serialize<'a, T, K, V, S>(map: T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: IntoIterator<Item = (&'a K, &'a V)>,
    K: Serialize + 'a,
    V: Serialize + 'a,
{
    serializer.collect_seq(map.into_iter())
}

/// Rebuilds a map from a sequence of `(key, value)` pairs.
pub fn deserialize<'de, T, K, V, D>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromIterator<(K, V)>,
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    let entries: Vec<(K, V)> = Deserialize::deserialize(deserializer)?;
    Ok(entries.into_iter().collect())
}
