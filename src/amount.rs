/// Token quantity in base units. 18-decimal supplies need more than 64 bits.
pub type Amount = u128;

/// Serialize an [`Amount`] as a decimal string so JSON consumers never round it.
pub mod serde_amount {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Amount;

    pub fn serialize<S>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .replace('_', "")
            .parse::<Amount>()
            .map_err(|e| D::Error::custom(format!("invalid amount {raw:?}: {e}")))
    }
}
