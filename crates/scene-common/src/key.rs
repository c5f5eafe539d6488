//! Product lookup keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Key used to request a product from a scene: either its name
/// (`C02`, `true_color`) or a wavelength in micrometers.
///
/// Names take precedence during lookup; a wavelength resolves to the
/// channel whose range contains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductKey {
    Name(String),
    Wavelength(f32),
}

impl ProductKey {
    pub fn name(name: impl Into<String>) -> Self {
        ProductKey::Name(name.into())
    }

    pub fn wavelength(micrometers: f32) -> Self {
        ProductKey::Wavelength(micrometers)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            ProductKey::Name(n) => Some(n),
            ProductKey::Wavelength(_) => None,
        }
    }
}

impl PartialEq for ProductKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ProductKey {}

impl Hash for ProductKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ProductKey::Name(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            ProductKey::Wavelength(w) => {
                1u8.hash(state);
                w.to_bits().hash(state);
            }
        }
    }
}

impl PartialOrd for ProductKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Names sort before wavelengths.
impl Ord for ProductKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ProductKey::Name(a), ProductKey::Name(b)) => a.cmp(b),
            (ProductKey::Wavelength(a), ProductKey::Wavelength(b)) => a.total_cmp(b),
            (ProductKey::Name(_), ProductKey::Wavelength(_)) => Ordering::Less,
            (ProductKey::Wavelength(_), ProductKey::Name(_)) => Ordering::Greater,
        }
    }
}

impl FromStr for ProductKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<f32>() {
            Ok(w) if w.is_finite() => Ok(ProductKey::Wavelength(w)),
            _ => Ok(ProductKey::Name(s.to_string())),
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductKey::Name(n) => write!(f, "{}", n),
            ProductKey::Wavelength(w) => write!(f, "{}", w),
        }
    }
}

impl From<&str> for ProductKey {
    fn from(s: &str) -> Self {
        ProductKey::Name(s.to_string())
    }
}

impl From<String> for ProductKey {
    fn from(s: String) -> Self {
        ProductKey::Name(s)
    }
}

impl From<f32> for ProductKey {
    fn from(w: f32) -> Self {
        ProductKey::Wavelength(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_number_is_wavelength() {
        let key: ProductKey = "0.64".parse().unwrap();
        assert_eq!(key, ProductKey::Wavelength(0.64));

        let key: ProductKey = "C02".parse().unwrap();
        assert_eq!(key, ProductKey::name("C02"));

        let key: ProductKey = "nan".parse().unwrap();
        assert_eq!(key, ProductKey::name("nan"));
    }

    #[test]
    fn test_display() {
        assert_eq!(ProductKey::name("airmass").to_string(), "airmass");
        assert_eq!(ProductKey::wavelength(10.35).to_string(), "10.35");
    }

    #[test]
    fn test_ordering_and_hash() {
        let mut keys = vec![
            ProductKey::wavelength(11.2),
            ProductKey::name("C13"),
            ProductKey::wavelength(0.47),
            ProductKey::name("C01"),
        ];
        keys.sort();
        assert_eq!(keys[0], ProductKey::name("C01"));
        assert_eq!(keys[3], ProductKey::wavelength(11.2));

        let set: HashSet<ProductKey> = keys.into_iter().chain([ProductKey::name("C01")]).collect();
        assert_eq!(set.len(), 4);
    }
}
