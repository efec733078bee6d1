//! Opaque identifiers shared by the coordinator, the worker, and every plugin.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(WorkerId);
opaque_id!(TaskId);
opaque_id!(JobId);

impl WorkerId {
    /// Registration is monotonic for the life of a coordinator process;
    /// a fresh v4 UUID is never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl JobId {
    /// `{job_type}:{random8}`, matching the coordinator's `submit_job` allocation rule.
    pub fn generate(job_type: &str) -> Self {
        let mut suffix = String::with_capacity(8);
        for _ in 0..8 {
            suffix.push(HEX_ALPHABET[fastrand::usize(..HEX_ALPHABET.len())]);
        }
        Self(format!("{job_type}:{suffix}"))
    }
}

const HEX_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_ids_are_unique() {
        assert_ne!(WorkerId::generate(), WorkerId::generate());
    }

    #[test]
    fn job_id_has_type_prefix_and_random_suffix() {
        let id = JobId::generate("sort_map");
        assert!(id.as_str().starts_with("sort_map:"));
        let suffix = id.as_str().split(':').next_back().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_roundtrip_through_json() {
        let id = TaskId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
