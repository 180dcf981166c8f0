use serde::{Deserialize, Serialize};

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Identifier of a run, e.g. `e2e_2024-05-01_k3j9x0qa`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(format!(
            "e2e_{}_{}",
            chrono::Utc::now().format("%Y-%m-%d"),
            nanoid::nanoid!(8, &ID_ALPHABET)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a client session, derived from its run and spawn sequence number.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// `sequence` is 1-based, matching the `spawned` counter after the increment.
    pub fn for_run(run_id: &RunId, sequence: u64) -> Self {
        Self(format!("{run_id}_client_{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub(crate) fn new_error_id() -> String {
    format!("err_{}", nanoid::nanoid!(12, &ID_ALPHABET))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_prefixed() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("e2e_"));
    }

    #[test]
    fn client_id_includes_run_and_sequence() {
        let run_id = RunId::from("e2e_test");
        assert_eq!("e2e_test_client_3", ClientId::for_run(&run_id, 3).as_str());
    }
}
