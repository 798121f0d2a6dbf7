//! Identifier generation for user and post rows.
//!
//! Identifiers are opaque strings to the rest of the crate; nothing parses them.

use uuid::Uuid;

/// Produces globally-unique identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs in hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| UuidGenerator.next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
