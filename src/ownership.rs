//! Maps a pond to the user who receives its alerts.

use serde::Serialize;
use tracing::warn;

use crate::models::Pond;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerSource {
    Pond,
    /// Explicitly configured `DEFAULT_OWNER_ID`.
    DefaultOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub user_id: String,
    pub source: OwnerSource,
}

#[derive(Debug, Clone, Default)]
pub struct OwnershipResolver {
    default_owner: Option<String>,
}

impl OwnershipResolver {
    pub fn new(default_owner: Option<String>) -> Self {
        // ---
        let default_owner = default_owner.filter(|id| !id.trim().is_empty());
        Self { default_owner }
    }

    /// Resolve the owner from the pond document read at the start of the invocation.
    ///
    /// A missing pond or a blank `userId` means "no owner" unless a default
    /// owner was configured.
    pub fn resolve(&self, pond_id: &str, pond: Option<&Pond>) -> Option<Owner> {
        // ---
        let owned = pond
            .and_then(|p| p.user_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if let Some(user_id) = owned {
            return Some(Owner {
                user_id: user_id.to_string(),
                source: OwnerSource::Pond,
            });
        }

        match &self.default_owner {
            Some(user_id) => {
                warn!(pond_id, user_id = %user_id, "Pond has no owner, using configured default owner");
                Some(Owner {
                    user_id: user_id.clone(),
                    source: OwnerSource::DefaultOwner,
                })
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn pond(user_id: Option<&str>) -> Pond {
        Pond {
            id: "kolam1".to_string(),
            user_id: user_id.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_from_pond() {
        // ---
        let resolver = OwnershipResolver::default();
        let owner = resolver.resolve("kolam1", Some(&pond(Some("U1"))));
        assert_eq!(
            owner,
            Some(Owner {
                user_id: "U1".to_string(),
                source: OwnerSource::Pond,
            })
        );
    }

    #[test]
    fn test_missing_owner_is_none_without_default() {
        // ---
        let resolver = OwnershipResolver::default();
        assert_eq!(resolver.resolve("kolam1", Some(&pond(None))), None);
        assert_eq!(resolver.resolve("kolam1", Some(&pond(Some("  ")))), None);
        assert_eq!(resolver.resolve("kolam9", None), None);
    }

    #[test]
    fn test_default_owner_is_opt_in() {
        // ---
        let resolver = OwnershipResolver::new(Some("001".to_string()));
        let owner = resolver.resolve("kolam1", Some(&pond(None))).unwrap();
        assert_eq!(owner.user_id, "001");
        assert_eq!(owner.source, OwnerSource::DefaultOwner);

        // Real ownership still wins
        let owner = resolver.resolve("kolam1", Some(&pond(Some("U1")))).unwrap();
        assert_eq!(owner.source, OwnerSource::Pond);

        // Blank default is the same as none
        let resolver = OwnershipResolver::new(Some(String::new()));
        assert_eq!(resolver.resolve("kolam1", None), None);
    }
}
