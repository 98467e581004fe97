use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use dearly_db::{PairOutcome, Store};
use dearly_types::models::{User, UserSummary};

use super::{load_user, normalize_email};
use crate::error::ApiError;

/// Owns the one-partner-at-a-time rule.
#[derive(Clone)]
pub struct PairingService {
    store: Arc<dyn Store>,
}

impl PairingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Links `current` and the user registered under `partner_email` to each other.
    pub fn connect(&self, current: Uuid, partner_email: &str) -> Result<UserSummary, ApiError> {
        let (me, target) = self.eligible_pair(current, partner_email)?;

        match self.store.pair_users(me.id, target.id)? {
            PairOutcome::Paired => {
                info!("Paired {} with {}", me.id, target.id);
                Ok(target.summary())
            }
            // Lost a race with another pairing between the checks and the write.
            PairOutcome::RequesterTaken => {
                warn!("Pairing {} -> {} lost a race on the requester", me.id, target.id);
                Err(ApiError::AlreadyPaired)
            }
            PairOutcome::TargetTaken => {
                warn!("Pairing {} -> {} lost a race on the target", me.id, target.id);
                Err(ApiError::PartnerAlreadyPaired)
            }
            PairOutcome::SelfPairing => Err(ApiError::SelfPairing),
        }
    }

    /// Same checks as `connect`, without writing anything.
    pub fn search(&self, current: Uuid, email: &str) -> Result<UserSummary, ApiError> {
        let (_, target) = self.eligible_pair(current, email)?;
        Ok(target.summary())
    }

    pub fn partner(&self, current: Uuid) -> Result<UserSummary, ApiError> {
        let me = load_user(self.store.as_ref(), current)?;
        self.partner_of(&me)?.ok_or(ApiError::NotFound("partner"))
    }

    /// The user and, if linked, their partner.
    pub fn profile(&self, current: Uuid) -> Result<(User, Option<UserSummary>), ApiError> {
        let me = load_user(self.store.as_ref(), current)?;
        let partner = self.partner_of(&me)?;
        Ok((me, partner))
    }

    fn partner_of(&self, user: &User) -> Result<Option<UserSummary>, ApiError> {
        let Some(partner_id) = user.partner_id else {
            return Ok(None);
        };
        Ok(self.store.user_by_id(partner_id)?.map(|p| p.summary()))
    }

    // Lookup, then self, then requester's link, then target's link.
    fn eligible_pair(&self, current: Uuid, email: &str) -> Result<(User, User), ApiError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ApiError::validation("partner email is required"));
        }

        let target = self
            .store
            .user_by_email(&email)?
            .ok_or(ApiError::NotFound("partner"))?;

        if target.id == current {
            return Err(ApiError::SelfPairing);
        }

        let me = load_user(self.store.as_ref(), current)?;
        if me.is_paired() {
            return Err(ApiError::AlreadyPaired);
        }
        if target.is_paired() {
            return Err(ApiError::PartnerAlreadyPaired);
        }

        Ok((me, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dearly_db::Database;
    use dearly_db::models::NewUser;

    fn setup() -> (Arc<Database>, PairingService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = PairingService::new(db.clone());
        (db, service)
    }

    fn register(db: &Database, email: &str) -> User {
        Store::create_user(
            db,
            NewUser {
                id: Uuid::new_v4(),
                email,
                name: "someone",
                password_hash: "hash",
                created_at: Utc::now(),
            },
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn connect_links_both_users() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");
        let b = register(&db, "jamie@example.com");

        let partner = service.connect(a.id, "Jamie@Example.com ").unwrap();
        assert_eq!(partner.id, b.id);

        assert_eq!(db.user_by_id(a.id).unwrap().unwrap().partner_id, Some(b.id));
        assert_eq!(db.user_by_id(b.id).unwrap().unwrap().partner_id, Some(a.id));
    }

    #[test]
    fn second_connect_fails_for_either_side() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");
        let b = register(&db, "jamie@example.com");
        let c = register(&db, "casey@example.com");
        service.connect(a.id, "jamie@example.com").unwrap();

        assert!(matches!(
            service.connect(a.id, "casey@example.com"),
            Err(ApiError::AlreadyPaired)
        ));
        assert!(matches!(
            service.connect(b.id, "casey@example.com"),
            Err(ApiError::AlreadyPaired)
        ));
        assert!(matches!(
            service.connect(c.id, "alex@example.com"),
            Err(ApiError::PartnerAlreadyPaired)
        ));
        assert_eq!(db.user_by_id(c.id).unwrap().unwrap().partner_id, None);
    }

    #[test]
    fn self_pairing_wins_regardless_of_state() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");
        register(&db, "jamie@example.com");

        assert!(matches!(service.connect(a.id, "alex@example.com"), Err(ApiError::SelfPairing)));

        service.connect(a.id, "jamie@example.com").unwrap();
        assert!(matches!(service.connect(a.id, "alex@example.com"), Err(ApiError::SelfPairing)));
    }

    #[test]
    fn unknown_email_is_not_found() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");

        assert!(matches!(
            service.connect(a.id, "nobody@example.com"),
            Err(ApiError::NotFound("partner"))
        ));
        assert!(matches!(service.connect(a.id, "  "), Err(ApiError::Validation(_))));
    }

    #[test]
    fn search_does_not_mutate() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");
        let b = register(&db, "jamie@example.com");

        assert_eq!(service.search(a.id, "jamie@example.com").unwrap().id, b.id);
        assert_eq!(db.user_by_id(a.id).unwrap().unwrap().partner_id, None);
        assert_eq!(db.user_by_id(b.id).unwrap().unwrap().partner_id, None);
    }

    #[test]
    fn profile_and_partner_reflect_link() {
        let (db, service) = setup();
        let a = register(&db, "alex@example.com");
        let b = register(&db, "jamie@example.com");

        assert!(matches!(service.partner(a.id), Err(ApiError::NotFound("partner"))));
        assert_eq!(service.profile(a.id).unwrap().1, None);

        service.connect(a.id, "jamie@example.com").unwrap();
        assert_eq!(service.partner(a.id).unwrap().id, b.id);
        assert_eq!(service.profile(b.id).unwrap().1.map(|p| p.id), Some(a.id));
    }
}
