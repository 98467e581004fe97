//! Repository port the domain services are written against.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dearly_types::models::{Letter, User};

use crate::Database;
use crate::models::{NewLetter, NewUser};

/// Result of the pairing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    Paired,
    /// The requester already had a partner when the write ran.
    RequesterTaken,
    /// The target already had a partner when the write ran.
    TargetTaken,
    SelfPairing,
}

/// Outcome of a successful unlock.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub letter: Letter,
    /// `false` when the letter had already been delivered by an earlier call.
    pub newly_delivered: bool,
}

/// Persistence operations the services need. Blocking; call from
/// `spawn_blocking` on the async side.
pub trait Store: Send + Sync {
    /// `None` when the email is already registered.
    fn create_user(&self, user: NewUser<'_>) -> Result<Option<User>>;
    fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// User plus stored password hash, for login.
    fn credentials(&self, email: &str) -> Result<Option<(User, String)>>;

    fn pair_users(&self, requester: Uuid, target: Uuid) -> Result<PairOutcome>;

    fn insert_letter(&self, letter: NewLetter<'_>) -> Result<Letter>;
    fn delivered_letters(&self, user: Uuid, now: DateTime<Utc>) -> Result<Vec<Letter>>;
    fn pending_letters(&self, receiver: Uuid) -> Result<Vec<Letter>>;
    /// `None` when no letter with this id is addressed to `receiver` and due by `now`.
    fn finalize_delivery(&self, id: Uuid, receiver: Uuid, now: DateTime<Utc>)
        -> Result<Option<Finalized>>;
}

impl Store for Database {
    fn create_user(&self, user: NewUser<'_>) -> Result<Option<User>> {
        if !self.insert_user(&user)? {
            return Ok(None);
        }
        self.user_by_id(user.id)?
            .map(Some)
            .ok_or_else(|| anyhow!("user {} vanished after insert", user.id))
    }

    fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_by_id(&id.to_string())?
            .map(User::try_from)
            .transpose()
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.get_user_by_email(email)?.map(User::try_from).transpose()
    }

    fn credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let Some(mut row) = self.get_user_by_email(email)? else {
            return Ok(None);
        };
        let hash = std::mem::take(&mut row.password);
        Ok(Some((User::try_from(row)?, hash)))
    }

    fn pair_users(&self, requester: Uuid, target: Uuid) -> Result<PairOutcome> {
        self.link_partners(&requester.to_string(), &target.to_string())
    }

    fn insert_letter(&self, letter: NewLetter<'_>) -> Result<Letter> {
        self.insert_message(&letter)?;
        let row = self
            .get_letter(&letter.id.to_string())?
            .ok_or_else(|| anyhow!("message {} vanished after insert", letter.id))?;
        Letter::try_from(row)
    }

    fn delivered_letters(&self, user: Uuid, now: DateTime<Utc>) -> Result<Vec<Letter>> {
        self.get_delivered_letters(&user.to_string(), now)?
            .into_iter()
            .map(Letter::try_from)
            .collect()
    }

    fn pending_letters(&self, receiver: Uuid) -> Result<Vec<Letter>> {
        self.get_pending_letters(&receiver.to_string())?
            .into_iter()
            .map(Letter::try_from)
            .collect()
    }

    fn finalize_delivery(
        &self,
        id: Uuid,
        receiver: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Finalized>> {
        let Some((row, newly_delivered)) =
            self.mark_delivered(&id.to_string(), &receiver.to_string(), now)?
        else {
            return Ok(None);
        };
        Ok(Some(Finalized {
            letter: Letter::try_from(row)?,
            newly_delivered,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Barrier;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap()
    }

    fn user(db: &Database, email: &str) -> User {
        Store::create_user(
            db,
            NewUser {
                id: Uuid::new_v4(),
                email,
                name: email.split('@').next().unwrap(),
                password_hash: "$argon2id$stub",
                created_at: t0(),
            },
        )
        .unwrap()
        .unwrap()
    }

    fn letter(db: &Database, from: &User, to: &User, content: &str, at: DateTime<Utc>) -> Letter {
        Store::insert_letter(
            db,
            NewLetter {
                id: Uuid::new_v4(),
                sender_id: from.id,
                receiver_id: to.id,
                content,
                image_url: None,
                scheduled_at: at + Duration::seconds(15),
                created_at: at,
            },
        )
        .unwrap()
    }

    #[test]
    fn duplicate_email_is_rejected_without_error() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "alex@example.com");

        let again = Store::create_user(
            &db,
            NewUser {
                id: Uuid::new_v4(),
                email: "alex@example.com",
                name: "Other",
                password_hash: "x",
                created_at: t0(),
            },
        )
        .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn credentials_split_hash_from_user() {
        let db = Database::open_in_memory().unwrap();
        let alex = user(&db, "alex@example.com");

        let (found, hash) = db.credentials("alex@example.com").unwrap().unwrap();
        assert_eq!(found, alex);
        assert_eq!(hash, "$argon2id$stub");
        assert!(db.credentials("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn pairing_links_both_sides() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");

        assert_eq!(Store::pair_users(&db, a.id, b.id).unwrap(), PairOutcome::Paired);

        assert_eq!(db.user_by_id(a.id).unwrap().unwrap().partner_id, Some(b.id));
        assert_eq!(db.user_by_id(b.id).unwrap().unwrap().partner_id, Some(a.id));
    }

    #[test]
    fn pairing_with_a_taken_target_rolls_back_the_requester() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");
        let c = user(&db, "casey@example.com");
        Store::pair_users(&db, b.id, c.id).unwrap();

        assert_eq!(Store::pair_users(&db, a.id, b.id).unwrap(), PairOutcome::TargetTaken);
        assert_eq!(db.user_by_id(a.id).unwrap().unwrap().partner_id, None);

        assert_eq!(Store::pair_users(&db, b.id, a.id).unwrap(), PairOutcome::RequesterTaken);
        assert_eq!(Store::pair_users(&db, a.id, a.id).unwrap(), PairOutcome::SelfPairing);
    }

    #[test]
    fn pending_and_delivered_are_disjoint() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");
        Store::pair_users(&db, a.id, b.id).unwrap();

        let first = letter(&db, &a, &b, "first", t0());
        let second = letter(&db, &a, &b, "second", t0() + Duration::seconds(1));
        let later = t0() + Duration::minutes(5);

        let pending = db.pending_letters(b.id).unwrap();
        assert_eq!(pending.iter().map(|l| l.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert!(db.pending_letters(a.id).unwrap().is_empty());
        // due but not finalized
        assert!(db.delivered_letters(b.id, later).unwrap().is_empty());

        Store::finalize_delivery(&db, first.id, b.id, later).unwrap().unwrap();

        let delivered = db.delivered_letters(a.id, later).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].sender.email, "alex@example.com");
        assert_eq!(delivered[0].receiver.email, "jamie@example.com");
        assert_eq!(db.pending_letters(b.id).unwrap().len(), 1);
    }

    #[test]
    fn finalize_flips_once_and_keeps_first_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");
        let l = letter(&db, &a, &b, "hi", t0());
        let due = l.scheduled_at;

        assert!(Store::finalize_delivery(&db, l.id, b.id, due - Duration::seconds(1)).unwrap().is_none());
        assert!(Store::finalize_delivery(&db, l.id, a.id, due).unwrap().is_none());

        let first = Store::finalize_delivery(&db, l.id, b.id, due).unwrap().unwrap();
        assert!(first.newly_delivered);
        assert_eq!(first.letter.delivered_at, Some(due));

        let second = Store::finalize_delivery(&db, l.id, b.id, due + Duration::hours(1))
            .unwrap()
            .unwrap();
        assert!(!second.newly_delivered);
        assert_eq!(second.letter.delivered_at, Some(due));
    }

    #[test]
    fn concurrent_unlocks_finalize_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");
        let l = letter(&db, &a, &b, "hi", t0());
        let due = l.scheduled_at;

        let barrier = Barrier::new(8);
        let results: Vec<Finalized> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (db, barrier) = (&db, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        Store::finalize_delivery(db, l.id, b.id, due + Duration::seconds(i))
                            .unwrap()
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.newly_delivered).count(), 1);
        let winner = results.iter().find(|r| r.newly_delivered).unwrap();
        for r in &results {
            assert!(r.letter.is_delivered);
            assert_eq!(r.letter.delivered_at, winner.letter.delivered_at);
        }
    }

    #[test]
    fn racing_requesters_for_one_target_link_only_one() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex@example.com");
        let b = user(&db, "jamie@example.com");
        let c = user(&db, "casey@example.com");

        let barrier = Barrier::new(2);
        let (from_a, from_c) = thread::scope(|s| {
            let race = |requester: Uuid| {
                let (db, barrier) = (&db, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    Store::pair_users(db, requester, b.id).unwrap()
                })
            };
            let (ha, hc) = (race(a.id), race(c.id));
            (ha.join().unwrap(), hc.join().unwrap())
        });

        let mut outcomes = [from_a, from_c];
        outcomes.sort_by_key(|o| *o != PairOutcome::Paired);
        assert_eq!(outcomes, [PairOutcome::Paired, PairOutcome::TargetTaken]);

        let (winner, loser) = if from_a == PairOutcome::Paired { (a.id, c.id) } else { (c.id, a.id) };
        let partner_of = |id| db.user_by_id(id).unwrap().unwrap().partner_id;
        assert_eq!(partner_of(b.id), Some(winner));
        assert_eq!(partner_of(winner), Some(b.id));
        assert_eq!(partner_of(loser), None);
    }
}
