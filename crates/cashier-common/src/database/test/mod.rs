//! Draft Database Tests
//!
//! This module contains generic tests for draft database implementations.
//! These tests can be used to verify any draft database implementation
//! by using the `draft_db_test!` macro.
#![allow(clippy::unwrap_used)]

use std::num::NonZeroU64;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::draft::{DraftAsset, TempLinkState};
use crate::link::LinkType;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn owner() -> Principal {
    Principal::from_str("ryjl3-tyaaa-aaaaa-aaaba-cai").unwrap()
}

fn other_owner() -> Principal {
    Principal::from_str("2vxsx-fae").unwrap()
}

/// Temp link with a unique, increasing creation time
fn test_temp_link(owner: &Principal) -> TempLink {
    let mut temp_link = TempLink::new(owner);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    temp_link.created_at_nanos += n;
    temp_link.id = format!("{}_{}", owner, temp_link.created_at_nanos);
    temp_link.draft.title = format!("draft {n}");
    temp_link
}

/// Test creating and reading back a record
pub async fn create_and_get_one<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let temp_link = test_temp_link(&owner);

    db.create(&owner, temp_link.clone()).await.unwrap();

    let stored = db.get_one(&owner, &temp_link.id).await.unwrap();
    assert_eq!(stored, Some(temp_link));
}

/// Test that an id cannot be created twice
pub async fn create_duplicate_fails<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let temp_link = test_temp_link(&owner);

    db.create(&owner, temp_link.clone()).await.unwrap();
    assert!(db.create(&owner, temp_link).await.is_err());
}

/// Test listing records oldest first
pub async fn get_lists_oldest_first<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let first = test_temp_link(&owner);
    let second = test_temp_link(&owner);

    db.create(&owner, second.clone()).await.unwrap();
    db.create(&owner, first.clone()).await.unwrap();

    let all = db.get(&owner).await.unwrap();
    assert_eq!(all, vec![first, second]);
}

/// Test that records are scoped to their owner
pub async fn get_is_owner_scoped<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let other = other_owner();
    let temp_link = test_temp_link(&owner);

    db.create(&owner, temp_link.clone()).await.unwrap();

    assert!(db.get(&other).await.unwrap().is_empty());
    assert!(db.get_one(&other, &temp_link.id).await.unwrap().is_none());
}

/// Test partial updates
pub async fn update_partial<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let temp_link = test_temp_link(&owner);
    db.create(&owner, temp_link.clone()).await.unwrap();

    let updated = db
        .update(
            &owner,
            &temp_link.id,
            TempLinkUpdate {
                state: Some(TempLinkState::AddingAsset),
                draft: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.state, TempLinkState::AddingAsset);
    assert_eq!(updated.draft, temp_link.draft);

    let mut draft = temp_link.draft.clone();
    draft.link_type = LinkType::Airdrop;
    draft.assets.push(DraftAsset::new("mxzaz-hqaaa-aaaar-qaada-cai", 5_000));
    draft.max_use = NonZeroU64::new(3).unwrap();

    db.update(
        &owner,
        &temp_link.id,
        TempLinkUpdate {
            state: None,
            draft: Some(draft.clone()),
        },
    )
    .await
    .unwrap();

    let stored = db.get_one(&owner, &temp_link.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TempLinkState::AddingAsset);
    assert_eq!(stored.draft, draft);
    assert_eq!(stored.created_at_nanos, temp_link.created_at_nanos);
}

/// Test updating a missing record
pub async fn update_missing_fails<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let result = db
        .update(&owner, "missing", TempLinkUpdate::default())
        .await;
    assert!(result.is_err());
}

/// Test deleting records
pub async fn delete_removes<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let keep = test_temp_link(&owner);
    let remove = test_temp_link(&owner);

    db.create(&owner, keep.clone()).await.unwrap();
    db.create(&owner, remove.clone()).await.unwrap();

    db.delete(&remove.id, &owner).await.unwrap();

    assert!(db.get_one(&owner, &remove.id).await.unwrap().is_none());
    assert_eq!(db.get(&owner).await.unwrap(), vec![keep]);

    // Deleting again is a no-op
    db.delete(&remove.id, &owner).await.unwrap();
}

/// Test that delete only touches the given owner
pub async fn delete_is_owner_scoped<DB>(db: DB)
where
    DB: DraftDatabase<Err = Error>,
{
    let owner = owner();
    let other = other_owner();
    let temp_link = test_temp_link(&owner);

    db.create(&owner, temp_link.clone()).await.unwrap();
    db.delete(&temp_link.id, &other).await.unwrap();

    assert!(db.get_one(&owner, &temp_link.id).await.unwrap().is_some());
}

/// Unit test that is expected to be passed for a correct draft database implementation
#[macro_export]
macro_rules! draft_db_test {
    ($make_db_fn:ident) => {
        draft_db_test!(
            $make_db_fn,
            create_and_get_one,
            create_duplicate_fails,
            get_lists_oldest_first,
            get_is_owner_scoped,
            update_partial,
            update_missing_fails,
            delete_removes,
            delete_is_owner_scoped
        );
    };
    ($make_db_fn:ident, $($name:ident),+ $(,)?) => {
        ::paste::paste! {
            $(
                #[tokio::test]
                async fn [<draft_ $name>]() {
                    use std::time::{SystemTime, UNIX_EPOCH};
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .expect("Time went backwards");

                    cashier_common::database::test::$name($make_db_fn(format!("test_{}_{}", now.as_nanos(), stringify!($name))).await).await;
                }
            )+
        }
    };
}
