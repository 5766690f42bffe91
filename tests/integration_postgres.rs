//! Postgres adapter tests
//!
//! Run against `DATABASE_URL`; every test returns early when it is unset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use coop_ledger::cache::{LocalPriceCache, PgPriceCache, PriceCache};
use coop_ledger::domain::{ActorContext, EntryState, LedgerType};
use coop_ledger::handlers::{
    BuySharesCommand, ChargeFineCommand, CreateEntryCommand, DecisionCommand, EntryHandler,
    LedgerServices, PayFineCommand, UnitPriceHandler,
};
use coop_ledger::pagination::PageRequest;
use coop_ledger::store::{EntryFilter, FineFilter, MemberStore, PgStore, ShareStore};
use coop_ledger::ErrorKind;

mod common;

#[tokio::test]
async fn test_entry_decision_and_balance() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (_, services) = common::pg_services(&pool, Arc::new(LocalPriceCache::new()));
    let member_id = common::insert_member(&pool).await;

    let deposit = services
        .entries
        .create_entry(CreateEntryCommand::deposit(member_id, 8_000, LedgerType::Savings))
        .await
        .unwrap();
    assert_eq!(deposit.status.state().unwrap(), EntryState::Pending);

    let first = services
        .decisions
        .apply_decision(DecisionCommand::confirm(deposit.status.id))
        .await
        .unwrap();
    assert!(first.changed);

    let again = services
        .decisions
        .apply_decision(DecisionCommand::confirm(deposit.status.id))
        .await
        .unwrap();
    assert!(!again.changed);

    let err = services
        .decisions
        .apply_decision(DecisionCommand::reject(deposit.status.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let withdrawal = services
        .entries
        .create_entry(CreateEntryCommand::withdrawal(member_id, 3_000, LedgerType::Savings))
        .await
        .unwrap();
    services
        .decisions
        .apply_decision(DecisionCommand::confirm(withdrawal.status.id))
        .await
        .unwrap();

    let balance = services
        .balances
        .get_balance(member_id, LedgerType::Savings)
        .await
        .unwrap();
    assert_eq!(balance, 5_000);
}

#[tokio::test]
async fn test_concurrent_registration_confirms() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (store, services) = common::pg_services(&pool, Arc::new(LocalPriceCache::new()));
    let member_id = common::insert_member(&pool).await;

    let created = services
        .entries
        .pay_registration_fee(member_id, 100_000)
        .await
        .unwrap();

    let decisions = services.decisions.clone();
    let (a, b) = tokio::join!(
        decisions.apply_decision(DecisionCommand::confirm(created.status.id)),
        decisions.apply_decision(DecisionCommand::confirm(created.status.id)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(u8::from(a.changed) + u8::from(b.changed), 1);

    let member = store.get(member_id).await.unwrap().unwrap();
    assert!(member.is_active());

    let err = services
        .entries
        .pay_registration_fee(member_id, 100_000)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_share_purchase_persists_lot() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (store, services) = common::pg_services(&pool, Arc::new(LocalPriceCache::new()));
    let member_id = common::insert_member(&pool).await;

    let before = services.balances.total_shares().await.unwrap();

    let purchase = services
        .shares
        .buy_shares(BuySharesCommand::new(member_id, 75_000).with_units(dec!(1.5)))
        .await
        .unwrap();

    let lot = store
        .find_share_lot(purchase.entry.id)
        .await
        .unwrap()
        .expect("lot stored with the entry");
    assert_eq!(lot.units, dec!(1.5000));
    assert_eq!(lot.unit_price, purchase.quote.unit_price);

    let pending = services.balances.member_share_totals(member_id).await.unwrap();
    assert_eq!(pending.amount, 0);

    services
        .decisions
        .apply_decision(DecisionCommand::confirm(purchase.status.id))
        .await
        .unwrap();

    let mine = services.balances.member_share_totals(member_id).await.unwrap();
    assert_eq!(mine.units, dec!(1.5));
    assert_eq!(mine.amount, 75_000);

    let after = services.balances.total_shares().await.unwrap();
    assert_eq!(after.units - before.units, dec!(1.5));
}

#[tokio::test]
async fn test_fine_payment_and_listing() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (_, services) = common::pg_services(&pool, Arc::new(LocalPriceCache::new()));
    let member_id = common::insert_member(&pool).await;
    let member = ActorContext::member(Uuid::new_v4(), member_id);
    let admin = ActorContext::new(Uuid::new_v4()).as_admin();

    let mut fines = Vec::new();
    for days in [5, 2, 8] {
        let fine = services
            .fines
            .charge_fine(
                &admin,
                ChargeFineCommand::new(
                    member_id,
                    1_500,
                    format!("Due in {days} days"),
                    Utc::now() + ChronoDuration::days(days),
                ),
            )
            .await
            .unwrap();
        fines.push(fine);
    }

    let page = services
        .fines
        .list_fines(
            &member,
            FineFilter::default(),
            &PageRequest::new().with_sort("deadline:asc").with_limit(2),
        )
        .await
        .unwrap();
    let reasons: Vec<_> = page.items.iter().map(|f| f.fine.reason.as_str()).collect();
    assert_eq!(reasons, ["Due in 2 days", "Due in 5 days"]);

    let rest = services
        .fines
        .list_fines(
            &member,
            FineFilter::default(),
            &PageRequest::new()
                .with_sort("deadline:asc")
                .with_limit(2)
                .with_cursor(page.next_cursor.expect("second page")),
        )
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].fine.reason, "Due in 8 days");

    let target = &fines[0];
    let first = services
        .fines
        .pay_fine(&member, PayFineCommand::new(target.id, 1_500))
        .await
        .unwrap();
    services
        .decisions
        .apply_decision(DecisionCommand::reject(first.status.id))
        .await
        .unwrap();

    let second = services
        .fines
        .pay_fine(&member, PayFineCommand::new(target.id, 1_500))
        .await
        .unwrap();
    services
        .decisions
        .apply_decision(
            DecisionCommand::confirm(second.status.id).with_expected_ledger(LedgerType::Fines),
        )
        .await
        .unwrap();

    let view = services.fines.get_fine(&member, target.id).await.unwrap();
    assert!(view.paid);
    assert_eq!(view.fine.entry_id, Some(second.entry.id));
    assert_eq!(view.payment.unwrap().state, EntryState::Confirmed);

    let err = services
        .fines
        .pay_fine(&member, PayFineCommand::new(target.id, 1_500))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let paid = services
        .fines
        .list_fines(
            &member,
            FineFilter {
                member_id: None,
                paid: Some(true),
            },
            &PageRequest::new(),
        )
        .await
        .unwrap();
    assert_eq!(paid.items.len(), 1);
    assert!(paid.items[0].payment.is_some());
}

#[tokio::test]
async fn test_entry_listing_filters_and_pages() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (_, services) = common::pg_services(&pool, Arc::new(LocalPriceCache::new()));
    let member_id = common::insert_member(&pool).await;
    let member = ActorContext::member(Uuid::new_v4(), member_id);

    let mut statuses = Vec::new();
    for i in 0..5 {
        let created = services
            .entries
            .create_entry(CreateEntryCommand::deposit(member_id, 1_000 + i, LedgerType::Savings))
            .await
            .unwrap();
        statuses.push(created.status.id);
    }
    services
        .decisions
        .apply_decision(DecisionCommand::confirm(statuses[0]))
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut request = PageRequest::new().with_limit(2);
    loop {
        let page = services
            .entries
            .list_entries(&member, EntryFilter::default(), &request)
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|e| e.entry.id));
        match page.next_cursor {
            Some(cursor) => request = PageRequest::new().with_limit(2).with_cursor(cursor),
            None => break,
        }
    }
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(seen.len(), 5);
    assert_eq!(unique.len(), 5);

    let pending = services
        .entries
        .list_entries(
            &member,
            EntryFilter {
                state: Some(EntryState::Pending),
                ..EntryFilter::default()
            },
            &PageRequest::new(),
        )
        .await
        .unwrap();
    assert_eq!(pending.items.len(), 4);
}

#[tokio::test]
async fn test_reference_exhaustion_leaves_no_rows() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = Arc::new(PgStore::new(pool.clone()));
    let reference = format!("T{}", &Uuid::new_v4().simple().to_string()[..11]).to_uppercase();
    let entries = EntryHandler::new(store.clone(), store.clone())
        .with_reference_generator(move || reference.clone());
    let prices = UnitPriceHandler::new(store.clone(), Arc::new(LocalPriceCache::new()));
    let services = LedgerServices::with_entries(store, entries, prices);
    let member_id = common::insert_member(&pool).await;

    services
        .entries
        .create_entry(CreateEntryCommand::deposit(member_id, 1_000, LedgerType::Savings))
        .await
        .unwrap();
    let err = services
        .entries
        .create_entry(CreateEntryCommand::deposit(member_id, 1_000, LedgerType::Savings))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries WHERE member_id = $1")
        .bind(member_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_shared_price_cache() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let cache = PgPriceCache::new(pool.clone());
    let key = format!("test-{}", Uuid::new_v4());

    assert_eq!(cache.get(&key).await.unwrap(), None);
    cache.set(&key, 42_000, Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), Some(42_000));
    cache.set(&key, 43_000, Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), Some(43_000));
    cache.delete(&key).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);

    cache.set(&key, 1, Duration::ZERO).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);

    let (_, services) = common::pg_services(&pool, Arc::new(PgPriceCache::new(pool.clone())));
    let admin = ActorContext::new(Uuid::new_v4()).as_admin();
    services.prices.set_unit_price(&admin, 62_500).await.unwrap();
    assert_eq!(services.prices.get_unit_price().await.unwrap(), 62_500);
}
